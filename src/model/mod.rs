pub mod patch;
pub mod source;
pub mod target;
