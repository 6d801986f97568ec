pub mod dedup;
pub mod engine;
pub mod linker;
pub mod mapper;
pub mod paginator;
pub mod sprint;

use serde::Deserialize;
use thiserror::Error;

pub use engine::{SyncEngine, SyncOptions};

/// Whether writes are committed or only validated server-side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl SyncMode {
    pub fn validate_only(self) -> bool {
        self == SyncMode::ReadOnly
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("page size must be greater than zero")]
    InvalidPageSize,
}
