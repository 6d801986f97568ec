use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Mutex;

/// What a processed-set entry stands for. Sprints are prefixed so a sprint
/// named like an issue key cannot shadow it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Issue(String),
    Sprint(String),
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupKey::Issue(key) => f.write_str(key),
            DedupKey::Sprint(name) => write!(f, "sprint-{name}"),
        }
    }
}

/// Keys reconciled during this run. Entries are never removed.
///
/// A key is claimed before its action runs, so a failed action is not
/// retried later in the same run.
#[derive(Debug, Default)]
pub struct ProcessedSet {
    seen: Mutex<HashSet<DedupKey>>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` seen. Returns `true` only the first time.
    pub fn claim(&self, key: &DedupKey) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(key.clone())
    }

    #[cfg(test)]
    pub fn contains(&self, key: &DedupKey) -> bool {
        let seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.contains(key)
    }

    /// Run `action` unless `key` was already claimed. `None` means skipped.
    pub async fn run_once_for<F, Fut, T>(&self, key: &DedupKey, action: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.claim(key) {
            return None;
        }
        Some(action().await)
    }
}
