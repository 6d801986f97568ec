use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::model::patch::FieldPatch;
use crate::model::source::SourceRecord;
use crate::model::target::{Relation, TargetId, TargetRecord};
use crate::providers::TargetTracker;

pub const LINK_COMMENT: &str = "Link supplied via Jira import";

/// Title tag that marks a work item as the mirror of `key`.
pub fn title_tag(key: &str) -> String {
    format!("[{key}]")
}

pub fn title_for(record: &SourceRecord) -> String {
    format!("{} {}", title_tag(&record.key), record.summary)
}

/// Finds the target work item mirroring a source issue.
///
/// Existence is decided by searching titles for the `[KEY]` tag; the target
/// holds no dedicated external-key field. When several items match, the first
/// one the server returns wins.
pub struct Linker {
    target: Arc<dyn TargetTracker>,
    project: String,
}

impl Linker {
    pub fn new(target: Arc<dyn TargetTracker>, project: impl Into<String>) -> Self {
        Self {
            target,
            project: project.into(),
        }
    }

    pub async fn find_existing(&self, source_key: &str) -> Result<Option<TargetId>> {
        self.target
            .find_id_by_title(&self.project, &title_tag(source_key))
            .await
    }

    pub async fn resolve_parent_record(&self, parent_key: &str) -> Result<Option<TargetRecord>> {
        match self.find_existing(parent_key).await? {
            Some(id) => Ok(Some(self.target.get_record(id).await?)),
            None => Ok(None),
        }
    }

    /// Attach a child-to-parent relation for the first parent candidate that
    /// already exists in the target. Returns whether a link was added.
    pub async fn link_parent(&self, record: &SourceRecord, patch: &mut FieldPatch) -> Result<bool> {
        let candidates = record.parent_candidates();
        for parent_key in &candidates {
            if let Some(parent) = self.resolve_parent_record(parent_key).await? {
                debug!(
                    key = %record.key,
                    parent = %parent_key,
                    parent_id = parent.id,
                    parent_title = parent.title().unwrap_or_default(),
                    "linking to parent"
                );
                patch.relate(Relation::parent(&parent, LINK_COMMENT));
                return Ok(true);
            }
        }
        if !candidates.is_empty() {
            warn!(key = %record.key, parents = ?candidates, "parent not found in target, link skipped");
        }
        Ok(false)
    }
}
