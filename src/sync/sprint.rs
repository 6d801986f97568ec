use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dedup::{DedupKey, ProcessedSet};
use super::SyncMode;
use crate::model::source::SourceRecord;
use crate::model::target::IterationNode;
use crate::providers::{SourceTracker, TargetTracker};

/// Characters DevOps rejects in classification node names.
const INVALID_NODE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '#', '$', '&', '%', '+'];

/// The iteration name a sprint is mirrored under.
pub fn iteration_name(sprint: &str) -> String {
    sprint
        .chars()
        .filter(|c| !INVALID_NODE_CHARS.contains(c) && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// The record's sprint that is currently active, if any. Issues carried over
/// between sprints keep every label, so the newest matching label wins.
/// `None` means backlog.
pub fn preferred_sprint<'r>(record: &'r SourceRecord, active: &HashSet<String>) -> Option<&'r str> {
    record
        .sprints
        .iter()
        .rev()
        .find(|s| active.contains(s.as_str()))
        .map(String::as_str)
}

/// Names of every active sprint on the project's boards.
pub async fn load_active_sprints(source: &dyn SourceTracker, project_key: &str) -> Result<HashSet<String>> {
    let mut active = HashSet::new();
    for board in source.list_boards(project_key).await? {
        for sprint in source.list_sprints(board.id, "active").await? {
            if !sprint.active {
                continue;
            }
            debug!(board = %board.name, sprint = %sprint.name, id = sprint.id, origin_board = ?sprint.board_id, "active sprint");
            active.insert(sprint.name);
        }
    }
    info!(project = project_key, count = active.len(), "loaded active sprints");
    Ok(active)
}

/// Makes sure every referenced sprint has a matching DevOps iteration.
pub struct SprintReconciler {
    target: Arc<dyn TargetTracker>,
    project: String,
    mode: SyncMode,
}

impl SprintReconciler {
    pub fn new(target: Arc<dyn TargetTracker>, project: impl Into<String>, mode: SyncMode) -> Self {
        Self {
            target,
            project: project.into(),
            mode,
        }
    }

    /// Check for the sprint's iteration once per run and create it when
    /// missing. In read-only mode the check still runs but nothing is created.
    pub async fn ensure_iteration(&self, processed: &ProcessedSet, sprint: &str) -> Result<()> {
        let key = DedupKey::Sprint(sprint.to_string());
        processed
            .run_once_for(&key, || self.reconcile(sprint))
            .await
            .transpose()?;
        Ok(())
    }

    async fn reconcile(&self, sprint: &str) -> Result<()> {
        let name = iteration_name(sprint);
        let tree = self.target.list_iterations(&self.project).await?;
        if tree.find_child(&name).is_some() {
            debug!(iteration = %name, "iteration exists");
            return Ok(());
        }
        if self.mode.validate_only() {
            warn!(iteration = %name, "iteration missing, not created in read-only mode");
            return Ok(());
        }
        info!(iteration = %name, project = %self.project, "creating iteration");
        self.target.create_iteration(&self.project, &name).await?;
        Ok(())
    }

    pub async fn iterations(&self) -> Result<IterationNode> {
        self.target.list_iterations(&self.project).await
    }
}

/// Iteration id for `sprint` within `tree`.
pub fn iteration_id(tree: &IterationNode, sprint: &str) -> Option<i64> {
    tree.find_child(&iteration_name(sprint)).map(|n| n.id)
}
