use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::dedup::{DedupKey, ProcessedSet};
use super::linker::{title_for, Linker};
use super::mapper::FieldMapper;
use super::paginator::Paginator;
use super::sprint::{iteration_id, load_active_sprints, preferred_sprint, SprintReconciler};
use super::SyncMode;
use crate::config::AppConfig;
use crate::model::patch::{FieldPatch, FieldValue};
use crate::model::source::SourceRecord;
use crate::model::target::IterationNode;
use crate::providers::{SourceTracker, TargetTracker};

/// DevOps field reference names written by the sync.
pub mod fields {
    pub const TITLE: &str = "System.Title";
    pub const DESCRIPTION: &str = "System.Description";
    pub const CREATED_BY: &str = "System.CreatedBy";
    pub const ASSIGNED_TO: &str = "System.AssignedTo";
    pub const STATE: &str = "System.State";
    pub const PRIORITY: &str = "Microsoft.VSTS.Common.Priority";
    pub const WORK_ITEM_TYPE: &str = "System.WorkItemType";
    pub const STORY_POINTS: &str = "Microsoft.VSTS.Scheduling.StoryPoints";
    pub const TAGS: &str = "System.Tags";
    pub const ITERATION_ID: &str = "System.IterationID";
    pub const CREATED_DATE: &str = "System.CreatedDate";
    pub const CHANGED_DATE: &str = "System.ChangedDate";
    pub const HISTORY: &str = "System.History";
}

/// Work item type used when an issue carries no type at all.
const FALLBACK_WORK_ITEM_TYPE: &str = "Task";

pub struct SyncOptions {
    /// Jira project whose boards supply the active sprints.
    pub source_project: String,
    pub target_project: String,
    pub mode: SyncMode,
    pub page_size: usize,
    pub mapper: FieldMapper,
}

impl SyncOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            source_project: config.jira.project.clone(),
            target_project: config.devops.project.clone(),
            mode: config.mode,
            page_size: config.page_size,
            mapper: FieldMapper::new(&config.mappings),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub queries: usize,
    pub pages: usize,
    pub created: usize,
    pub updated: usize,
    pub linked: usize,
    pub missing_parents: usize,
}

/// Drives one run: every query, page by page, parents before children.
pub struct SyncEngine {
    source: Arc<dyn SourceTracker>,
    target: Arc<dyn TargetTracker>,
    linker: Linker,
    sprints: SprintReconciler,
    pub(super) processed: ProcessedSet,
    options: SyncOptions,
    stats: Mutex<SyncStats>,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn SourceTracker>, target: Arc<dyn TargetTracker>, options: SyncOptions) -> Self {
        Self {
            linker: Linker::new(target.clone(), options.target_project.clone()),
            sprints: SprintReconciler::new(target.clone(), options.target_project.clone(), options.mode),
            processed: ProcessedSet::new(),
            source,
            target,
            options,
            stats: Mutex::new(SyncStats::default()),
        }
    }

    fn bump(&self, f: impl FnOnce(&mut SyncStats)) {
        f(&mut self.stats.lock().unwrap_or_else(|e| e.into_inner()));
    }

    /// Sync every query in order. Stops at the first remote failure.
    pub async fn run(&self, queries: &[String]) -> Result<SyncStats> {
        let active = load_active_sprints(self.source.as_ref(), &self.options.source_project).await?;
        for jql in queries {
            self.sync_query(jql, &active).await?;
            self.bump(|s| s.queries += 1);
        }
        Ok(self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn sync_query(&self, jql: &str, active: &HashSet<String>) -> Result<()> {
        let mut pager = Paginator::new(self.source.as_ref(), jql, self.options.page_size)?;
        while let Some(page) = pager.next_page().await? {
            self.sync_batch(&page.records, active).await?;
            self.bump(|s| s.pages += 1);
        }
        info!(jql, reported_total = pager.total().unwrap_or_default(), "query drained");
        Ok(())
    }

    /// Parents first, then sprints, then each not-yet-seen record.
    fn sync_batch<'a>(
        &'a self,
        records: &'a [SourceRecord],
        active: &'a HashSet<String>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            self.reconcile_parents(records, active).await?;
            let iterations = self.reconcile_sprints(records, active).await?;
            for record in records {
                let key = DedupKey::Issue(record.key.clone());
                let outcome = self
                    .processed
                    .run_once_for(&key, || self.upsert(record, active, iterations.as_ref()))
                    .await;
                match outcome {
                    Some(result) => result?,
                    None => debug!(key = %record.key, "already synced this run"),
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Fetch every epic and sub-task parent the batch refers to and upsert it
    /// as its own single-record batch before any child is written.
    async fn reconcile_parents(&self, records: &[SourceRecord], active: &HashSet<String>) -> Result<()> {
        for parent_key in parent_keys(records) {
            if !self.processed.claim(&DedupKey::Issue(parent_key.to_string())) {
                continue;
            }
            let Some(parent) = self.source.get_issue(parent_key).await? else {
                warn!(key = parent_key, "parent issue not visible in {}", self.source.name());
                continue;
            };
            debug!(key = parent_key, "syncing parent ahead of children");
            self.sync_claimed(parent, active).await?;
        }
        Ok(())
    }

    fn sync_claimed<'a>(&'a self, record: SourceRecord, active: &'a HashSet<String>) -> BoxFuture<'a, Result<()>> {
        async move {
            let batch = std::slice::from_ref(&record);
            self.reconcile_parents(batch, active).await?;
            let iterations = self.reconcile_sprints(batch, active).await?;
            self.upsert(&record, active, iterations.as_ref()).await
        }
        .boxed()
    }

    /// Ensure an iteration exists for each active sprint in the batch and
    /// return the current iteration tree, or `None` if no record needs one.
    async fn reconcile_sprints(
        &self,
        records: &[SourceRecord],
        active: &HashSet<String>,
    ) -> Result<Option<IterationNode>> {
        let mut wanted: Vec<&str> = Vec::new();
        for sprint in records.iter().filter_map(|r| preferred_sprint(r, active)) {
            if !wanted.contains(&sprint) {
                wanted.push(sprint);
            }
        }
        if wanted.is_empty() {
            return Ok(None);
        }
        for sprint in &wanted {
            self.sprints.ensure_iteration(&self.processed, sprint).await?;
        }
        Ok(Some(self.sprints.iterations().await?))
    }

    async fn upsert(
        &self,
        record: &SourceRecord,
        active: &HashSet<String>,
        iterations: Option<&IterationNode>,
    ) -> Result<()> {
        let validate_only = self.options.mode.validate_only();
        let existing = self.linker.find_existing(&record.key).await?;
        let mut patch = build_patch(record, &self.options.mapper, active, iterations);

        match existing {
            Some(id) => {
                debug!(key = %record.key, id, state = ?patch.get(fields::STATE), "updating work item");
                self.target.update_record(id, &patch, validate_only).await?;
                self.bump(|s| s.updated += 1);
            }
            None => {
                add_import_fields(record, &mut patch);
                if self.linker.link_parent(record, &mut patch).await? {
                    self.bump(|s| s.linked += 1);
                } else if !record.parent_candidates().is_empty() {
                    self.bump(|s| s.missing_parents += 1);
                }
                let work_item_type = match patch.get(fields::WORK_ITEM_TYPE) {
                    Some(FieldValue::Text(t)) => t.clone(),
                    _ => FALLBACK_WORK_ITEM_TYPE.to_string(),
                };
                let created = self
                    .target
                    .create_record(&self.options.target_project, &work_item_type, &patch, validate_only)
                    .await?;
                info!(key = %record.key, id = created.id, work_item_type = %work_item_type, validate_only, "created work item");
                self.bump(|s| s.created += 1);
            }
        }
        Ok(())
    }
}

/// Distinct parent and epic keys referenced by `records`, in first-seen order.
fn parent_keys(records: &[SourceRecord]) -> Vec<&str> {
    let mut keys: Vec<&str> = Vec::new();
    for key in records.iter().flat_map(|r| r.parent_candidates()) {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Fields written on every upsert.
pub fn build_patch(
    record: &SourceRecord,
    mapper: &FieldMapper,
    active: &HashSet<String>,
    iterations: Option<&IterationNode>,
) -> FieldPatch {
    let mut patch = FieldPatch::new();
    patch
        .set(fields::TITLE, Some(title_for(record)))
        .set(fields::DESCRIPTION, record.description.clone())
        .set(fields::CREATED_BY, Some(mapper.user(record.reporter.as_deref())))
        .set(fields::ASSIGNED_TO, Some(mapper.user(record.assignee.as_deref())))
        .set(fields::STATE, Some(mapper.status(record.status.as_deref())))
        .set(fields::PRIORITY, Some(mapper.priority(record.priority.as_deref())))
        .set(fields::WORK_ITEM_TYPE, Some(mapper.issue_type(record.issue_type.as_deref())))
        .set(fields::STORY_POINTS, record.story_points)
        .set(fields::TAGS, Some(record.labels.join("; ")));

    let iteration = preferred_sprint(record, active)
        .zip(iterations)
        .and_then(|(sprint, tree)| iteration_id(tree, sprint));
    patch.set(fields::ITERATION_ID, iteration);
    patch
}

/// Fields only written when the work item is first created.
fn add_import_fields(record: &SourceRecord, patch: &mut FieldPatch) {
    let note = format!(
        "Imported from Jira {}. Original Jira ID: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        record.key
    );
    patch
        .set(fields::CREATED_DATE, record.created)
        .set(fields::CHANGED_DATE, record.updated)
        .set(fields::HISTORY, Some(note));
}
