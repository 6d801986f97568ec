pub mod devops;
pub mod jira;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::patch::FieldPatch;
use crate::model::source::{Board, SourcePage, SourceRecord, Sprint};
use crate::model::target::{IterationNode, TargetId, TargetRecord};

/// Read side: the issue tracker issues are copied from.
#[async_trait]
pub trait SourceTracker: Send + Sync {
    fn name(&self) -> &str;
    async fn query_issues(&self, jql: &str, start_at: usize, page_size: usize) -> Result<SourcePage>;
    async fn get_issue(&self, key: &str) -> Result<Option<SourceRecord>>;
    async fn list_boards(&self, project_key: &str) -> Result<Vec<Board>>;
    /// Sprints on a board in the given state (`active`, `future`, `closed`).
    async fn list_sprints(&self, board_id: u64, state: &str) -> Result<Vec<Sprint>>;
}

/// Write side: the work tracking system issues are mirrored into.
///
/// Every write takes `validate_only`; when set the server checks the request
/// but commits nothing.
#[async_trait]
pub trait TargetTracker: Send + Sync {
    fn name(&self) -> &str;
    /// First work item in `project` whose title contains `needle`.
    async fn find_id_by_title(&self, project: &str, needle: &str) -> Result<Option<TargetId>>;
    async fn get_record(&self, id: TargetId) -> Result<TargetRecord>;
    async fn create_record(
        &self,
        project: &str,
        work_item_type: &str,
        patch: &FieldPatch,
        validate_only: bool,
    ) -> Result<TargetRecord>;
    async fn update_record(
        &self,
        id: TargetId,
        patch: &FieldPatch,
        validate_only: bool,
    ) -> Result<TargetRecord>;
    /// Root of the project's iteration tree.
    async fn list_iterations(&self, project: &str) -> Result<IterationNode>;
    async fn create_iteration(&self, project: &str, name: &str) -> Result<IterationNode>;
}

/// Turn a non-success response into an error carrying the status and body.
pub(crate) async fn check_status(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("{what} failed with {status}: {}", body.trim())
}

#[cfg(test)]
pub mod mock;
