use anyhow::Result;
use tracing::info;

use super::SyncError;
use crate::model::source::SourcePage;
use crate::providers::SourceTracker;

/// Fetch page `page_index` of `jql`.
pub async fn fetch_page(
    source: &dyn SourceTracker,
    jql: &str,
    page_index: usize,
    page_size: usize,
) -> Result<SourcePage> {
    if page_size == 0 {
        return Err(SyncError::InvalidPageSize.into());
    }
    source.query_issues(jql, page_index * page_size, page_size).await
}

/// Walks one query page by page.
///
/// The total reported with the first page is kept for progress only; the
/// walk ends at the first empty page because the remote set can shrink or
/// grow while it is being read.
pub struct Paginator<'a> {
    source: &'a dyn SourceTracker,
    jql: &'a str,
    page_size: usize,
    next_index: usize,
    total: Option<usize>,
    done: bool,
}

impl<'a> Paginator<'a> {
    pub fn new(source: &'a dyn SourceTracker, jql: &'a str, page_size: usize) -> Result<Self, SyncError> {
        if page_size == 0 {
            return Err(SyncError::InvalidPageSize);
        }
        Ok(Self {
            source,
            jql,
            page_size,
            next_index: 0,
            total: None,
            done: false,
        })
    }

    /// Total reported with the first page, once fetched.
    pub fn total(&self) -> Option<usize> {
        self.total
    }

    pub async fn next_page(&mut self) -> Result<Option<SourcePage>> {
        if self.done {
            return Ok(None);
        }
        let page = fetch_page(self.source, self.jql, self.next_index, self.page_size).await?;
        let start = self.next_index * self.page_size;
        self.next_index += 1;

        match self.total {
            None => {
                self.total = Some(page.total);
                info!(total = page.total, jql = self.jql, "fetching issues from {}", self.source.name());
            }
            Some(_) => {
                info!(start, count = page.records.len(), "fetched chunk");
            }
        }

        if page.is_empty() {
            self.done = true;
            return Ok(None);
        }
        Ok(Some(page))
    }
}
