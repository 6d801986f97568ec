use chrono::{DateTime, Utc};

/// Snapshot of one Jira issue as returned by a search page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecord {
    pub key: String,
    pub summary: String,
    pub description: Option<String>,
    pub reporter: Option<String>,
    pub assignee: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub issue_type: Option<String>,
    pub labels: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// Key of the parent issue when this is a sub-task.
    pub parent_key: Option<String>,
    pub epic_link: Option<String>,
    pub story_points: Option<f64>,
    /// Every sprint the issue has been attached to, oldest first.
    pub sprints: Vec<String>,
}

impl SourceRecord {
    /// Issues this record may hang under in the target hierarchy, most
    /// specific first: the sub-task parent, then the epic.
    pub fn parent_candidates(&self) -> Vec<&str> {
        [self.parent_key.as_deref(), self.epic_link.as_deref()]
            .into_iter()
            .flatten()
            .filter(|k| !k.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sprint {
    pub id: u64,
    pub name: String,
    pub active: bool,
    pub board_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    pub id: u64,
    pub name: String,
}

/// One page of search results plus the total the tracker reported for the query.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub records: Vec<SourceRecord>,
    pub total: usize,
}

impl SourcePage {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_task_comes_before_epic() {
        let record = SourceRecord {
            key: "PROJ-3".into(),
            parent_key: Some("PROJ-2".into()),
            epic_link: Some("PROJ-1".into()),
            ..Default::default()
        };
        assert_eq!(record.parent_candidates(), vec!["PROJ-2", "PROJ-1"]);
    }

    #[test]
    fn blank_links_are_ignored() {
        let record = SourceRecord {
            key: "PROJ-3".into(),
            parent_key: Some(String::new()),
            epic_link: Some("PROJ-1".into()),
            ..Default::default()
        };
        assert_eq!(record.parent_candidates(), vec!["PROJ-1"]);
        assert!(SourceRecord::default().parent_candidates().is_empty());
    }
}
