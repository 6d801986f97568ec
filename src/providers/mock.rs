//! In-memory trackers for exercising the sync engine without a network.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{SourceTracker, TargetTracker};
use crate::model::patch::FieldPatch;
use crate::model::source::{Board, SourcePage, SourceRecord, Sprint};
use crate::model::target::{IterationNode, TargetId, TargetRecord};

/// `count` issues keyed `<project>-1..=<project>-count`.
pub fn issues(project: &str, count: usize) -> Vec<SourceRecord> {
    (1..=count)
        .map(|n| SourceRecord {
            key: format!("{project}-{n}"),
            summary: format!("Issue {n}"),
            issue_type: Some("Story".into()),
            ..Default::default()
        })
        .collect()
}

#[derive(Default)]
pub struct MockSource {
    queries: HashMap<String, Vec<SourceRecord>>,
    by_key: HashMap<String, SourceRecord>,
    boards: Vec<(Board, Vec<String>)>,
    searches: Mutex<Vec<(String, usize)>>,
    lookups: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results for `jql`; each record is also reachable by key.
    pub fn with_query(mut self, jql: &str, records: Vec<SourceRecord>) -> Self {
        for r in &records {
            self.by_key.insert(r.key.clone(), r.clone());
        }
        self.queries.insert(jql.to_string(), records);
        self
    }

    /// An issue reachable only by key lookup.
    pub fn with_issue(mut self, record: SourceRecord) -> Self {
        self.by_key.insert(record.key.clone(), record);
        self
    }

    pub fn with_board(mut self, id: u64, active_sprints: &[&str]) -> Self {
        let board = Board {
            id,
            name: format!("Board {id}"),
        };
        self.boards
            .push((board, active_sprints.iter().map(|s| s.to_string()).collect()));
        self
    }

    pub fn search_offsets(&self) -> Vec<usize> {
        self.searches.lock().unwrap().iter().map(|(_, s)| *s).collect()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceTracker for MockSource {
    fn name(&self) -> &str {
        "MockJira"
    }

    async fn query_issues(&self, jql: &str, start_at: usize, page_size: usize) -> Result<SourcePage> {
        self.searches.lock().unwrap().push((jql.to_string(), start_at));
        let all = self.queries.get(jql).map(Vec::as_slice).unwrap_or_default();
        let records = all.iter().skip(start_at).take(page_size).cloned().collect();
        Ok(SourcePage {
            records,
            total: all.len(),
        })
    }

    async fn get_issue(&self, key: &str) -> Result<Option<SourceRecord>> {
        self.lookups.lock().unwrap().push(key.to_string());
        Ok(self.by_key.get(key).cloned())
    }

    async fn list_boards(&self, _project_key: &str) -> Result<Vec<Board>> {
        Ok(self.boards.iter().map(|(b, _)| b.clone()).collect())
    }

    async fn list_sprints(&self, board_id: u64, _state: &str) -> Result<Vec<Sprint>> {
        let names = self
            .boards
            .iter()
            .find(|(b, _)| b.id == board_id)
            .map(|(_, s)| s.clone())
            .unwrap_or_default();
        Ok(names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Sprint {
                id: board_id * 100 + i as u64,
                name,
                active: true,
                board_id: Some(board_id),
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
}

/// One create/update call as the engine issued it.
#[derive(Debug, Clone)]
pub struct WriteCall {
    pub kind: WriteKind,
    pub id: Option<TargetId>,
    pub work_item_type: Option<String>,
    pub patch: FieldPatch,
    pub validate_only: bool,
}

impl WriteCall {
    pub fn title(&self) -> Option<String> {
        self.patch
            .get("System.Title")
            .and_then(|v| v.to_json().as_str().map(String::from))
    }
}

struct TargetState {
    records: Vec<TargetRecord>,
    iterations: IterationNode,
    next_id: TargetId,
}

pub struct MockTarget {
    state: Mutex<TargetState>,
    /// Creates whose title contains this tag are refused.
    reject: Option<String>,
    writes: Mutex<Vec<WriteCall>>,
    created_iterations: Mutex<Vec<String>>,
}

impl MockTarget {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TargetState {
                records: Vec::new(),
                iterations: IterationNode {
                    id: 1,
                    name: "Platform".into(),
                    children: Vec::new(),
                },
                next_id: 100,
            }),
            reject: None,
            writes: Mutex::new(Vec::new()),
            created_iterations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_iteration(self, name: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;
            state.iterations.children.push(IterationNode {
                id,
                name: name.into(),
                children: Vec::new(),
            });
        }
        self
    }

    /// Refuse every create whose title contains `tag`, as a server-side
    /// validation failure would.
    pub fn rejecting(mut self, tag: &str) -> Self {
        self.reject = Some(tag.to_string());
        self
    }

    pub fn iteration_id(&self, name: &str) -> Option<TargetId> {
        self.state.lock().unwrap().iterations.find_child(name).map(|n| n.id)
    }

    /// Store a committed work item with `title`, returning its id.
    pub fn seed(&self, title: &str) -> TargetId {
        let mut patch = FieldPatch::new();
        patch.set("System.Title", Some(title));
        self.store(&patch).id
    }

    fn store(&self, patch: &FieldPatch) -> TargetRecord {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        let record = TargetRecord {
            id,
            url: format!("https://mock/_apis/wit/workItems/{id}"),
            fields: patch
                .fields()
                .iter()
                .map(|(p, v)| (p.clone(), v.to_json()))
                .collect(),
            relations: patch.relations().to_vec(),
        };
        state.records.push(record.clone());
        record
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.writes.lock().unwrap().clone()
    }

    pub fn created_iterations(&self) -> Vec<String> {
        self.created_iterations.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<TargetRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn record_titled(&self, tag: &str) -> Option<TargetRecord> {
        self.records()
            .into_iter()
            .find(|r| r.title().is_some_and(|t| t.contains(tag)))
    }
}

#[async_trait]
impl TargetTracker for MockTarget {
    fn name(&self) -> &str {
        "MockDevOps"
    }

    async fn find_id_by_title(&self, _project: &str, needle: &str) -> Result<Option<TargetId>> {
        Ok(self.record_titled(needle).map(|r| r.id))
    }

    async fn get_record(&self, id: TargetId) -> Result<TargetRecord> {
        self.records()
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("work item {id} does not exist"))
    }

    async fn create_record(
        &self,
        _project: &str,
        work_item_type: &str,
        patch: &FieldPatch,
        validate_only: bool,
    ) -> Result<TargetRecord> {
        self.writes.lock().unwrap().push(WriteCall {
            kind: WriteKind::Create,
            id: None,
            work_item_type: Some(work_item_type.to_string()),
            patch: patch.clone(),
            validate_only,
        });
        if let Some(tag) = &self.reject {
            let title = patch.get("System.Title").map(|v| v.to_json());
            if title.as_ref().and_then(|t| t.as_str()).is_some_and(|t| t.contains(tag.as_str())) {
                anyhow::bail!("work item create failed with 400 Bad Request: validation failed");
            }
        }
        if validate_only {
            return Ok(TargetRecord {
                id: 0,
                url: String::new(),
                fields: Default::default(),
                relations: patch.relations().to_vec(),
            });
        }
        Ok(self.store(patch))
    }

    async fn update_record(
        &self,
        id: TargetId,
        patch: &FieldPatch,
        validate_only: bool,
    ) -> Result<TargetRecord> {
        self.writes.lock().unwrap().push(WriteCall {
            kind: WriteKind::Update,
            id: Some(id),
            work_item_type: None,
            patch: patch.clone(),
            validate_only,
        });
        let mut state = self.state.lock().unwrap();
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("work item {id} does not exist"))?;
        if !validate_only {
            for (path, value) in patch.fields() {
                record.fields.insert(path.clone(), value.to_json());
            }
            record.relations.extend(patch.relations().iter().cloned());
        }
        Ok(record.clone())
    }

    async fn list_iterations(&self, _project: &str) -> Result<IterationNode> {
        Ok(self.state.lock().unwrap().iterations.clone())
    }

    async fn create_iteration(&self, _project: &str, name: &str) -> Result<IterationNode> {
        self.created_iterations.lock().unwrap().push(name.to_string());
        let mut state = self.state.lock().unwrap();
        let node = IterationNode {
            id: state.next_id,
            name: name.to_string(),
            children: Vec::new(),
        };
        state.next_id += 1;
        state.iterations.children.push(node.clone());
        Ok(node)
    }
}
