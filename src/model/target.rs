use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier DevOps assigns to a work item.
pub type TargetId = i64;

pub const HIERARCHY_REVERSE: &str = "System.LinkTypes.Hierarchy-Reverse";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: TargetId,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl TargetRecord {
    pub fn title(&self) -> Option<&str> {
        self.fields.get("System.Title").and_then(|v| v.as_str())
    }
}

/// A typed link from one work item to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub rel: String,
    pub target_id: TargetId,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Relation {
    /// "This item's parent is `parent`."
    pub fn parent(parent: &TargetRecord, comment: &str) -> Self {
        Self {
            rel: HIERARCHY_REVERSE.into(),
            target_id: parent.id,
            url: parent.url.clone(),
            comment: Some(comment.into()),
        }
    }

    #[cfg(test)]
    pub fn is_parent_link(&self) -> bool {
        self.rel == HIERARCHY_REVERSE
    }
}

/// A node of the project's iteration classification tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationNode {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub children: Vec<IterationNode>,
}

impl IterationNode {
    /// Depth-first search of this node's descendants for `name`, ignoring case.
    /// The root itself is the project and is never matched.
    pub fn find_child(&self, name: &str) -> Option<&IterationNode> {
        self.children.iter().find_map(|child| {
            if child.name.eq_ignore_ascii_case(name) {
                Some(child)
            } else {
                child.find_child(name)
            }
        })
    }
}
