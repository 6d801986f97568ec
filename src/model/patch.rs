use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::target::Relation;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Date(DateTime<Utc>),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Number(n) => json!(n),
            FieldValue::Integer(n) => json!(n),
            FieldValue::Date(d) => Value::String(d.to_rfc3339()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(d: DateTime<Utc>) -> Self {
        FieldValue::Date(d)
    }
}

/// Ordered set of field writes plus relations to add, sent as one JSON patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    fields: Vec<(String, FieldValue)>,
    relations: Vec<Relation>,
}

impl FieldPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `path = value`. Absent values and empty strings are dropped.
    pub fn set<V: Into<FieldValue>>(&mut self, path: &str, value: Option<V>) -> &mut Self {
        let Some(value) = value.map(Into::into) else {
            return self;
        };
        if matches!(&value, FieldValue::Text(s) if s.is_empty()) {
            return self;
        }
        self.fields.push((path.to_string(), value));
        self
    }

    pub fn relate(&mut self, relation: Relation) -> &mut Self {
        self.relations.push(relation);
        self
    }

    pub fn get(&self, path: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v)
    }

    #[cfg(test)]
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    #[cfg(test)]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Render as the `application/json-patch+json` body DevOps expects.
    pub fn to_json_patch(&self) -> Value {
        let mut ops: Vec<Value> = self
            .fields
            .iter()
            .map(|(path, value)| {
                json!({
                    "op": "add",
                    "path": format!("/fields/{path}"),
                    "value": value.to_json(),
                })
            })
            .collect();

        for rel in &self.relations {
            let mut value = json!({ "rel": rel.rel, "url": rel.url });
            if let Some(comment) = &rel.comment {
                value["attributes"] = json!({ "comment": comment });
            }
            ops.push(json!({ "op": "add", "path": "/relations/-", "value": value }));
        }

        Value::Array(ops)
    }
}
