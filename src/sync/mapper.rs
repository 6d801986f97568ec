use std::collections::HashMap;
use tracing::warn;

use crate::config::MappingsConfig;

/// Translation table for one kind of source value.
///
/// Values without an entry pass through unchanged so an incomplete table
/// never blocks a run.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    kind: &'static str,
    entries: HashMap<String, String>,
}

impl MappingTable {
    pub fn new(kind: &'static str, entries: HashMap<String, String>) -> Self {
        Self { kind, entries }
    }

    pub fn map(&self, value: Option<&str>) -> String {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return String::new();
        };
        match self.entries.get(value) {
            Some(mapped) => mapped.clone(),
            None => {
                warn!(kind = self.kind, value, "cannot map value, passing it through");
                value.to_string()
            }
        }
    }
}

/// Source status/priority/type/user values to their target equivalents.
#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    status: MappingTable,
    priority: MappingTable,
    issue_type: MappingTable,
    users: MappingTable,
}

impl FieldMapper {
    pub fn new(config: &MappingsConfig) -> Self {
        Self {
            status: MappingTable::new("status", config.status.clone()),
            priority: MappingTable::new("priority", config.priority.clone()),
            issue_type: MappingTable::new("type", config.issue_type.clone()),
            users: MappingTable::new("user", config.users.clone()),
        }
    }

    pub fn status(&self, value: Option<&str>) -> String {
        self.status.map(value)
    }

    pub fn priority(&self, value: Option<&str>) -> String {
        self.priority.map(value)
    }

    pub fn issue_type(&self, value: Option<&str>) -> String {
        self.issue_type.map(value)
    }

    pub fn user(&self, value: Option<&str>) -> String {
        self.users.map(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> FieldMapper {
        let mut config = MappingsConfig::default();
        config.status.insert("To Do".into(), "New".into());
        config.status.insert("Done".into(), "Closed".into());
        config.priority.insert("High".into(), "1".into());
        config.issue_type.insert("Story".into(), "User Story".into());
        config.users.insert("alice".into(), "alice@acme.test".into());
        FieldMapper::new(&config)
    }

    #[test]
    fn mapped_values_translate() {
        let m = mapper();
        assert_eq!(m.status(Some("To Do")), "New");
        assert_eq!(m.priority(Some("High")), "1");
        assert_eq!(m.issue_type(Some("Story")), "User Story");
        assert_eq!(m.user(Some("alice")), "alice@acme.test");
    }

    #[test]
    fn unmapped_value_passes_through() {
        let m = mapper();
        assert_eq!(m.status(Some("In Testing")), "In Testing");
        assert_eq!(m.user(Some("carol")), "carol");
    }

    #[test]
    fn absent_value_maps_to_empty() {
        let m = mapper();
        assert_eq!(m.status(None), "");
        assert_eq!(m.priority(Some("")), "");
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(mapper().status(Some("to do")), "to do");
    }
}
