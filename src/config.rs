use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cli::Cli;
use crate::sync::SyncMode;
use crate::util::text::parse_queries;

pub const DEFAULT_CONFIG_FILE: &str = "jira2devops.toml";
pub const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("one or more settings are missing: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("page_size must be greater than zero")]
    InvalidPageSize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: SyncMode,
    pub page_size: usize,
    /// Newline-delimited JQL queries, processed in order.
    pub queries: String,
    pub jira: JiraConfig,
    pub devops: DevOpsConfig,
    pub mappings: MappingsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::default(),
            page_size: DEFAULT_PAGE_SIZE,
            queries: String::new(),
            jira: JiraConfig::default(),
            devops: DevOpsConfig::default(),
            mappings: MappingsConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub project: String,
    pub sprint_field: String,
    pub epic_link_field: String,
    pub story_points_field: String,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::new(),
            password: String::new(),
            project: String::new(),
            sprint_field: "customfield_10020".into(),
            epic_link_field: "customfield_10014".into(),
            story_points_field: "customfield_10016".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DevOpsConfig {
    pub url: String,
    pub project: String,
    pub pat: String,
    pub api_version: String,
    /// Lets creates set history fields such as CreatedDate and CreatedBy.
    pub bypass_rules: bool,
}

impl Default for DevOpsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            project: String::new(),
            pat: String::new(),
            api_version: "7.1".into(),
            bypass_rules: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct MappingsConfig {
    pub status: HashMap<String, String>,
    pub priority: HashMap<String, String>,
    #[serde(rename = "type")]
    pub issue_type: HashMap<String, String>,
    pub users: HashMap<String, String>,
}

impl AppConfig {
    /// Overlay command-line values on top of the file.
    pub fn apply_cli(&mut self, cli: &Cli) {
        fn take(slot: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }
        take(&mut self.jira.url, &cli.jira_url);
        take(&mut self.jira.user, &cli.jira_user);
        take(&mut self.jira.password, &cli.jira_password);
        take(&mut self.jira.project, &cli.jira_project);
        take(&mut self.devops.url, &cli.devops_url);
        take(&mut self.devops.project, &cli.devops_project);
        take(&mut self.devops.pat, &cli.devops_pat);
        if cli.readonly {
            self.mode = SyncMode::ReadOnly;
        }
        if let Some(size) = cli.page_size {
            self.page_size = size;
        }
    }

    pub fn query_list(&self) -> Vec<String> {
        parse_queries(&self.queries)
    }

    /// Check every required setting, reporting all missing ones at once,
    /// and normalise short-form URLs.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let checks: [(&'static str, bool); 8] = [
            ("jira.url", self.jira.url.is_empty()),
            ("jira.user", self.jira.user.is_empty()),
            ("jira.password", self.jira.password.is_empty()),
            ("jira.project", self.jira.project.is_empty()),
            ("devops.url", self.devops.url.is_empty()),
            ("devops.project", self.devops.project.is_empty()),
            ("devops.pat", self.devops.pat.is_empty()),
            ("queries", self.query_list().is_empty()),
        ];
        let missing: Vec<&'static str> = checks
            .into_iter()
            .filter(|(_, absent)| *absent)
            .map(|(name, _)| name)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }

        self.jira.url = normalize_url(&self.jira.url, |v| format!("https://{v}.atlassian.net"));
        self.devops.url = normalize_url(&self.devops.url, |v| format!("https://dev.azure.com/{v}"));
        Ok(self)
    }
}

/// Bare account names expand to the hosted service URL; anything starting
/// with `http` is used as given.
fn normalize_url(value: &str, expand: impl Fn(&str) -> String) -> String {
    let value = value.trim().trim_end_matches('/');
    if value.to_ascii_lowercase().starts_with("http") {
        value.to_string()
    } else {
        expand(value)
    }
}

/// Read the config file. Only the default file may be absent, in which case
/// every setting has to come from the command line.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if path == Path::new(DEFAULT_CONFIG_FILE) && !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    const FULL: &str = r#"
mode = "read-only"
queries = """
project = X and status != done
// project = OLD
"""

[jira]
url = "acme"
user = "sync@acme.test"
password = "secret"
project = "X"

[devops]
url = "https://dev.azure.com/acme/"
project = "Platform"
pat = "token"

[mappings.status]
"To Do" = "New"
"Done" = "Closed"

[mappings.type]
Story = "User Story"
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_and_normalises_full_config() {
        let file = write_config(FULL);
        let config = load_config(file.path()).unwrap().validate().unwrap();

        assert_eq!(config.mode, SyncMode::ReadOnly);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.jira.url, "https://acme.atlassian.net");
        assert_eq!(config.devops.url, "https://dev.azure.com/acme");
        assert_eq!(config.query_list(), vec!["project = X and status != done"]);
        assert_eq!(config.mappings.status["To Do"], "New");
        assert_eq!(config.mappings.issue_type["Story"], "User Story");
        assert_eq!(config.jira.sprint_field, "customfield_10020");
        assert!(config.devops.bypass_rules);
    }

    #[test]
    fn absent_default_file_yields_defaults() {
        let config = load_config(Path::new(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config.mode, SyncMode::ReadWrite);
        assert!(config.queries.is_empty());
    }

    #[test]
    fn named_file_that_does_not_exist_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        match load_config(&path).unwrap_err() {
            ConfigError::Read { path: reported, source } => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let file = write_config("mode = [");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let file = write_config("mode = \"sometimes\"");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn every_missing_setting_is_reported() {
        let err = AppConfig::default().validate().unwrap_err();
        match err {
            ConfigError::Missing(names) => {
                assert_eq!(names.len(), 8);
                assert!(names.contains(&"devops.pat"));
                assert!(names.contains(&"queries"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cli_values_override_file() {
        let file = write_config(FULL);
        let mut config = load_config(file.path()).unwrap();
        let cli = Cli::parse_from([
            "jira2devops",
            "--jira-url",
            "https://jira.internal",
            "--devops-pat",
            "other",
            "--page-size",
            "50",
        ]);
        config.apply_cli(&cli);
        let config = config.validate().unwrap();

        assert_eq!(config.jira.url, "https://jira.internal");
        assert_eq!(config.devops.pat, "other");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.mode, SyncMode::ReadOnly);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let file = write_config(FULL);
        let mut config = load_config(file.path()).unwrap();
        config.page_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPageSize)
        ));
    }
}
