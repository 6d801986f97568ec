use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::{check_status, SourceTracker};
use crate::config::JiraConfig;
use crate::model::source::{Board, SourcePage, SourceRecord, Sprint};
use crate::util::text::{description_text, parse_jira_datetime};

const BASE_FIELDS: &str =
    "summary,description,reporter,assignee,status,priority,issuetype,labels,created,updated,parent";

pub struct JiraProvider {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
    sprint_field: String,
    epic_link_field: String,
    story_points_field: String,
}

impl JiraProvider {
    pub fn new(config: &JiraConfig) -> Self {
        let creds = format!("{}:{}", config.user, config.password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {encoded}"),
            client: reqwest::Client::new(),
            sprint_field: config.sprint_field.clone(),
            epic_link_field: config.epic_link_field.clone(),
            story_points_field: config.story_points_field.clone(),
        }
    }

    fn fields_param(&self) -> String {
        format!(
            "{BASE_FIELDS},{},{},{}",
            self.sprint_field, self.epic_link_field, self.story_points_field
        )
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        self.client
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Jira request to {path} failed"))
    }

    /// Walk an agile API listing until the server reports the last page.
    async fn agile_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        loop {
            let mut params = query.to_vec();
            params.push(("startAt", all.len().to_string()));
            let resp = check_status(self.get(path, &params).await?, "Jira agile listing").await?;
            let page: AgilePage<T> = resp
                .json()
                .await
                .with_context(|| format!("Failed to parse Jira agile page from {path}"))?;
            let fetched = page.values.len();
            all.extend(page.values);
            if page.is_last || fetched == 0 {
                return Ok(all);
            }
        }
    }

    fn to_record(&self, issue: JiraIssue) -> SourceRecord {
        let f = issue.fields;
        let custom = |id: &str| f.custom.get(id).filter(|v| !v.is_null());

        SourceRecord {
            key: issue.key,
            summary: f.summary.unwrap_or_default(),
            description: f.description.as_ref().and_then(description_text),
            reporter: f.reporter.and_then(JiraUser::identity),
            assignee: f.assignee.and_then(JiraUser::identity),
            status: f.status.map(|s| s.name),
            priority: f.priority.map(|p| p.name),
            issue_type: f.issuetype.map(|t| t.name),
            labels: f.labels,
            created: f.created.as_deref().and_then(parse_jira_datetime),
            updated: f.updated.as_deref().and_then(parse_jira_datetime),
            parent_key: f.parent.map(|p| p.key),
            epic_link: custom(&self.epic_link_field)
                .and_then(|v| v.as_str())
                .map(String::from),
            story_points: custom(&self.story_points_field).and_then(|v| v.as_f64()),
            sprints: custom(&self.sprint_field).map(sprint_names).unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct AgilePage<T> {
    #[serde(default, rename = "isLast")]
    is_last: bool,
    #[serde(default = "Vec::new")]
    values: Vec<T>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Deserialize)]
struct JiraIssue {
    key: String,
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueFields {
    summary: Option<String>,
    description: Option<Value>,
    reporter: Option<JiraUser>,
    assignee: Option<JiraUser>,
    status: Option<NamedField>,
    priority: Option<NamedField>,
    issuetype: Option<NamedField>,
    #[serde(default)]
    labels: Vec<String>,
    created: Option<String>,
    updated: Option<String>,
    parent: Option<ParentField>,
    #[serde(flatten)]
    custom: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct NamedField {
    name: String,
}

#[derive(Deserialize)]
struct ParentField {
    key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraUser {
    name: Option<String>,
    email_address: Option<String>,
    display_name: Option<String>,
}

impl JiraUser {
    /// The most stable identity the instance exposes for this user.
    fn identity(self) -> Option<String> {
        self.email_address.or(self.name).or(self.display_name)
    }
}

#[derive(Deserialize)]
struct BoardResponse {
    id: u64,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SprintResponse {
    id: u64,
    name: String,
    state: String,
    origin_board_id: Option<u64>,
}

/// Sprint names from the sprint custom field.
///
/// Cloud returns objects with a `name`; older servers return
/// `com.atlassian.greenhopper...Sprint@1f[id=3,state=ACTIVE,name=Sprint 3,...]`.
pub fn sprint_names(value: &Value) -> Vec<String> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Object(obj) => obj.get("name").and_then(|n| n.as_str()).map(String::from),
            Value::String(s) => legacy_sprint_name(s),
            _ => None,
        })
        .collect()
}

fn legacy_sprint_name(s: &str) -> Option<String> {
    let start = s.find("name=")? + "name=".len();
    let rest = &s[start..];
    let end = rest
        .find(",startDate=")
        .or_else(|| rest.find(','))
        .or_else(|| rest.rfind(']'))
        .unwrap_or(rest.len());
    let name = rest[..end].trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[async_trait]
impl SourceTracker for JiraProvider {
    fn name(&self) -> &str {
        "Jira"
    }

    async fn query_issues(&self, jql: &str, start_at: usize, page_size: usize) -> Result<SourcePage> {
        let params = [
            ("jql", jql.to_string()),
            ("startAt", start_at.to_string()),
            ("maxResults", page_size.to_string()),
            ("fields", self.fields_param()),
        ];
        let resp = check_status(self.get("/rest/api/2/search", &params).await?, "Jira search").await?;
        let search: SearchResponse = resp.json().await.context("Failed to parse Jira response")?;

        Ok(SourcePage {
            total: search.total,
            records: search.issues.into_iter().map(|i| self.to_record(i)).collect(),
        })
    }

    async fn get_issue(&self, key: &str) -> Result<Option<SourceRecord>> {
        let path = format!("/rest/api/2/issue/{}", urlencoding::encode(key));
        let resp = self.get(&path, &[("fields", self.fields_param())]).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let issue: JiraIssue = check_status(resp, "Jira issue lookup")
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse Jira issue {key}"))?;
        Ok(Some(self.to_record(issue)))
    }

    async fn list_boards(&self, project_key: &str) -> Result<Vec<Board>> {
        let boards: Vec<BoardResponse> = self
            .agile_pages(
                "/rest/agile/1.0/board",
                &[("projectKeyOrId", project_key.to_string())],
            )
            .await?;
        Ok(boards
            .into_iter()
            .map(|b| Board {
                id: b.id,
                name: b.name,
            })
            .collect())
    }

    async fn list_sprints(&self, board_id: u64, state: &str) -> Result<Vec<Sprint>> {
        let path = format!("/rest/agile/1.0/board/{board_id}/sprint");
        // Kanban boards answer the sprint listing with 400.
        let probe = self
            .get(&path, &[("state", state.to_string()), ("maxResults", "1".into())])
            .await?;
        if probe.status() == StatusCode::BAD_REQUEST {
            debug!(board_id, "board does not support sprints");
            return Ok(Vec::new());
        }
        check_status(probe, "Jira sprint listing").await?;

        let sprints: Vec<SprintResponse> = self
            .agile_pages(&path, &[("state", state.to_string())])
            .await?;
        Ok(sprints
            .into_iter()
            .map(|s| Sprint {
                id: s.id,
                active: s.state.eq_ignore_ascii_case("active"),
                name: s.name,
                board_id: s.origin_board_id.or(Some(board_id)),
            })
            .collect())
    }
}
