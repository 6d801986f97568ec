use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::{check_status, TargetTracker};
use crate::config::DevOpsConfig;
use crate::model::patch::FieldPatch;
use crate::model::target::{IterationNode, Relation, TargetId, TargetRecord};

pub struct DevOpsProvider {
    base_url: String,
    auth_header: String,
    api_version: String,
    bypass_rules: bool,
    client: reqwest::Client,
}

impl DevOpsProvider {
    pub fn new(config: &DevOpsConfig) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!(":{}", config.pat));
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {encoded}"),
            api_version: config.api_version.clone(),
            bypass_rules: config.bypass_rules,
            client: reqwest::Client::new(),
        }
    }

    fn project_url(&self, project: &str, rest: &str) -> String {
        format!("{}/{}/_apis/{rest}", self.base_url, urlencoding::encode(project))
    }

    fn write_params(&self, validate_only: bool) -> [(&str, String); 3] {
        [
            ("api-version", self.api_version.clone()),
            ("validateOnly", validate_only.to_string()),
            ("bypassRules", self.bypass_rules.to_string()),
        ]
    }

    async fn send_patch(
        &self,
        request: reqwest::RequestBuilder,
        patch: &FieldPatch,
        what: &str,
    ) -> Result<TargetRecord> {
        let resp = request
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json-patch+json")
            .body(patch.to_json_patch().to_string())
            .send()
            .await
            .with_context(|| format!("DevOps {what} request failed"))?;
        let item: WorkItemResponse = check_status(resp, what)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse DevOps {what} response"))?;
        Ok(item.into())
    }
}

/// Quote a value for a WIQL string literal.
pub fn wiql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WiqlResponse {
    #[serde(default)]
    work_items: Vec<WiqlRef>,
}

#[derive(Deserialize)]
struct WiqlRef {
    id: TargetId,
}

#[derive(Deserialize)]
struct WorkItemResponse {
    #[serde(default)]
    id: TargetId,
    #[serde(default)]
    url: String,
    #[serde(default)]
    fields: BTreeMap<String, Value>,
    #[serde(default)]
    relations: Vec<RelationResponse>,
}

#[derive(Deserialize)]
struct RelationResponse {
    rel: String,
    url: String,
    #[serde(default)]
    attributes: Option<Value>,
}

impl From<WorkItemResponse> for TargetRecord {
    fn from(item: WorkItemResponse) -> Self {
        let relations = item
            .relations
            .into_iter()
            .map(|r| Relation {
                target_id: id_from_url(&r.url).unwrap_or_default(),
                comment: r
                    .attributes
                    .as_ref()
                    .and_then(|a| a.get("comment"))
                    .and_then(|c| c.as_str())
                    .map(String::from),
                rel: r.rel,
                url: r.url,
            })
            .collect();
        TargetRecord {
            id: item.id,
            url: item.url,
            fields: item.fields,
            relations,
        }
    }
}

/// Work item URLs end in `/workItems/<id>`.
fn id_from_url(url: &str) -> Option<TargetId> {
    url.rsplit('/').next()?.parse().ok()
}

#[async_trait]
impl TargetTracker for DevOpsProvider {
    fn name(&self) -> &str {
        "Azure DevOps"
    }

    async fn find_id_by_title(&self, project: &str, needle: &str) -> Result<Option<TargetId>> {
        let query = format!(
            "Select [System.Id] From WorkItems Where [System.TeamProject] = {} AND [System.Title] CONTAINS {}",
            wiql_literal(project),
            wiql_literal(needle)
        );
        let resp = self
            .client
            .post(self.project_url(project, "wit/wiql"))
            .query(&[("api-version", &self.api_version)])
            .header("Authorization", &self.auth_header)
            .json(&json!({ "query": query }))
            .send()
            .await
            .context("DevOps WIQL request failed")?;
        let result: WiqlResponse = check_status(resp, "WIQL query")
            .await?
            .json()
            .await
            .context("Failed to parse WIQL response")?;
        Ok(result.work_items.first().map(|w| w.id))
    }

    async fn get_record(&self, id: TargetId) -> Result<TargetRecord> {
        let resp = self
            .client
            .get(format!("{}/_apis/wit/workitems/{id}", self.base_url))
            .query(&[("api-version", self.api_version.as_str()), ("$expand", "relations")])
            .header("Authorization", &self.auth_header)
            .send()
            .await
            .with_context(|| format!("DevOps work item {id} request failed"))?;
        let item: WorkItemResponse = check_status(resp, "work item lookup")
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse work item {id}"))?;
        Ok(item.into())
    }

    async fn create_record(
        &self,
        project: &str,
        work_item_type: &str,
        patch: &FieldPatch,
        validate_only: bool,
    ) -> Result<TargetRecord> {
        let url = self.project_url(
            project,
            &format!("wit/workitems/${}", urlencoding::encode(work_item_type)),
        );
        let request = self.client.post(url).query(&self.write_params(validate_only));
        self.send_patch(request, patch, "work item create").await
    }

    async fn update_record(
        &self,
        id: TargetId,
        patch: &FieldPatch,
        validate_only: bool,
    ) -> Result<TargetRecord> {
        let request = self
            .client
            .patch(format!("{}/_apis/wit/workitems/{id}", self.base_url))
            .query(&self.write_params(validate_only));
        self.send_patch(request, patch, "work item update").await
    }

    async fn list_iterations(&self, project: &str) -> Result<IterationNode> {
        let resp = self
            .client
            .get(self.project_url(project, "wit/classificationnodes/Iterations"))
            .query(&[("api-version", self.api_version.as_str()), ("$depth", "10")])
            .header("Authorization", &self.auth_header)
            .send()
            .await
            .context("DevOps iteration listing failed")?;
        check_status(resp, "iteration listing")
            .await?
            .json()
            .await
            .context("Failed to parse iteration tree")
    }

    async fn create_iteration(&self, project: &str, name: &str) -> Result<IterationNode> {
        let resp = self
            .client
            .post(self.project_url(project, "wit/classificationnodes/Iterations"))
            .query(&[("api-version", &self.api_version)])
            .header("Authorization", &self.auth_header)
            .json(&json!({ "name": name }))
            .send()
            .await
            .with_context(|| format!("DevOps iteration create for '{name}' failed"))?;
        check_status(resp, "iteration create")
            .await?
            .json()
            .await
            .context("Failed to parse created iteration")
    }
}
