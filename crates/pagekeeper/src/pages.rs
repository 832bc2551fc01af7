//! Cloudflare Pages bookkeeping: projects, deployments and environment
//! variables.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use urlencoding::encode;

use crate::api::{ApiClient, decode};
use crate::engine::Reporter;
use crate::retention;
use crate::types::{ConfigSection, PageDeployment, PruneFailure, PruneReport};

/// Page size used when listing collections.
pub const PAGE_SIZE: u32 = 25;

/// Cloudflare wraps every result in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    page: Option<u32>,
    total_pages: Option<u32>,
    total_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawDeployment {
    id: String,
    created_on: DateTime<Utc>,
    #[serde(default)]
    deployment_trigger: Option<Trigger>,
}

#[derive(Debug, Deserialize)]
struct Trigger {
    #[serde(default)]
    metadata: Option<TriggerMetadata>,
}

#[derive(Debug, Deserialize)]
struct TriggerMetadata {
    #[serde(default)]
    branch: Option<String>,
}

impl From<RawDeployment> for PageDeployment {
    fn from(raw: RawDeployment) -> Self {
        Self {
            id: raw.id,
            created_on: raw.created_on,
            branch: raw
                .deployment_trigger
                .and_then(|t| t.metadata)
                .and_then(|m| m.branch),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PagesProject {
    pub name: String,
    #[serde(default)]
    pub subdomain: Option<String>,
    #[serde(default)]
    pub production_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectConfigs {
    #[serde(default)]
    deployment_configs: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct PagesRegistry {
    api: ApiClient,
    account_id: String,
}

impl PagesRegistry {
    pub fn new(api: ApiClient, account_id: &str) -> Self {
        Self {
            api,
            account_id: account_id.to_string(),
        }
    }

    fn projects_path(&self) -> String {
        format!("/accounts/{}/pages/projects", self.account_id)
    }

    fn project_path(&self, project: &str) -> String {
        format!("{}/{}", self.projects_path(), encode(project))
    }

    /// Follow `result_info` pagination until every page is collected.
    fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let paged = format!("{path}?page={page}&per_page={PAGE_SIZE}");
            let Some(value) = self.api.request(Method::GET, &paged, None)? else {
                break;
            };
            let envelope: Envelope<Vec<T>> = decode(value, &paged)?;
            let batch = envelope.result.unwrap_or_default();
            let fetched = batch.len();
            items.extend(batch);

            // Without page counts, a full page means there may be more.
            let more = match envelope.result_info {
                Some(ResultInfo {
                    page: Some(current),
                    total_pages: Some(total),
                    ..
                }) => current < total,
                Some(ResultInfo {
                    total_count: Some(total),
                    ..
                }) => items.len() < total,
                _ => fetched == PAGE_SIZE as usize,
            };
            if !more || fetched == 0 {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    pub fn find_project(&self, name: &str) -> Result<Option<PagesProject>> {
        let projects: Vec<PagesProject> = self
            .list_all(&self.projects_path())
            .context("failed to list Pages projects")?;
        Ok(projects.into_iter().find(|p| p.name == name))
    }

    /// Deployments of `project`, newest first, optionally limited to one
    /// branch.
    pub fn list_page_deployments(
        &self,
        project: &str,
        environment: Option<&str>,
    ) -> Result<Vec<PageDeployment>> {
        let raw: Vec<RawDeployment> = self
            .list_all(&format!("{}/deployments", self.project_path(project)))
            .with_context(|| format!("failed to list deployments of {project}"))?;

        let mut deployments: Vec<PageDeployment> = raw
            .into_iter()
            .map(PageDeployment::from)
            .filter(|d| match environment {
                Some(env) => d.branch.as_deref() == Some(env),
                None => true,
            })
            .collect();

        retention::sort_newest_first(&mut deployments, |d| d.created_on);
        Ok(deployments)
    }

    pub fn delete_deployment(&self, project: &str, deployment_id: &str) -> Result<()> {
        self.api
            .request(
                Method::DELETE,
                &format!(
                    "{}/deployments/{}?force=true",
                    self.project_path(project),
                    encode(deployment_id)
                ),
                None,
            )
            .with_context(|| format!("failed to delete Pages deployment {deployment_id}"))?;
        Ok(())
    }

    /// Delete every deployment of `environment` beyond the newest
    /// `max_deployments`.
    ///
    /// Pages refuses to delete some deployments (for example one that is
    /// still building), so per-record failures are reported and skipped.
    pub fn prune_page_deployments(
        &self,
        project: &str,
        environment: &str,
        max_deployments: usize,
        reporter: &mut dyn Reporter,
    ) -> Result<PruneReport> {
        let deployments = self.list_page_deployments(project, Some(environment))?;
        let (retained, stale) = retention::split_retained(&deployments, max_deployments);

        let mut report = PruneReport::new(environment);
        report.retained = retained.len();

        if stale.is_empty() {
            reporter.debug(&format!(
                "pages: {environment} has {} deployment(s), nothing to prune",
                deployments.len()
            ));
            return Ok(report);
        }

        reporter.info(&format!(
            "pages: pruning {} of {} deployment(s) in {environment}",
            stale.len(),
            deployments.len()
        ));

        for deployment in stale {
            match self.delete_deployment(project, &deployment.id) {
                Ok(()) => {
                    reporter.debug(&format!("pages: deleted deployment {}", deployment.id));
                    report.pruned.push(deployment.id.clone());
                }
                Err(e) => {
                    reporter.warn(&format!(
                        "pages: failed to delete deployment {}: {e:#}",
                        deployment.id
                    ));
                    report.failed.push(PruneFailure {
                        id: deployment.id.clone(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Merge variables and secrets into the section `environment` maps to,
    /// leaving the other section as it was.
    pub fn patch_environment_variables(
        &self,
        project: &str,
        environment: &str,
        head: &str,
        variables: &BTreeMap<String, String>,
        secrets: &BTreeMap<String, String>,
    ) -> Result<()> {
        let path = self.project_path(project);
        let current: Option<Envelope<ProjectConfigs>> = self
            .api
            .get(&path)
            .with_context(|| format!("failed to read configuration of {project}"))?;
        let configs = current
            .and_then(|e| e.result)
            .and_then(|p| p.deployment_configs)
            .unwrap_or_else(|| json!({}));

        let section = ConfigSection::for_environment(environment, head);
        let merged = merge_env_vars(configs, section, variables, secrets);

        self.api
            .request(
                Method::PATCH,
                &path,
                Some(&json!({ "deployment_configs": merged })),
            )
            .with_context(|| format!("failed to update {} variables of {project}", section.as_str()))?;
        Ok(())
    }
}

/// Fold variables into `deployment_configs.<section>.env_vars`.
///
/// Secrets win over plain variables of the same name. Every other key of
/// `configs`, including the sibling section, is returned untouched.
pub fn merge_env_vars(
    configs: Value,
    section: ConfigSection,
    variables: &BTreeMap<String, String>,
    secrets: &BTreeMap<String, String>,
) -> Value {
    let mut configs = match configs {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let section_entry = configs
        .entry(section.as_str())
        .or_insert_with(|| json!({}));
    if !section_entry.is_object() {
        *section_entry = json!({});
    }

    let env_vars = section_entry
        .as_object_mut()
        .map(|s| s.entry("env_vars").or_insert_with(|| json!({})));
    if let Some(env_vars) = env_vars {
        if !env_vars.is_object() {
            *env_vars = json!({});
        }
        if let Some(env_vars) = env_vars.as_object_mut() {
            for (name, value) in variables {
                env_vars.insert(name.clone(), json!({ "type": "plain_text", "value": value }));
            }
            for (name, value) in secrets {
                env_vars.insert(name.clone(), json!({ "type": "secret_text", "value": value }));
            }
        }
    }

    Value::Object(configs)
}
