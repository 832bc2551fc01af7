//! GitHub deployment bookkeeping: deployments, deployment statuses and
//! environments.

use anyhow::{Context, Result};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use urlencoding::encode;

use crate::api::ApiClient;
use crate::engine::Reporter;
use crate::error::CreationError;
use crate::retention;
use crate::types::{DeploymentRecord, PruneFailure, PruneReport};

/// Page size used when listing deployments.
pub const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct Created {
    id: u64,
}

#[derive(Debug, Clone)]
pub struct GithubRegistry {
    api: ApiClient,
}

impl GithubRegistry {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Deployments for `environment`, most recently updated first.
    ///
    /// The ref filter uses the environment name, since previews are named
    /// after the branch they deploy.
    pub fn list_deployments(
        &self,
        repository: &str,
        environment: &str,
    ) -> Result<Vec<DeploymentRecord>> {
        let env = encode(environment);
        let mut records = Vec::new();
        let mut page = 1;

        // A short page is the last one.
        loop {
            let path = format!(
                "/repos/{repository}/deployments?ref={env}&environment={env}&per_page={PER_PAGE}&page={page}"
            );
            let batch: Vec<DeploymentRecord> = self
                .api
                .get(&path)
                .with_context(|| format!("failed to list deployments for {environment}"))?
                .unwrap_or_default();
            let fetched = batch.len();
            records.extend(batch);

            if fetched < PER_PAGE {
                break;
            }
            page += 1;
        }

        retention::sort_newest_first(&mut records, |r| r.updated_at);
        Ok(records)
    }

    /// Reuse the newest deployment for `environment`, or create one.
    pub fn get_or_create_deployment(&self, repository: &str, environment: &str) -> Result<u64> {
        if let Some(existing) = self.list_deployments(repository, environment)?.first() {
            return Ok(existing.id);
        }

        let body = json!({
            "ref": environment,
            "environment": environment,
            "required_contexts": [],
            "transient_environment": true,
        });
        let created: Option<Created> = self
            .api
            .send(
                Method::POST,
                &format!("/repos/{repository}/deployments"),
                Some(&body),
            )
            .with_context(|| format!("failed to create deployment for {environment}"))?;

        created
            .map(|c| c.id)
            .ok_or_else(|| {
                CreationError::Deployment {
                    repository: repository.to_string(),
                    environment: environment.to_string(),
                }
                .into()
            })
    }

    /// Mark a deployment successful at `url`.
    pub fn create_deployment_status(
        &self,
        repository: &str,
        deployment_id: u64,
        url: &str,
    ) -> Result<u64> {
        let body = json!({
            "state": "success",
            "environment_url": url,
            "auto_inactive": true,
        });
        let created: Option<Created> = self
            .api
            .send(
                Method::POST,
                &format!("/repos/{repository}/deployments/{deployment_id}/statuses"),
                Some(&body),
            )
            .with_context(|| format!("failed to create status for deployment {deployment_id}"))?;

        created
            .map(|c| c.id)
            .ok_or_else(|| {
                CreationError::Status {
                    repository: repository.to_string(),
                    deployment_id,
                }
                .into()
            })
    }

    /// Create or update the environment resource.
    pub fn ensure_environment(&self, repository: &str, environment: &str) -> Result<()> {
        let body = json!({
            "wait_timer": 0,
            "reviewers": null,
            "deployment_branch_policy": null,
        });
        self.api
            .request(
                Method::PUT,
                &format!("/repos/{repository}/environments/{}", encode(environment)),
                Some(&body),
            )
            .with_context(|| format!("failed to ensure environment {environment}"))?;
        Ok(())
    }

    /// Delete the environment resource. Already-absent environments are fine.
    pub fn delete_environment(&self, repository: &str, environment: &str) -> Result<()> {
        self.api
            .request(
                Method::DELETE,
                &format!("/repos/{repository}/environments/{}", encode(environment)),
                None,
            )
            .with_context(|| format!("failed to delete environment {environment}"))?;
        Ok(())
    }

    pub fn branch_exists(&self, repository: &str, branch: &str) -> Result<bool> {
        let found = self
            .api
            .request(
                Method::GET,
                &format!("/repos/{repository}/branches/{}", encode(branch)),
                None,
            )
            .with_context(|| format!("failed to look up branch {branch}"))?;
        Ok(found.is_some())
    }

    /// Deactivate and delete every deployment beyond the newest
    /// `max_deployments`.
    ///
    /// Each stale record first gets an `inactive` status, then is deleted.
    /// A failure on one record is reported and the loop moves on.
    pub fn prune_deployments(
        &self,
        repository: &str,
        environment: &str,
        max_deployments: usize,
        reporter: &mut dyn Reporter,
    ) -> Result<PruneReport> {
        let records = self.list_deployments(repository, environment)?;
        let (retained, stale) = retention::split_retained(&records, max_deployments);

        let mut report = PruneReport::new(environment);
        report.retained = retained.len();

        if stale.is_empty() {
            reporter.debug(&format!(
                "github: {environment} has {} deployment(s), nothing to prune",
                records.len()
            ));
            return Ok(report);
        }

        reporter.info(&format!(
            "github: pruning {} of {} deployment(s) in {environment}",
            stale.len(),
            records.len()
        ));

        for record in stale {
            match self.deactivate_and_delete(repository, record.id) {
                Ok(()) => {
                    reporter.debug(&format!("github: deleted deployment {}", record.id));
                    report.pruned.push(record.id.to_string());
                }
                Err(e) => {
                    reporter.warn(&format!(
                        "github: failed to prune deployment {}: {e:#}",
                        record.id
                    ));
                    report.failed.push(PruneFailure {
                        id: record.id.to_string(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }

        Ok(report)
    }

    fn deactivate_and_delete(&self, repository: &str, deployment_id: u64) -> Result<()> {
        self.api
            .request(
                Method::POST,
                &format!("/repos/{repository}/deployments/{deployment_id}/statuses"),
                Some(&json!({ "state": "inactive" })),
            )
            .context("failed to mark deployment inactive")?;
        self.api
            .request(
                Method::DELETE,
                &format!("/repos/{repository}/deployments/{deployment_id}"),
                None,
            )
            .context("failed to delete deployment")?;
        Ok(())
    }
}
