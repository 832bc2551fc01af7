use anyhow::{Context, Result};

use crate::error::{ConfigError, PublishError};
use crate::github::GithubRegistry;
use crate::pages::PagesRegistry;
use crate::publisher::Publisher;
use crate::retention::RetentionPolicy;
use crate::types::{
    CleanReceipt, CleanRequest, DeployReceipt, DeployRequest, Teardown, is_production,
};

pub trait Reporter {
    fn debug(&mut self, _msg: &str) {}
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Publish the build output and bring both registries up to date.
///
/// Steps run in order and any failure aborts the run. A failure after the
/// publish step leaves the new deployment live with incomplete bookkeeping.
pub fn run_deploy(
    github: &GithubRegistry,
    pages: &PagesRegistry,
    publisher: &dyn Publisher,
    req: &DeployRequest,
    reporter: &mut dyn Reporter,
) -> Result<DeployReceipt> {
    let repository = req.repository.as_str();
    let environment = req.environment.as_str();

    if !github.branch_exists(repository, environment)? {
        return Err(ConfigError::BranchNotFound {
            repository: repository.to_string(),
            branch: environment.to_string(),
        }
        .into());
    }

    let project_created = ensure_project(pages, publisher, &req.project, &req.head, reporter)?;

    if !req.directory.is_dir() {
        reporter.info(&format!(
            "build output {} not found; running build",
            req.directory.display()
        ));
        publisher.build().context("build failed")?;
        if !req.directory.is_dir() {
            return Err(PublishError::MissingBuildOutput(req.directory.clone()).into());
        }
    }

    reporter.info(&format!(
        "publishing {} to {} ({environment})",
        req.directory.display(),
        req.project
    ));
    let url = publisher.publish(&req.directory, &req.project, environment)?;
    reporter.info(&format!("published {url}"));

    if req.variables.is_empty() && req.secrets.is_empty() {
        reporter.debug("no variables or secrets to patch");
    } else {
        reporter.info(&format!(
            "patching {} variable(s) and {} secret(s)",
            req.variables.len(),
            req.secrets.len()
        ));
        pages.patch_environment_variables(
            &req.project,
            environment,
            &req.head,
            &req.variables,
            &req.secrets,
        )?;
    }

    github.ensure_environment(repository, environment)?;
    let deployment_id = github.get_or_create_deployment(repository, environment)?;
    let status_id = github.create_deployment_status(repository, deployment_id, &url)?;
    reporter.info(&format!(
        "deployment {deployment_id} marked successful (status {status_id})"
    ));

    let max = req.retention.max_deployments;
    let github_prune = github.prune_deployments(repository, environment, max, reporter)?;
    let pages_prune = pages.prune_page_deployments(&req.project, environment, max, reporter)?;

    Ok(DeployReceipt {
        url,
        deployment_id,
        status_id,
        project_created,
        github_prune,
        pages_prune,
    })
}

/// Routine retention for `environment`; preview environments are then
/// wiped from both registries and their environment resource deleted.
pub fn run_clean(
    github: &GithubRegistry,
    pages: &PagesRegistry,
    req: &CleanRequest,
    reporter: &mut dyn Reporter,
) -> Result<CleanReceipt> {
    let repository = req.repository.as_str();
    let environment = req.environment.as_str();
    let max = req.retention.max_deployments;

    let github_prune = github.prune_deployments(repository, environment, max, reporter)?;
    let pages_prune = pages.prune_page_deployments(&req.project, environment, max, reporter)?;

    let teardown = if is_production(environment, &req.head) {
        reporter.debug(&format!("{environment} is production; skipping teardown"));
        None
    } else {
        reporter.info(&format!("tearing down {environment}"));
        let wipe = RetentionPolicy::wipe().max_deployments;
        let github_prune = github.prune_deployments(repository, environment, wipe, reporter)?;
        let pages_prune = pages.prune_page_deployments(&req.project, environment, wipe, reporter)?;
        github.delete_environment(repository, environment)?;
        reporter.info(&format!("deleted environment {environment}"));
        Some(Teardown {
            github_prune,
            pages_prune,
            environment_deleted: true,
        })
    };

    Ok(CleanReceipt {
        github_prune,
        pages_prune,
        teardown,
    })
}

/// Delete a whole Pages project.
pub fn run_destroy(
    publisher: &dyn Publisher,
    project: &str,
    reporter: &mut dyn Reporter,
) -> Result<()> {
    reporter.warn(&format!("deleting Pages project {project}"));
    publisher.delete_project(project)?;
    reporter.info(&format!("deleted Pages project {project}"));
    Ok(())
}

/// Returns true when the project had to be created.
fn ensure_project(
    pages: &PagesRegistry,
    publisher: &dyn Publisher,
    project: &str,
    head: &str,
    reporter: &mut dyn Reporter,
) -> Result<bool> {
    if let Some(found) = pages.find_project(project)? {
        reporter.debug(&format!(
            "found Pages project {} ({})",
            found.name,
            found.subdomain.as_deref().unwrap_or("no subdomain")
        ));
        return Ok(false);
    }

    reporter.info(&format!(
        "creating Pages project {project} with production branch {head}"
    ));
    publisher.create_project(project, head)?;
    Ok(true)
}
