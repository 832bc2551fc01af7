use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retention::RetentionPolicy;

/// A GitHub deployment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: u64,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub environment: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub statuses_url: Option<String>,
}

/// A Cloudflare Pages deployment, flattened from the API shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDeployment {
    pub id: String,
    pub created_on: DateTime<Utc>,
    /// Branch from `deployment_trigger.metadata.branch`, when present.
    pub branch: Option<String>,
}

/// Which half of a Pages project's `deployment_configs` an environment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSection {
    Production,
    Preview,
}

impl ConfigSection {
    /// The head branch is production; every other environment is a preview.
    pub fn for_environment(environment: &str, head: &str) -> Self {
        if is_production(environment, head) {
            ConfigSection::Production
        } else {
            ConfigSection::Preview
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSection::Production => "production",
            ConfigSection::Preview => "preview",
        }
    }

    pub fn sibling(&self) -> Self {
        match self {
            ConfigSection::Production => ConfigSection::Preview,
            ConfigSection::Preview => ConfigSection::Production,
        }
    }
}

pub fn is_production(environment: &str, head: &str) -> bool {
    environment == head
}

/// One record that could not be removed while pruning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneFailure {
    pub id: String,
    pub message: String,
}

/// Outcome of pruning one environment in one registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub environment: String,
    pub retained: usize,
    pub pruned: Vec<String>,
    pub failed: Vec<PruneFailure>,
}

impl PruneReport {
    pub fn new(environment: &str) -> Self {
        Self {
            environment: environment.to_string(),
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        self.pruned.is_empty() && self.failed.is_empty()
    }
}

/// Everything `deploy` needs, resolved up front.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// `owner/repo` on GitHub.
    pub repository: String,
    /// Cloudflare Pages project name.
    pub project: String,
    pub environment: String,
    /// Branch that maps to production.
    pub head: String,
    pub retention: RetentionPolicy,
    /// Build output directory to upload.
    pub directory: PathBuf,
    /// Plain-text variables, already resolved from the environment.
    pub variables: BTreeMap<String, String>,
    /// Secret values, already resolved from the environment.
    pub secrets: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CleanRequest {
    pub repository: String,
    pub project: String,
    pub environment: String,
    pub head: String,
    pub retention: RetentionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployReceipt {
    pub url: String,
    pub deployment_id: u64,
    pub status_id: u64,
    pub project_created: bool,
    pub github_prune: PruneReport,
    pub pages_prune: PruneReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanReceipt {
    pub github_prune: PruneReport,
    pub pages_prune: PruneReport,
    /// Full wipe results, only for preview environments.
    pub teardown: Option<Teardown>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teardown {
    pub github_prune: PruneReport,
    pub pages_prune: PruneReport,
    pub environment_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_branch_is_production() {
        assert_eq!(
            ConfigSection::for_environment("master", "master"),
            ConfigSection::Production
        );
        assert_eq!(
            ConfigSection::for_environment("feature-x", "master"),
            ConfigSection::Preview
        );
        assert_eq!(ConfigSection::Preview.sibling(), ConfigSection::Production);
    }

    #[test]
    fn deployment_record_parses_github_shape() {
        let json = r#"{
            "id": 42,
            "ref": "feature-x",
            "environment": "feature-x",
            "updated_at": "2024-03-01T10:00:00Z",
            "statuses_url": "https://api.github.com/repos/acme/site/deployments/42/statuses",
            "creator": {"login": "bot"}
        }"#;
        let record: DeploymentRecord = serde_json::from_str(json).expect("parse");
        assert_eq!(record.id, 42);
        assert_eq!(record.git_ref, "feature-x");
        assert!(record.statuses_url.is_some());
    }

    #[test]
    fn prune_report_noop() {
        let mut report = PruneReport::new("feature-x");
        assert!(report.is_noop());
        report.pruned.push("1".to_string());
        assert!(!report.is_noop());
    }
}
