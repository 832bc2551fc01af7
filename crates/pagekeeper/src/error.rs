//! Typed failures surfaced by the orchestrations.
//!
//! Transport-level HTTP failures live in [`crate::api::ApiError`]. The types
//! here classify what the CLI reports: configuration problems exit with
//! status 1 before any orchestration starts, everything else is an
//! unrecovered orchestration failure.

use std::path::PathBuf;

use thiserror::Error;

/// Pre-flight configuration problems. Nothing has been published when one
/// of these is raised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {var} is not set")]
    MissingCredential { var: String },

    #[error("{kind} {name} is not set in the environment")]
    MissingValue { kind: ValueKind, name: String },

    #[error("branch {branch} not found in {repository}")]
    BranchNotFound { repository: String, branch: String },

    #[error("invalid repository {0:?}; expected owner/repo")]
    InvalidRepository(String),

    #[error("unable to determine {0}; pass it explicitly")]
    Undetermined(&'static str),

    #[error("invalid config file {}: {message}", .path.display())]
    File { path: PathBuf, message: String },

    #[error("refusing to delete {0} without --yes")]
    ConfirmationRequired(String),
}

/// Whether a named value is injected as plain text or as a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Secret,
    Variable,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Secret => f.write_str("secret"),
            ValueKind::Variable => f.write_str("variable"),
        }
    }
}

/// The source host answered a create call with no content.
///
/// This usually means the ref does not exist on the remote.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CreationError {
    #[error("failed to create deployment for {environment} in {repository}")]
    Deployment {
        repository: String,
        environment: String,
    },

    #[error("failed to create status for deployment {deployment_id} in {repository}")]
    Status {
        repository: String,
        deployment_id: u64,
    },
}

/// Failures of the external publish tooling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("{program} exited with {exit_code:?}: {stderr}")]
    CommandFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("publish output did not contain a deployment URL")]
    MissingUrl { output: String },

    #[error("build output directory {} does not exist after building", .0.display())]
    MissingBuildOutput(PathBuf),

    #[error("build command is empty")]
    EmptyBuildCommand,
}

/// True when any error in the chain is a [`ConfigError`].
pub fn is_config_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<ConfigError>())
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::MissingValue {
            kind: ValueKind::Secret,
            name: "API_KEY".to_string(),
        };
        assert_eq!(err.to_string(), "secret API_KEY is not set in the environment");

        let err = ConfigError::MissingCredential {
            var: "CLOUDFLARE_API_TOKEN".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "required environment variable CLOUDFLARE_API_TOKEN is not set"
        );
    }

    #[test]
    fn config_errors_are_found_through_context() {
        let err = anyhow::Error::new(ConfigError::BranchNotFound {
            repository: "acme/site".to_string(),
            branch: "feature-x".to_string(),
        })
        .context("preflight failed");
        assert!(is_config_error(&err));

        let other: anyhow::Result<()> = Err(CreationError::Deployment {
            repository: "acme/site".to_string(),
            environment: "feature-x".to_string(),
        })
        .context("deploy failed");
        assert!(!is_config_error(&other.unwrap_err()));
    }
}
