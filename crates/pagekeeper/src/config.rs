//! Configuration for pagekeeper.
//!
//! Settings come from three places, highest precedence first:
//! 1. command-line flags ([`CliOverrides`]),
//! 2. the optional `.pagekeeper.toml` in the working directory,
//! 3. built-in defaults.
//!
//! Everything is folded into one immutable [`Settings`] value at startup.
//! Components never read the process environment themselves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::api::{CLOUDFLARE_API, GITHUB_API};
use crate::error::{ConfigError, ValueKind};
use crate::retention::{DEFAULT_MAX_DEPLOYMENTS, RetentionPolicy};

/// Project configuration file name.
pub const CONFIG_FILE: &str = ".pagekeeper.toml";

/// Environment variable overriding the wrangler program.
pub const WRANGLER_BIN_VAR: &str = "PAGEKEEPER_WRANGLER_BIN";

pub const DEFAULT_DIRECTORY: &str = "dist";

pub const DEFAULT_WRANGLER: &str = "wrangler";

pub fn default_build_command() -> Vec<String> {
    vec!["npm".to_string(), "run".to_string(), "build".to_string()]
}

/// Nested deploy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploySection {
    /// Build output directory to upload
    pub directory: Option<PathBuf>,
    /// Deployments kept per environment
    pub max_deployments: Option<usize>,
    /// Program and arguments that produce the build output
    pub build_command: Option<Vec<String>>,
}

/// Nested API configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSection {
    pub github_base: Option<String>,
    pub pages_base: Option<String>,
}

/// Nested publisher configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublisherSection {
    /// wrangler program (path or name on PATH)
    pub wrangler: Option<String>,
}

/// Contents of `.pagekeeper.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub deploy: DeploySection,
    pub api: ApiSection,
    pub publisher: PublisherSection,
}

impl FileConfig {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load `.pagekeeper.toml` from `dir`, or defaults if there is none.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::File {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::parse(&content, &path)
    }
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub directory: Option<PathBuf>,
    pub max_deployments: Option<usize>,
    pub github_api: Option<String>,
    pub pages_api: Option<String>,
    pub wrangler: Option<String>,
    pub insecure: bool,
}

/// Resolved, immutable settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub working_dir: PathBuf,
    pub directory: PathBuf,
    pub retention: RetentionPolicy,
    pub build_command: Vec<String>,
    pub github_base: String,
    pub pages_base: String,
    pub wrangler: String,
    /// Skip TLS certificate verification.
    pub insecure: bool,
}

impl Settings {
    /// Fold flags, file and defaults together.
    ///
    /// `wrangler_env` is the value of [`WRANGLER_BIN_VAR`], read by the caller.
    pub fn resolve(
        working_dir: &Path,
        file: FileConfig,
        cli: CliOverrides,
        wrangler_env: Option<String>,
    ) -> Self {
        let directory = cli
            .directory
            .or(file.deploy.directory)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DIRECTORY));
        let directory = if directory.is_absolute() {
            directory
        } else {
            working_dir.join(directory)
        };

        Self {
            working_dir: working_dir.to_path_buf(),
            directory,
            retention: RetentionPolicy::keep(
                cli.max_deployments
                    .or(file.deploy.max_deployments)
                    .unwrap_or(DEFAULT_MAX_DEPLOYMENTS),
            ),
            build_command: file
                .deploy
                .build_command
                .filter(|c| !c.is_empty())
                .unwrap_or_else(default_build_command),
            github_base: cli
                .github_api
                .or(file.api.github_base)
                .unwrap_or_else(|| GITHUB_API.to_string()),
            pages_base: cli
                .pages_api
                .or(file.api.pages_base)
                .unwrap_or_else(|| CLOUDFLARE_API.to_string()),
            wrangler: cli
                .wrangler
                .or(wrangler_env)
                .or(file.publisher.wrangler)
                .unwrap_or_else(|| DEFAULT_WRANGLER.to_string()),
            insecure: cli.insecure,
        }
    }
}

/// Look up each named value; the first missing one is an error.
pub fn resolve_named_values(
    names: &[String],
    kind: ValueKind,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<BTreeMap<String, String>, ConfigError> {
    names
        .iter()
        .map(|name| {
            lookup(name)
                .map(|value| (name.clone(), value))
                .ok_or_else(|| ConfigError::MissingValue {
                    kind,
                    name: name.clone(),
                })
        })
        .collect()
}

/// Validate an `owner/repo` repository slug.
pub fn validate_repository(repository: &str) -> Result<String, ConfigError> {
    let trimmed = repository.trim();
    match trimmed.split_once('/') {
        Some((owner, repo))
            if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
        {
            Ok(trimmed.to_string())
        }
        _ => Err(ConfigError::InvalidRepository(repository.to_string())),
    }
}
