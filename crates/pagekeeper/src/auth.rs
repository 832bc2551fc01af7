use std::env;
use std::fmt;

use crate::error::ConfigError;

/// GitHub token variables, in resolution order.
pub const GITHUB_TOKEN_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

pub const CLOUDFLARE_TOKEN_VAR: &str = "CLOUDFLARE_API_TOKEN";

pub const CLOUDFLARE_ACCOUNT_VAR: &str = "CLOUDFLARE_ACCOUNT_ID";

/// Cloudflare API token plus the account that owns the Pages projects.
#[derive(Clone)]
pub struct CloudflareCredentials {
    pub api_token: String,
    pub account_id: String,
}

impl fmt::Debug for CloudflareCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareCredentials")
            .field("api_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

impl CloudflareCredentials {
    /// Variables handed to wrangler so it authenticates the same way.
    pub fn wrangler_env(&self) -> Vec<(String, String)> {
        vec![
            (CLOUDFLARE_TOKEN_VAR.to_string(), self.api_token.clone()),
            (CLOUDFLARE_ACCOUNT_VAR.to_string(), self.account_id.clone()),
        ]
    }
}

/// Resolve the GitHub token: `GITHUB_TOKEN`, then `GH_TOKEN`.
pub fn resolve_github_token() -> Result<String, ConfigError> {
    resolve_github_token_with(|key| env::var(key).ok())
}

pub fn resolve_github_token_with(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    GITHUB_TOKEN_VARS
        .iter()
        .find_map(|var| non_empty(lookup(var)))
        .ok_or_else(|| ConfigError::MissingCredential {
            var: GITHUB_TOKEN_VARS[0].to_string(),
        })
}

pub fn resolve_cloudflare() -> Result<CloudflareCredentials, ConfigError> {
    resolve_cloudflare_with(|key| env::var(key).ok())
}

pub fn resolve_cloudflare_with(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<CloudflareCredentials, ConfigError> {
    let required = |var: &str| {
        non_empty(lookup(var)).ok_or_else(|| ConfigError::MissingCredential {
            var: var.to_string(),
        })
    };

    Ok(CloudflareCredentials {
        api_token: required(CLOUDFLARE_TOKEN_VAR)?,
        account_id: required(CLOUDFLARE_ACCOUNT_VAR)?,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
