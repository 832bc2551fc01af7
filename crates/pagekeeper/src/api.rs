//! JSON-over-HTTPS client shared by the GitHub and Cloudflare registries.
//!
//! Every call is normalized into one of three outcomes:
//! - `Ok(Some(value))` for a successful response with a JSON body,
//! - `Ok(None)` for "no content": HTTP 204, an empty success body, or a
//!   404 on `GET`/`DELETE` (the resource is absent),
//! - `Err(ApiError::Request { .. })` for any other non-success status.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Default GitHub REST API endpoint
pub const GITHUB_API: &str = "https://api.github.com";

/// Default Cloudflare API endpoint
pub const CLOUDFLARE_API: &str = "https://api.cloudflare.com/client/v4";

/// Default timeout for API requests
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for API requests
pub const USER_AGENT: &str = concat!("pagekeeper/", env!("CARGO_PKG_VERSION"));

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const JSON_ACCEPT: &str = "application/json";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} {url} failed: {status} {status_text}")]
    Request {
        method: Method,
        url: String,
        status: u16,
        status_text: String,
    },

    #[error("unexpected response shape from {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// HTTP status for request failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// How the client authenticates.
#[derive(Debug, Clone)]
enum Auth {
    /// GitHub's `Authorization: token <t>` scheme.
    Token(String),
    Bearer(String),
}

impl Auth {
    fn header_value(&self) -> String {
        match self {
            Auth::Token(t) => format!("token {t}"),
            Auth::Bearer(t) => format!("Bearer {t}"),
        }
    }
}

/// A REST client bound to one base URL and credential.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    auth: Auth,
    accept: &'static str,
    http: Client,
}

impl ApiClient {
    /// Client for the GitHub REST API.
    pub fn github(base_url: &str, token: &str, insecure: bool) -> Result<Self, ApiError> {
        Self::new(base_url, Auth::Token(token.to_string()), GITHUB_ACCEPT, insecure)
    }

    /// Client for the Cloudflare v4 API.
    pub fn cloudflare(base_url: &str, token: &str, insecure: bool) -> Result<Self, ApiError> {
        Self::new(base_url, Auth::Bearer(token.to_string()), JSON_ACCEPT, insecure)
    }

    fn new(base_url: &str, auth: Auth, accept: &'static str, insecure: bool) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|source| ApiError::Transport {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            base_url,
            auth,
            accept,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a request and normalize the outcome.
    ///
    /// The body is only attached when one is supplied.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("Authorization", self.auth.header_value())
            .header("Accept", self.accept);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if is_empty_result(&method, status) {
            return Ok(None);
        }

        if !status.is_success() {
            return Err(ApiError::Request {
                method,
                url,
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let text = response.text().map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| ApiError::Decode {
                context: format!("{method} {url}"),
                source,
            })
    }

    /// Issue a request and decode a successful body into `T`.
    pub fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<T>, ApiError> {
        let context = format!("{method} {path}");
        self.request(method, path, body)?
            .map(|value| decode(value, &context))
            .transpose()
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        self.send(Method::GET, path, None)
    }
}

fn is_empty_result(method: &Method, status: StatusCode) -> bool {
    status == StatusCode::NO_CONTENT
        || (status == StatusCode::NOT_FOUND && (*method == Method::GET || *method == Method::DELETE))
}

/// Decode a JSON value into a typed response.
pub fn decode<T: DeserializeOwned>(value: Value, context: &str) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|source| ApiError::Decode {
        context: context.to_string(),
        source,
    })
}
