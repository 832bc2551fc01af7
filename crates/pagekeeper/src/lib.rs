//! # pagekeeper
//!
//! Publish a static site to Cloudflare Pages and keep GitHub's deployment
//! records in step with it.
//!
//! A deploy builds the site (when the output directory is missing), uploads
//! it with `wrangler`, patches the Pages environment variables, records a
//! GitHub deployment with a success status, then prunes old deployments in
//! both registries down to a retention threshold. A clean prunes an
//! environment and, for preview environments, removes it entirely.
//!
//! ## Pipeline
//!
//! 1. [`config::Settings`] folds flags, `.pagekeeper.toml` and defaults.
//! 2. [`auth`] resolves the GitHub and Cloudflare credentials.
//! 3. [`engine::run_deploy`], [`engine::run_clean`] or
//!    [`engine::run_destroy`] does the work, reporting through
//!    [`engine::Reporter`].
//!
//! ## Retention
//!
//! Both registries list records newest first and hand them to
//! [`retention::split_retained`]: the newest `max_deployments` stay, the
//! rest are removed one at a time. A threshold of zero removes everything.
//!
//! ## Modules
//!
//! - [`api`]: Authenticated JSON client for both hosts
//! - [`github`]: GitHub deployments, statuses and environments
//! - [`pages`]: Pages projects, deployments and environment variables
//! - [`engine`]: Deploy, clean and destroy orchestration
//! - [`publisher`]: `Publisher` capability and the wrangler adapter
//! - [`config`]: Configuration file loading and merging
//! - [`types`]: Requests, records and receipts
//! - [`error`]: Typed errors and exit classification

/// Authenticated JSON client for the GitHub and Cloudflare APIs.
pub mod api;

/// Credential resolution: `GITHUB_TOKEN` → `GH_TOKEN`, plus the Cloudflare
/// token and account id.
pub mod auth;

/// Configuration file (`.pagekeeper.toml`) loading and merging.
pub mod config;

/// Deploy, clean and destroy orchestration.
pub mod engine;

pub mod error;

/// Git metadata used for defaults (current branch, origin repository).
pub mod git;

/// GitHub deployments, deployment statuses and environments.
pub mod github;

/// Pages projects, deployments and environment variables.
pub mod pages;

/// Running external tools.
pub mod process;

pub mod publisher;

/// Domain types: records, requests, receipts.
pub mod types;

/// Retention selection.
/// Re-exported from pagekeeper-retention microcrate.
pub use pagekeeper_retention as retention;

#[cfg(test)]
mod test_support;
