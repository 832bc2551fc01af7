use std::env;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Get the current branch name. `None` on a detached HEAD.
pub fn current_branch(repo_root: &Path) -> Result<Option<String>> {
    let out = Command::new(git_program())
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(repo_root)
        .output()
        .context("failed to execute git rev-parse; is git installed?")?;

    if !out.status.success() {
        bail!(
            "git rev-parse failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }

    let branch = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if branch.is_empty() || branch == "HEAD" {
        Ok(None)
    } else {
        Ok(Some(branch))
    }
}

/// Get the URL of a remote. `None` if the remote is not configured.
pub fn remote_url(repo_root: &Path, remote: &str) -> Result<Option<String>> {
    let out = Command::new(git_program())
        .args(["remote", "get-url", remote])
        .current_dir(repo_root)
        .output()
        .context("failed to run git remote")?;

    if !out.status.success() {
        return Ok(None);
    }

    let url = String::from_utf8_lossy(&out.stdout).trim().to_string();
    Ok((!url.is_empty()).then_some(url))
}

/// Extract `owner/repo` from a remote URL.
///
/// Handles `https://host/owner/repo(.git)`, `ssh://git@host/owner/repo`
/// and scp-style `git@host:owner/repo.git`.
pub fn parse_repository(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    let path = if let Some((_, rest)) = url.split_once("://") {
        rest.split_once('/')?.1
    } else if let Some((_, rest)) = url.split_once(':') {
        rest
    } else {
        return None;
    };

    let path = path.trim_end_matches(".git");
    let mut parts = path.rsplit('/');
    let repo = parts.next().filter(|s| !s.is_empty())?;
    let owner = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("{owner}/{repo}"))
}

fn git_program() -> String {
    env::var("PAGEKEEPER_GIT_BIN").unwrap_or_else(|_| "git".to_string())
}
