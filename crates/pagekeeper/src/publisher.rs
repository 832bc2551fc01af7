//! The publish capability: building the site and pushing it to Pages.
//!
//! The orchestrators only see the [`Publisher`] trait. [`WranglerPublisher`]
//! implements it by shelling out to `wrangler`; tests substitute a double.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::PublishError;
use crate::process;

pub trait Publisher {
    /// Produce the build output directory.
    fn build(&self) -> Result<()>;

    fn create_project(&self, name: &str, production_branch: &str) -> Result<()>;

    /// Upload `build_dir` as a deployment of `branch` and return its URL.
    fn publish(&self, build_dir: &Path, project: &str, branch: &str) -> Result<String>;

    fn delete_project(&self, name: &str) -> Result<()>;
}

/// Shells out to the `wrangler` CLI.
#[derive(Debug, Clone)]
pub struct WranglerPublisher {
    program: String,
    build_command: Vec<String>,
    working_dir: PathBuf,
    env: Vec<(String, String)>,
}

impl WranglerPublisher {
    /// `env` is passed to every wrangler invocation (API token, account id).
    pub fn new(
        program: &str,
        build_command: Vec<String>,
        working_dir: &Path,
        env: Vec<(String, String)>,
    ) -> Self {
        Self {
            program: program.to_string(),
            build_command,
            working_dir: working_dir.to_path_buf(),
            env,
        }
    }

    fn wrangler(&self, args: &[&str]) -> Result<process::CommandResult> {
        let res = process::run_command(&self.program, args, Some(&self.working_dir), &self.env)?;
        Ok(res.ok()?)
    }
}

impl Publisher for WranglerPublisher {
    fn build(&self) -> Result<()> {
        let (program, args) = self
            .build_command
            .split_first()
            .ok_or(PublishError::EmptyBuildCommand)?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        process::run_command_streaming(program, &args, Some(&self.working_dir))?.ok()?;
        Ok(())
    }

    fn create_project(&self, name: &str, production_branch: &str) -> Result<()> {
        self.wrangler(&[
            "pages",
            "project",
            "create",
            name,
            "--production-branch",
            production_branch,
        ])
        .with_context(|| format!("failed to create Pages project {name}"))?;
        Ok(())
    }

    fn publish(&self, build_dir: &Path, project: &str, branch: &str) -> Result<String> {
        let dir = build_dir.to_string_lossy();
        let res = self
            .wrangler(&[
                "pages",
                "deploy",
                &dir,
                "--project-name",
                project,
                "--branch",
                branch,
                "--commit-dirty=true",
            ])
            .with_context(|| format!("failed to publish {} to {project}", build_dir.display()))?;

        let combined = format!("{}\n{}", res.stdout, res.stderr);
        extract_deployment_url(&combined)
            .ok_or(PublishError::MissingUrl { output: combined })
            .map_err(Into::into)
    }

    fn delete_project(&self, name: &str) -> Result<()> {
        self.wrangler(&["pages", "project", "delete", name, "--yes"])
            .with_context(|| format!("failed to delete Pages project {name}"))?;
        Ok(())
    }
}

/// Find the deployment URL in wrangler's output.
///
/// Prefers a `*.pages.dev` URL; otherwise takes the last `https://` token.
pub fn extract_deployment_url(output: &str) -> Option<String> {
    let urls: Vec<&str> = output
        .split_whitespace()
        .filter(|token| token.starts_with("https://"))
        .map(|token| token.trim_end_matches(|c: char| !c.is_ascii_alphanumeric() && c != '/'))
        .collect();

    urls.iter()
        .find(|url| url.trim_end_matches('/').ends_with(".pages.dev"))
        .or_else(|| urls.last())
        .map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn url_is_found_in_wrangler_output() {
        let output = "Uploading... (3/3)\n\u{2728} Success! Uploaded 3 files (1.20 sec)\n\n\u{2728} Deployment complete! Take a peek over at https://abc123.site.pages.dev\n";
        assert_eq!(
            extract_deployment_url(output).as_deref(),
            Some("https://abc123.site.pages.dev")
        );
    }

    #[test]
    fn pages_url_wins_over_other_links() {
        let output = "See https://developers.cloudflare.com/pages for docs.\nDone: https://feature-x.site.pages.dev.\nUpdate at https://github.com/cloudflare/workers-sdk";
        assert_eq!(
            extract_deployment_url(output).as_deref(),
            Some("https://feature-x.site.pages.dev")
        );
    }

    #[test]
    fn last_url_is_the_fallback() {
        let output = "first https://one.example.com then https://two.example.com";
        assert_eq!(
            extract_deployment_url(output).as_deref(),
            Some("https://two.example.com")
        );
        assert_eq!(extract_deployment_url("no links here"), None);
    }

    #[cfg(not(windows))]
    fn fake_wrangler(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("wrangler");
        fs::write(&path, script).expect("write fake wrangler");
        let mut perms = fs::metadata(&path).expect("meta").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    #[cfg(not(windows))]
    #[test]
    fn publish_passes_project_and_branch() {
        let td = tempfile::tempdir().expect("tempdir");
        let log = td.path().join("args.log");
        let program = fake_wrangler(
            td.path(),
            &format!(
                "#!/usr/bin/env sh\necho \"$* token=$CLOUDFLARE_API_TOKEN\" >> {}\necho 'Deployment complete! Take a peek over at https://f00.site.pages.dev'\n",
                log.display()
            ),
        );
        let publisher = WranglerPublisher::new(
            program.to_str().expect("utf8"),
            vec!["true".to_string()],
            td.path(),
            vec![("CLOUDFLARE_API_TOKEN".to_string(), "cf".to_string())],
        );

        let url = publisher
            .publish(Path::new("dist"), "site", "feature-x")
            .expect("publish");
        assert_eq!(url, "https://f00.site.pages.dev");

        let args = fs::read_to_string(log).expect("log");
        assert_eq!(
            args.trim(),
            "pages deploy dist --project-name site --branch feature-x --commit-dirty=true token=cf"
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn publish_without_url_fails() {
        let td = tempfile::tempdir().expect("tempdir");
        let program = fake_wrangler(td.path(), "#!/usr/bin/env sh\necho 'uploaded'\n");
        let publisher =
            WranglerPublisher::new(program.to_str().expect("utf8"), vec![], td.path(), vec![]);

        let err = publisher
            .publish(Path::new("dist"), "site", "main")
            .expect_err("no url");
        assert!(matches!(
            err.downcast_ref::<PublishError>(),
            Some(PublishError::MissingUrl { .. })
        ));
    }

    #[cfg(not(windows))]
    #[test]
    fn failing_wrangler_reports_stderr() {
        let td = tempfile::tempdir().expect("tempdir");
        let program = fake_wrangler(
            td.path(),
            "#!/usr/bin/env sh\necho 'project already exists' >&2\nexit 1\n",
        );
        let publisher =
            WranglerPublisher::new(program.to_str().expect("utf8"), vec![], td.path(), vec![]);

        let err = publisher.create_project("site", "main").expect_err("fails");
        assert!(format!("{err:#}").contains("project already exists"));
    }

    #[test]
    fn empty_build_command_is_rejected() {
        let td = tempfile::tempdir().expect("tempdir");
        let publisher = WranglerPublisher::new("wrangler", vec![], td.path(), vec![]);
        let err = publisher.build().expect_err("empty");
        assert_eq!(
            err.downcast_ref::<PublishError>(),
            Some(&PublishError::EmptyBuildCommand)
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn build_runs_in_working_directory() {
        let td = tempfile::tempdir().expect("tempdir");
        let publisher = WranglerPublisher::new(
            "wrangler",
            vec!["mkdir".to_string(), "dist".to_string()],
            td.path(),
            vec![],
        );
        publisher.build().expect("build");
        assert!(td.path().join("dist").is_dir());
    }
}
