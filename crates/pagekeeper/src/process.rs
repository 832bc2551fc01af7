//! Running external tools (wrangler, the site build, git).

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PublishError;

/// Result of a command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub program: String,
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandResult {
    /// Turn a non-zero exit into a [`PublishError::CommandFailed`].
    pub fn ok(self) -> Result<Self, PublishError> {
        if self.success {
            Ok(self)
        } else {
            Err(PublishError::CommandFailed {
                program: self.program,
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    pub fn from_output(program: &str, output: &Output, duration: Duration) -> Self {
        Self {
            program: program.to_string(),
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: millis(duration),
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Run a command, capturing its output.
pub fn run_command(
    program: &str,
    args: &[&str],
    dir: Option<&Path>,
    env: &[(String, String)],
) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }

    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {} {:?}", program, args))?;

    Ok(CommandResult::from_output(program, &output, start.elapsed()))
}

/// Run a command with its output going straight to the terminal.
pub fn run_command_streaming(program: &str, args: &[&str], dir: Option<&Path>) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args).stdout(Stdio::inherit()).stderr(Stdio::inherit());
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {} {:?}", program, args))?;

    Ok(CommandResult::from_output(program, &output, start.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(success: bool) -> CommandResult {
        CommandResult {
            program: "wrangler".to_string(),
            success,
            exit_code: Some(if success { 0 } else { 1 }),
            stdout: "output".to_string(),
            stderr: "  boom\n".to_string(),
            duration_ms: 100,
        }
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn command_result_ok() {
        assert!(result(true).ok().is_ok());
    }

    #[test]
    fn command_result_err_carries_stderr() {
        let err = result(false).ok().expect_err("failure");
        assert_eq!(
            err,
            PublishError::CommandFailed {
                program: "wrangler".to_string(),
                exit_code: Some(1),
                stderr: "boom".to_string(),
            }
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn run_command_captures_output_and_env() {
        let res = run_command(
            "sh",
            &["-c", "echo \"$GREETING\"; echo err >&2; exit 3"],
            None,
            &[("GREETING".to_string(), "hello".to_string())],
        )
        .expect("run");
        assert!(!res.success);
        assert_eq!(res.exit_code, Some(3));
        assert_eq!(res.stdout.trim(), "hello");
        assert_eq!(res.stderr.trim(), "err");
    }

    #[cfg(not(windows))]
    #[test]
    fn run_command_uses_working_directory() {
        let td = tempfile::tempdir().expect("tempdir");
        let res = run_command("pwd", &[], Some(td.path()), &[]).expect("run");
        let reported = std::path::PathBuf::from(res.stdout.trim());
        assert_eq!(
            reported.canonicalize().expect("canon"),
            td.path().canonicalize().expect("canon")
        );
    }

    #[test]
    fn missing_program_is_an_error() {
        assert!(run_command("this-command-does-not-exist-xyz123", &[], None, &[]).is_err());
    }
}
