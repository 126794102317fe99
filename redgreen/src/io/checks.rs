//! External command checks on persisted artifacts.
//!
//! The Stub step runs the stub file with the interpreter; Red and Green run
//! the test file with the test runner. Both reduce to `<command...> <path>`
//! with a pass/fail result and the command's output.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::types::{CheckOutcome, timeout_message};
use crate::io::config::ChecksConfig;
use crate::io::process::run_command_with_timeout;

#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Program and leading arguments; `target` is appended.
    pub command: Vec<String>,
    pub target: PathBuf,
    pub workdir: PathBuf,
    /// Where to write the full stdout/stderr log.
    pub log_path: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl CheckRequest {
    /// Build a request from the checks config for `command` on `target`.
    pub fn new(
        cfg: &ChecksConfig,
        command: &[String],
        target: &Path,
        workdir: &Path,
        log_path: &Path,
    ) -> Self {
        Self {
            command: command.to_vec(),
            target: target.to_path_buf(),
            workdir: workdir.to_path_buf(),
            log_path: log_path.to_path_buf(),
            timeout: cfg.timeout(),
            output_limit_bytes: cfg.output_limit_bytes,
        }
    }

    pub fn display_command(&self) -> String {
        let mut parts = self.command.clone();
        parts.push(self.target.display().to_string());
        parts.join(" ")
    }
}

/// Abstraction over running an external check.
pub trait CheckRunner {
    /// Run the check. A command that cannot be started is an error; a
    /// command that runs and fails is a failed [`CheckOutcome`].
    fn run(&self, request: &CheckRequest) -> Result<CheckOutcome>;
}

/// Runs checks as child processes.
pub struct CommandCheckRunner;

impl CheckRunner for CommandCheckRunner {
    #[instrument(skip_all, fields(command = %request.display_command()))]
    fn run(&self, request: &CheckRequest) -> Result<CheckOutcome> {
        let (program, args) = request
            .command
            .split_first()
            .ok_or_else(|| anyhow!("check command is empty"))?;

        let workdir = fs::canonicalize(&request.workdir)
            .with_context(|| format!("resolve check workdir {}", request.workdir.display()))?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(&request.target)
            .current_dir(&workdir)
            .env("PYTHONPATH", &workdir);

        let output = run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes)
            .with_context(|| format!("run `{}`", request.display_command()))?;
        let text = output.combined_text();
        write_check_log(
            &request.log_path,
            &output.stdout,
            &output.stderr,
            request.output_limit_bytes,
        )?;

        let passed = output.success();
        let summary = if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "check timed out");
            let message = timeout_message(request.timeout);
            match text.trim() {
                "" => message,
                rest => format!("{message}\n{rest}"),
            }
        } else if text.trim().is_empty() && !passed {
            format!(
                "`{}` failed with exit code {:?}",
                request.display_command(),
                output.status.code()
            )
        } else {
            text.trim().to_string()
        };

        debug!(passed, exit_code = ?output.status.code(), "check finished");
        Ok(CheckOutcome {
            passed,
            output: summary,
        })
    }
}

fn write_check_log(path: &Path, stdout: &[u8], stderr: &[u8], output_limit: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create check log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(stdout));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(stderr));

    if buf.len() > output_limit {
        let mut cut = output_limit;
        while !buf.is_char_boundary(cut) {
            cut -= 1;
        }
        let truncated = format!("{}\n[truncated {} bytes]\n", &buf[..cut], buf.len() - cut);
        fs::write(path, truncated)
            .with_context(|| format!("write check log {}", path.display()))?;
        return Ok(());
    }

    fs::write(path, buf).with_context(|| format!("write check log {}", path.display()))?;
    Ok(())
}
