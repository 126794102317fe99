//! Isolated execution of generated code.
//!
//! Code never runs inside this process. Each run writes the snippet into a
//! private temporary directory and executes it with the configured
//! interpreter in a child process whose environment is scrubbed down to
//! `PATH` and `PYTHONPATH`. The working directory doubles as the import
//! root, so snippets can import artifacts already written there. A
//! supervising wait kills the child at its deadline.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::types::{ExecState, ExecutionResult};
use crate::io::config::SandboxConfig;
use crate::io::process::run_command_with_timeout;

/// Runs a code snippet and reports how it ended.
pub trait Sandbox {
    /// Execute `code` with `workdir` as working directory and import root.
    ///
    /// Only environment failures (e.g. the interpreter cannot be spawned) are
    /// errors; code that crashes or hangs is an [`ExecutionResult`].
    fn execute(&self, code: &str, workdir: &Path) -> Result<ExecutionResult>;
}

/// Sandbox backed by an interpreter subprocess.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    interpreter: Vec<String>,
    file_suffix: String,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ProcessSandbox {
    pub fn new(cfg: &SandboxConfig) -> Self {
        Self {
            interpreter: cfg.interpreter.clone(),
            file_suffix: cfg.file_suffix.clone(),
            timeout: cfg.timeout(),
            output_limit_bytes: cfg.output_limit_bytes,
        }
    }
}

impl Sandbox for ProcessSandbox {
    #[instrument(skip_all, fields(timeout_secs = self.timeout.as_secs(), code_bytes = code.len()))]
    fn execute(&self, code: &str, workdir: &Path) -> Result<ExecutionResult> {
        let (program, args) = self
            .interpreter
            .split_first()
            .ok_or_else(|| anyhow!("sandbox interpreter is empty"))?;

        fs::create_dir_all(workdir)
            .with_context(|| format!("create sandbox workdir {}", workdir.display()))?;
        let workdir = fs::canonicalize(workdir)
            .with_context(|| format!("resolve sandbox workdir {}", workdir.display()))?;

        let scratch = tempfile::Builder::new()
            .prefix("redgreen-sandbox-")
            .tempdir()
            .context("create sandbox scratch dir")?;
        let script = scratch.path().join(format!("snippet{}", self.file_suffix));
        fs::write(&script, code).with_context(|| format!("write {}", script.display()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(&script)
            .current_dir(&workdir)
            .env_clear()
            .env("PYTHONPATH", &workdir)
            .env("PYTHONDONTWRITEBYTECODE", "1");
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }

        debug!(state = ?ExecState::Running, program = %program, "sandbox run started");
        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run sandbox interpreter {program}"))?;

        let state = if output.timed_out {
            ExecState::TimedOut
        } else if output.status.success() {
            ExecState::Completed
        } else {
            ExecState::Failed
        };
        debug_assert!(state.is_terminal());
        match state {
            ExecState::Completed => debug!(?state, "sandbox run finished"),
            _ => warn!(?state, exit_code = ?output.status.code(), "sandbox run did not complete"),
        }

        Ok(ExecutionResult {
            state,
            output: output.combined_text(),
            timeout: self.timeout,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell_sandbox(timeout_secs: u64) -> ProcessSandbox {
        let cfg = SandboxConfig {
            interpreter: vec!["sh".to_string()],
            file_suffix: ".sh".to_string(),
            timeout_secs,
            ..SandboxConfig::default()
        };
        ProcessSandbox::new(&cfg)
    }

    #[test]
    fn successful_snippet_completes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = shell_sandbox(5)
            .execute("echo hello", temp.path())
            .expect("execute");

        assert_eq!(result.state, ExecState::Completed);
        assert_eq!(result.output, "hello\n");
        assert_eq!(result.failure_reason(), None);
    }

    #[test]
    fn failing_snippet_reports_stderr() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = shell_sandbox(5)
            .execute("echo 'NameError: x' 1>&2\nexit 1", temp.path())
            .expect("execute");

        assert_eq!(result.state, ExecState::Failed);
        assert!(
            result
                .failure_reason()
                .expect("reason")
                .contains("NameError: x")
        );
    }

    /// Verifies a hanging snippet is killed and reported as a timeout.
    #[test]
    fn hanging_snippet_times_out() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = shell_sandbox(1)
            .execute("exec sleep 10", temp.path())
            .expect("execute");

        assert_eq!(result.state, ExecState::TimedOut);
        let reason = result.failure_reason().expect("reason");
        assert!(reason.contains("TimeoutError"), "{reason}");
        assert!(reason.contains("1 seconds"), "{reason}");
    }

    #[test]
    fn spawned_background_process_does_not_outlive_deadline() {
        let temp = tempfile::tempdir().expect("tempdir");
        let started = std::time::Instant::now();
        let result = shell_sandbox(1)
            .execute("sleep 30 &\nsleep 30", temp.path())
            .expect("execute");

        assert_eq!(result.state, ExecState::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(10), "{:?}", started.elapsed());
    }

    #[test]
    fn child_environment_is_scrubbed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = shell_sandbox(5)
            .execute("test -z \"$HOME\" && test -n \"$PYTHONPATH\"", temp.path())
            .expect("execute");

        assert_eq!(result.state, ExecState::Completed, "{}", result.output);
    }

    #[test]
    fn runs_inside_workdir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workdir = temp.path().join("out");
        let result = shell_sandbox(5).execute("pwd", &workdir).expect("execute");

        let expected = fs::canonicalize(&workdir).expect("canonical");
        assert_eq!(result.output.trim_end(), expected.to_string_lossy());
    }

    #[test]
    fn missing_interpreter_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = SandboxConfig {
            interpreter: vec!["no-such-interpreter-xyz".to_string()],
            ..SandboxConfig::default()
        };
        let err = ProcessSandbox::new(&cfg)
            .execute("print(1)", temp.path())
            .expect_err("spawn must fail");

        assert!(format!("{err:#}").contains("no-such-interpreter-xyz"));
    }
}
