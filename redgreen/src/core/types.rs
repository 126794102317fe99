//! Shared result types for sandbox runs and external checks.
//!
//! These types carry outcomes between the I/O layer and orchestration. They
//! hold no handles and serialize deterministically into run reports.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle of a sandboxed execution.
///
/// `Running` is only observable while the worker is alive; a returned
/// [`ExecutionResult`] always carries one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecState {
    Running,
    Completed,
    TimedOut,
    Failed,
}

impl ExecState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecState::Running)
    }
}

/// Outcome of running a code artifact in the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub state: ExecState,
    /// Captured stdout and stderr, with stderr (the traceback) last.
    pub output: String,
    /// Wall-clock limit the run was held to.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.state == ExecState::Completed
    }

    /// Text describing why the run failed, or `None` if it completed.
    pub fn failure_reason(&self) -> Option<String> {
        match self.state {
            ExecState::Completed | ExecState::Running => None,
            ExecState::TimedOut => Some(timeout_message(self.timeout)),
            ExecState::Failed => Some(self.output.clone()),
        }
    }
}

/// Message used whenever a run is cut off by its deadline.
pub fn timeout_message(timeout: Duration) -> String {
    format!(
        "TimeoutError: Execution took longer than {} seconds",
        timeout.as_secs()
    )
}

/// Result of running an external command (interpreter or test runner) on a
/// persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub passed: bool,
    /// Trimmed command output, or a short failure note when it printed nothing.
    pub output: String,
}

impl CheckOutcome {
    pub fn failed(&self) -> bool {
        !self.passed
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
