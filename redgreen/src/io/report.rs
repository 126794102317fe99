//! Per-task run reports.
//!
//! The report is a product artifact: it is always written after a pipeline
//! run, next to the task's transcripts, and the eval harness reads it back to
//! compute pass rates.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::phase::Phase;
use crate::core::signatures::FunctionSignature;
use crate::core::task::Task;
use crate::core::types::CheckOutcome;
use crate::core::usage::ApiStats;

/// Outcome of one Stub, Red or Green step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub phase: Phase,
    /// Where the step persisted its artifact.
    pub artifact: PathBuf,
    /// Fix prompts spent in the run-and-fix loop.
    pub fix_attempts: u32,
    /// Whether the final artifact ran cleanly in the sandbox.
    pub verified: bool,
    /// External command run on the persisted artifact.
    pub check: CheckOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub task: Task,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Green's test run; the task's overall result.
    pub passed: bool,
    /// Phases visited, in order.
    pub phases: Vec<Phase>,
    pub signatures: Vec<FunctionSignature>,
    pub steps: Vec<StepReport>,
    pub usage: ApiStats,
}

impl TaskReport {
    pub fn step(&self, phase: Phase) -> Option<&StepReport> {
        self.steps.iter().find(|step| step.phase == phase)
    }
}

/// Serialize `report` as pretty JSON with a trailing newline.
pub fn write_report(path: &Path, report: &TaskReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(report).context("serialize task report")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

pub fn read_report(path: &Path) -> Result<TaskReport> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse report {}", path.display()))
}
