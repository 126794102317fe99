//! Stub → Red → Green sequencing for one task.
//!
//! Each step consumes the previous step's artifact, so the order is fixed;
//! [`PhaseMachine`] still checks every transition. Whatever the outcome, a
//! [`TaskReport`] is written to `<log-root>/<task-name>/report.json`.

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, instrument};

use crate::agents::{StepEnv, green_step, red_step, stub_step};
use crate::core::phase::{Artifact, PhaseEvent, PhaseMachine};
use crate::core::task::Task;
use crate::io::artifacts::{ArtifactPaths, TaskLogPaths};
use crate::io::checks::CheckRunner;
use crate::io::config::RedgreenConfig;
use crate::io::llm::Llm;
use crate::io::prompt::PromptEngine;
use crate::io::report::write_report;
use crate::io::sandbox::Sandbox;
use crate::session::LlmSession;

pub use crate::io::report::{StepReport, TaskReport};

/// Run the full TDD cycle for `task` and persist its report.
///
/// Generation defects and failing checks end up in the report; only
/// environment failures (unwritable output, missing interpreter, backend
/// errors) are returned as errors.
#[instrument(skip_all, fields(task = %task.name, agent = %task.agent, model = llm.model_name()))]
pub fn run_task<L, S, C>(
    llm: &L,
    sandbox: &S,
    checks: &C,
    config: &RedgreenConfig,
    task: &Task,
) -> Result<TaskReport>
where
    L: Llm + ?Sized,
    S: Sandbox + ?Sized,
    C: CheckRunner + ?Sized,
{
    task.validate()?;
    config.validate()?;
    let started_at = Utc::now();
    let started = Instant::now();

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("create output dir {}", config.output_dir.display()))?;
    let root = fs::canonicalize(&config.output_dir)
        .with_context(|| format!("resolve output dir {}", config.output_dir.display()))?;
    let paths = ArtifactPaths::new(&root, &task.filename)?;
    let logs = TaskLogPaths::new(&config.log_dir, &task.name);
    let prompts = PromptEngine::new()?;

    let mut env = StepEnv {
        session: LlmSession::new(llm, &logs.dir, config.llm.cost_per_1k),
        sandbox,
        checks,
        prompts: &prompts,
        config,
        paths,
        logs,
    };
    let mut machine = PhaseMachine::default();

    machine.fire(PhaseEvent::Begin)?;
    let stub = stub_step(&mut env, task, "")?;
    record_written(&mut machine, Artifact::Stub, &env.paths.code);
    machine.fire(PhaseEvent::StubWritten)?;

    let red = red_step(&mut env, task, &stub.functions_section)?;
    record_written(&mut machine, Artifact::Tests, &env.paths.test);
    machine.fire(PhaseEvent::TestsWritten)?;

    let green = green_step(
        &mut env,
        task,
        &stub.functions_section,
        &red.test_code,
        red.test_errors(),
    )?;
    record_written(&mut machine, Artifact::Implementation, &env.paths.code);
    machine.fire(PhaseEvent::ImplementationWritten)?;

    let report = TaskReport {
        task: task.clone(),
        model: llm.model_name().to_string(),
        started_at,
        duration_ms: started.elapsed().as_millis() as u64,
        passed: green.passed(),
        phases: machine.history().to_vec(),
        signatures: stub.signatures,
        steps: vec![stub.report, red.report, green.report],
        usage: env.session.stats().clone(),
    };
    write_report(&env.logs.report_path, &report)?;
    info!(
        passed = report.passed,
        calls = report.usage.total_calls(),
        cost = report.usage.total_cost(),
        report = %env.logs.report_path.display(),
        "task finished"
    );
    Ok(report)
}

fn record_written(machine: &mut PhaseMachine, artifact: Artifact, path: &Path) {
    if path.is_file() {
        machine.record(artifact);
    }
}
