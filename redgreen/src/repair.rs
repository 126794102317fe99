//! Bounded run-and-fix loop for generated code.
//!
//! A generated artifact is executed in the sandbox; if it fails, the model is
//! shown the failing code and its error and asked for a corrected version.
//! The loop has two states, attempting and done, and always finishes with
//! some code: exhausting the budget is logged, not raised.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::extract::extract_code;
use crate::core::types::ExecutionResult;
use crate::io::llm::Llm;
use crate::io::prompt::{PromptContext, PromptEngine};
use crate::io::sandbox::Sandbox;
use crate::session::LlmSession;

/// Parameters for one run-and-fix loop.
#[derive(Debug, Clone, Copy)]
pub struct RepairRequest<'a> {
    /// Step name, used to prefix fix transcripts (`<step>-fix-<n>`).
    pub step: &'a str,
    pub context: PromptContext<'a>,
    /// Language tag for the fenced failing code in the fix prompt.
    pub language: &'a str,
    /// Maximum number of model calls for fixes.
    pub max_attempts: u32,
    /// Sandbox working directory, where earlier artifacts can be imported.
    pub workdir: &'a Path,
}

/// Final state of a run-and-fix loop.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    /// The last code produced, whether or not it runs.
    pub code: String,
    /// Number of fix prompts sent.
    pub fix_attempts: u32,
    /// Whether `code` ran cleanly in the sandbox.
    pub verified: bool,
    pub last_run: ExecutionResult,
}

/// Execute `code`, asking the model for fixes until it runs or the budget
/// is spent.
///
/// Makes at most `request.max_attempts` model calls. Only sandbox
/// environment failures and model transport errors are returned as errors.
#[instrument(skip_all, fields(step = request.step, max_attempts = request.max_attempts))]
pub fn run_and_fix<L, S>(
    session: &mut LlmSession<'_, L>,
    sandbox: &S,
    prompts: &PromptEngine,
    request: &RepairRequest<'_>,
    code: String,
) -> Result<RepairOutcome>
where
    L: Llm + ?Sized,
    S: Sandbox + ?Sized,
{
    let mut code = code;
    let mut attempts = 0u32;
    loop {
        let run = sandbox.execute(&code, request.workdir)?;
        let Some(error) = run.failure_reason() else {
            debug!(attempts, "code ran cleanly");
            return Ok(RepairOutcome {
                code,
                fix_attempts: attempts,
                verified: true,
                last_run: run,
            });
        };

        if attempts >= request.max_attempts {
            warn!(attempts, state = ?run.state, "fix budget exhausted, keeping last code");
            return Ok(RepairOutcome {
                code,
                fix_attempts: attempts,
                verified: false,
                last_run: run,
            });
        }

        info!(attempt = attempts, state = ?run.state, "code failed, requesting fix");
        let prompt = prompts.render_fix(&request.context, &code, &error, request.language)?;
        let prefix = format!("{}-fix-{attempts}", request.step);
        let completion = session.call(&prefix, &prompt)?;
        code = extract_code(&completion);
        attempts += 1;
    }
}
