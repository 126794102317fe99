//! Stub step: function signatures with placeholder bodies.

use anyhow::Result;
use tracing::{info, instrument, warn};

use super::StepEnv;
use crate::core::phase::Phase;
use crate::core::signatures::{FunctionSignature, extract_signatures};
use crate::core::task::Task;
use crate::io::artifacts::save_artifact;
use crate::io::checks::CheckRunner;
use crate::io::llm::Llm;
use crate::io::prompt::PromptContext;
use crate::io::report::StepReport;
use crate::io::sandbox::Sandbox;

#[derive(Debug, Clone)]
pub struct StubOutput {
    pub code: String,
    pub signatures: Vec<FunctionSignature>,
    /// Rendered listing of `signatures` for the Red and Green prompts.
    pub functions_section: String,
    pub report: StepReport,
}

/// Generate the stub file and collect its signatures.
///
/// A stub that fails to run is logged and kept; the pipeline continues.
#[instrument(skip_all, fields(task = %task.name))]
pub fn stub_step<L, S, C>(
    env: &mut StepEnv<'_, L, S, C>,
    task: &Task,
    functions_section: &str,
) -> Result<StubOutput>
where
    L: Llm + ?Sized,
    S: Sandbox + ?Sized,
    C: CheckRunner + ?Sized,
{
    let filename = env.display_filename();
    let context = PromptContext {
        functions_section,
        filename: &filename,
        prompt: &task.prompt,
        examples: "",
    };
    let prompt = env.prompts.render_stub(&context)?;
    let outcome = env.generate("stub", &prompt, context)?;

    save_artifact(&env.paths.code, &outcome.code)?;
    let check = env.check("stub", &env.config.checks.run_command, &env.paths.code)?;
    if check.passed {
        info!(path = %env.paths.code.display(), "stub written");
    } else {
        warn!(output = %check.output, "stub does not run cleanly, continuing");
    }

    let signatures = extract_signatures(&outcome.code);
    let functions_section =
        env.prompts
            .render_functions_section(&filename, &signatures, &env.config.language)?;

    Ok(StubOutput {
        report: StepReport {
            phase: Phase::Stub,
            artifact: env.paths.code.clone(),
            fix_attempts: outcome.fix_attempts,
            verified: outcome.verified,
            check,
        },
        code: outcome.code,
        signatures,
        functions_section,
    })
}
