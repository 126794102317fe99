//! Green step: the implementation that makes the test pass.

use anyhow::Result;
use tracing::{info, instrument, warn};

use super::StepEnv;
use crate::core::phase::Phase;
use crate::core::task::Task;
use crate::io::artifacts::save_artifact;
use crate::io::checks::CheckRunner;
use crate::io::llm::Llm;
use crate::io::prompt::PromptContext;
use crate::io::report::StepReport;
use crate::io::sandbox::Sandbox;

#[derive(Debug, Clone)]
pub struct GreenOutput {
    pub code: String,
    pub report: StepReport,
}

impl GreenOutput {
    pub fn passed(&self) -> bool {
        self.report.check.passed
    }
}

/// Generate the implementation over the stub file and re-run the tests.
#[instrument(skip_all, fields(task = %task.name))]
pub fn green_step<L, S, C>(
    env: &mut StepEnv<'_, L, S, C>,
    task: &Task,
    functions_section: &str,
    tests: &str,
    test_errors: &str,
) -> Result<GreenOutput>
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
    let prompt = env.prompts.render_green(&context, tests, test_errors)?;
    let outcome = env.generate("green", &prompt, context)?;

    save_artifact(&env.paths.code, &outcome.code)?;
    let check = env.check("green", &env.config.checks.test_command, &env.paths.test)?;
    if check.passed {
        info!(path = %env.paths.code.display(), "tests pass");
    } else {
        warn!(output = %check.output, "tests still fail");
    }

    Ok(GreenOutput {
        code: outcome.code,
        report: StepReport {
            phase: Phase::Green,
            artifact: env.paths.code.clone(),
            fix_attempts: outcome.fix_attempts,
            verified: outcome.verified,
            check,
        },
    })
}
