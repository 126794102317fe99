//! Red step: a test that fails against the stub.

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
pub struct RedOutput {
    pub test_code: String,
    pub report: StepReport,
}

impl RedOutput {
    /// Test runner output, handed to Green as the failure message.
    pub fn test_errors(&self) -> &str {
        &self.report.check.output
    }
}

/// Generate the test file and run it once.
///
/// A passing test is unexpected but only logged.
#[instrument(skip_all, fields(task = %task.name))]
pub fn red_step<L, S, C>(
    env: &mut StepEnv<'_, L, S, C>,
    task: &Task,
    functions_section: &str,
) -> Result<RedOutput>
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
    let prompt = env
        .prompts
        .render_red(&context, &env.config.test_library)?;
    let outcome = env.generate("red", &prompt, context)?;

    save_artifact(&env.paths.test, &outcome.code)?;
    let check = env.check("red", &env.config.checks.test_command, &env.paths.test)?;
    if check.passed {
        warn!(path = %env.paths.test.display(), "test passes against the stub");
    } else {
        info!(path = %env.paths.test.display(), "created a failing test");
    }

    Ok(RedOutput {
        test_code: outcome.code,
        report: StepReport {
            phase: Phase::Red,
            artifact: env.paths.test.clone(),
            fix_attempts: outcome.fix_attempts,
            verified: outcome.verified,
            check,
        },
    })
}
