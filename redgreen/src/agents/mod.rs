//! Stub, Red and Green step agents.
//!
//! Each step renders its prompt, asks the model, extracts the code, runs it
//! through the run-and-fix loop, persists it and finally runs an external
//! check on the persisted file. [`StepEnv`] carries everything a step needs
//! for one task.

use std::path::Path;

use anyhow::Result;

use crate::core::extract::extract_code;
use crate::core::types::CheckOutcome;
use crate::io::artifacts::{ArtifactPaths, TaskLogPaths};
use crate::io::checks::{CheckRequest, CheckRunner};
use crate::io::config::RedgreenConfig;
use crate::io::llm::Llm;
use crate::io::prompt::{PromptContext, PromptEngine};
use crate::io::sandbox::Sandbox;
use crate::repair::{RepairOutcome, RepairRequest, run_and_fix};
use crate::session::LlmSession;

pub mod green;
pub mod red;
pub mod stub;

pub use green::{GreenOutput, green_step};
pub use red::{RedOutput, red_step};
pub use stub::{StubOutput, stub_step};

/// Collaborators and paths for one task's steps.
pub struct StepEnv<'e, L, S, C>
where
    L: Llm + ?Sized,
    S: Sandbox + ?Sized,
    C: CheckRunner + ?Sized,
{
    pub session: LlmSession<'e, L>,
    pub sandbox: &'e S,
    pub checks: &'e C,
    pub prompts: &'e PromptEngine,
    pub config: &'e RedgreenConfig,
    pub paths: ArtifactPaths,
    pub logs: TaskLogPaths,
}

impl<L, S, C> StepEnv<'_, L, S, C>
where
    L: Llm + ?Sized,
    S: Sandbox + ?Sized,
    C: CheckRunner + ?Sized,
{
    /// Send `prompt`, extract the code and repair it until it runs or the
    /// attempt budget is spent.
    pub(crate) fn generate(
        &mut self,
        step: &str,
        prompt: &str,
        context: PromptContext<'_>,
    ) -> Result<RepairOutcome> {
        let completion = self.session.call(step, prompt)?;
        let code = extract_code(&completion);
        let request = RepairRequest {
            step,
            context,
            language: &self.config.language,
            max_attempts: self.config.sandbox.max_attempts,
            workdir: &self.paths.dir,
        };
        run_and_fix(&mut self.session, self.sandbox, self.prompts, &request, code)
    }

    /// Run `command` on the persisted `target`, logging to `<step>-check.log`.
    pub(crate) fn check(&self, step: &str, command: &[String], target: &Path) -> Result<CheckOutcome> {
        let request = CheckRequest::new(
            &self.config.checks,
            command,
            target,
            &self.paths.dir,
            &self.logs.check_log(step),
        );
        self.checks.run(&request)
    }

    /// Filename as shown to the model.
    pub(crate) fn display_filename(&self) -> String {
        self.paths
            .code
            .strip_prefix(&self.paths.root)
            .unwrap_or(&self.paths.code)
            .display()
            .to_string()
    }
}
