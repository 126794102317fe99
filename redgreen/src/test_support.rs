//! Scripted doubles for driving the pipeline without a model or toolchain.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::core::types::{CheckOutcome, ExecState, ExecutionResult};
use crate::io::checks::{CheckRequest, CheckRunner};
use crate::io::config::RedgreenConfig;
use crate::io::llm::{Completion, Llm, LlmError};
use crate::io::sandbox::Sandbox;

/// Model that replays queued completions and records every prompt.
///
/// Running out of completions yields [`LlmError::EmptyResponse`].
pub struct ScriptedLlm {
    responses: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
    model: String,
}

impl ScriptedLlm {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: RefCell::new(responses.into_iter().map(Into::into).collect()),
            prompts: RefCell::new(Vec::new()),
            model: "scripted".to_string(),
        }
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl Llm for ScriptedLlm {
    fn complete(&self, prompt: &str) -> Result<Completion, LlmError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        let text = self
            .responses
            .borrow_mut()
            .pop_front()
            .ok_or(LlmError::EmptyResponse)?;
        Ok(Completion {
            output_tokens: Some(text.split_whitespace().count() as u64),
            input_tokens: Some(prompt.split_whitespace().count() as u64),
            text,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Sandbox that returns queued terminal states and records executed code.
///
/// Failed runs report `scripted failure` as their output.
pub struct ScriptedSandbox {
    states: RefCell<VecDeque<ExecState>>,
    fallback: ExecState,
    executed: RefCell<Vec<String>>,
}

impl ScriptedSandbox {
    /// Replay `states`, then complete every later run.
    pub fn new(states: impl IntoIterator<Item = ExecState>) -> Self {
        Self {
            states: RefCell::new(states.into_iter().collect()),
            fallback: ExecState::Completed,
            executed: RefCell::new(Vec::new()),
        }
    }

    /// End every run in `state`.
    pub fn always(state: ExecState) -> Self {
        Self {
            states: RefCell::new(VecDeque::new()),
            fallback: state,
            executed: RefCell::new(Vec::new()),
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }
}

impl Sandbox for ScriptedSandbox {
    fn execute(&self, code: &str, _workdir: &Path) -> Result<ExecutionResult> {
        self.executed.borrow_mut().push(code.to_string());
        let state = self
            .states
            .borrow_mut()
            .pop_front()
            .unwrap_or(self.fallback);
        let output = match state {
            ExecState::Failed => "scripted failure".to_string(),
            _ => String::new(),
        };
        Ok(ExecutionResult {
            state,
            output,
            timeout: Duration::from_secs(5),
        })
    }
}

/// One check invocation as observed by [`ScriptedCheckRunner`].
#[derive(Debug, Clone)]
pub struct ObservedCheck {
    pub request: CheckRequest,
    /// Contents of the target file when the check ran.
    pub target_contents: String,
}

/// Check runner that returns queued outcomes, passing once the queue is empty.
pub struct ScriptedCheckRunner {
    outcomes: RefCell<VecDeque<CheckOutcome>>,
    observed: RefCell<Vec<ObservedCheck>>,
}

impl ScriptedCheckRunner {
    pub fn new(outcomes: impl IntoIterator<Item = CheckOutcome>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into_iter().collect()),
            observed: RefCell::new(Vec::new()),
        }
    }

    pub fn observed(&self) -> Vec<ObservedCheck> {
        self.observed.borrow().clone()
    }
}

impl CheckRunner for ScriptedCheckRunner {
    fn run(&self, request: &CheckRequest) -> Result<CheckOutcome> {
        let target_contents = fs::read_to_string(&request.target).unwrap_or_default();
        self.observed.borrow_mut().push(ObservedCheck {
            request: request.clone(),
            target_contents,
        });
        Ok(self
            .outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| check(true, "ok")))
    }
}

/// Shorthand for a [`CheckOutcome`].
pub fn check(passed: bool, output: &str) -> CheckOutcome {
    CheckOutcome {
        passed,
        output: output.to_string(),
    }
}

/// Default config with output and logs under `root`.
pub fn test_config(root: &Path) -> RedgreenConfig {
    RedgreenConfig {
        output_dir: root.join("out"),
        log_dir: root.join("logs"),
        ..RedgreenConfig::default()
    }
}
