//! Prompt templates for the TDD steps and the error-fix loop.
//!
//! Templates are embedded at compile time and rendered with minijinja in
//! strict mode: a placeholder without a value is a render error, never an
//! empty string.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior, context};
use regex::Regex;
use serde::Serialize;

use crate::core::signatures::FunctionSignature;

const STUB_TEMPLATE: &str = include_str!("prompts/stub.md");
const RED_TEMPLATE: &str = include_str!("prompts/red.md");
const GREEN_TEMPLATE: &str = include_str!("prompts/green.md");
const FIX_TEMPLATE: &str = include_str!("prompts/fix.md");
const FUNCTIONS_TEMPLATE: &str = include_str!("prompts/functions.md");

static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{4,}").expect("static regex"));

/// Fields shared by every step prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    /// Rendered available-function listing, possibly empty.
    pub functions_section: &'a str,
    /// Target filename as shown to the model.
    pub filename: &'a str,
    /// Natural-language task.
    pub prompt: &'a str,
    /// Few-shot examples, possibly empty.
    pub examples: &'a str,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        for (name, source) in [
            ("stub", STUB_TEMPLATE),
            ("red", RED_TEMPLATE),
            ("green", GREEN_TEMPLATE),
            ("fix", FIX_TEMPLATE),
            ("functions", FUNCTIONS_TEMPLATE),
        ] {
            env.add_template(name, source)
                .with_context(|| format!("load {name} template"))?;
        }
        Ok(Self { env })
    }

    pub fn render_stub(&self, ctx: &PromptContext<'_>) -> Result<String> {
        self.render(
            "stub",
            context! {
                functions_section => ctx.functions_section,
                filename => ctx.filename,
                prompt => ctx.prompt,
                examples => ctx.examples,
            },
        )
    }

    pub fn render_red(&self, ctx: &PromptContext<'_>, test_library: &str) -> Result<String> {
        self.render(
            "red",
            context! {
                functions_section => ctx.functions_section,
                filename => ctx.filename,
                prompt => ctx.prompt,
                examples => ctx.examples,
                test_library => test_library,
            },
        )
    }

    pub fn render_green(
        &self,
        ctx: &PromptContext<'_>,
        tests: &str,
        test_errors: &str,
    ) -> Result<String> {
        self.render(
            "green",
            context! {
                functions_section => ctx.functions_section,
                filename => ctx.filename,
                prompt => ctx.prompt,
                examples => ctx.examples,
                tests => tests,
                test_errors => test_errors,
            },
        )
    }

    /// Render the error-fix prompt for code that failed in the sandbox.
    pub fn render_fix(
        &self,
        ctx: &PromptContext<'_>,
        code: &str,
        error: &str,
        language: &str,
    ) -> Result<String> {
        self.render(
            "fix",
            context! {
                functions_section => ctx.functions_section,
                filename => ctx.filename,
                prompt => ctx.prompt,
                examples => ctx.examples,
                code => code,
                error => error,
                language => language,
            },
        )
    }

    /// Render the available-function listing for later step prompts.
    ///
    /// Returns an empty string when there is nothing to list, so prompts
    /// never carry a header without entries.
    pub fn render_functions_section(
        &self,
        filename: &str,
        signatures: &[FunctionSignature],
        language: &str,
    ) -> Result<String> {
        if signatures.is_empty() {
            return Ok(String::new());
        }
        let functions: Vec<FunctionMention<'_>> = signatures
            .iter()
            .map(|signature| FunctionMention {
                name: &signature.name,
                stub: &signature.stub,
            })
            .collect();
        let mut section = self.render(
            "functions",
            context! {
                filename => filename,
                functions => functions,
                language => language,
            },
        )?;
        section.push('\n');
        Ok(section)
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        let rendered = template
            .render(ctx)
            .with_context(|| format!("render {name} prompt"))?;
        Ok(collapse_blank_lines(&rendered))
    }
}

#[derive(Debug, Serialize)]
struct FunctionMention<'a> {
    name: &'a str,
    stub: &'a str,
}

/// Collapse runs of four or more newlines down to three.
///
/// Empty placeholders leave gaps in the rendered templates; this keeps the
/// prompt tidy without touching intentional single blank lines.
pub fn collapse_blank_lines(text: &str) -> String {
    EXCESS_BLANK_LINES.replace_all(text, "\n\n\n").into_owned()
}
