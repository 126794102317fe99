//! Pipeline configuration stored in `redgreen.toml`.
//!
//! The configuration is loaded once at startup and passed by reference to
//! everything that needs it. Settings are never read from the process
//! environment; the binaries resolve the API key once and inject it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name in the working directory.
pub const CONFIG_FILE: &str = "redgreen.toml";

/// Top-level configuration (TOML).
///
/// Missing fields default to values that run against the OpenAI API with a
/// local `python3` and `pytest`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RedgreenConfig {
    /// Root that task filenames are resolved against.
    pub output_dir: PathBuf,
    /// Root for transcripts and reports; each task gets a subdirectory.
    pub log_dir: PathBuf,
    /// Language tag used in fenced code inside prompts.
    pub language: String,
    /// Test framework named in the Red prompt.
    pub test_library: String,
    pub llm: LlmConfig,
    pub sandbox: SandboxConfig,
    pub checks: ChecksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API root, without `/v1`.
    pub base_url: String,
    /// Model used by the `tdd` agent.
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    /// Environment variable the binaries read the API key from.
    pub api_key_env: String,
    /// Estimated cost per thousand response units.
    pub cost_per_1k: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter command; the code file path is appended.
    pub interpreter: Vec<String>,
    /// Suffix for the temporary code file.
    pub file_suffix: String,
    pub timeout_secs: u64,
    /// Fix attempts (model calls) allowed per artifact.
    pub max_attempts: u32,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChecksConfig {
    /// Command that executes the stub file directly.
    pub run_command: Vec<String>,
    /// Command that runs the test file.
    pub test_command: Vec<String>,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

impl Default for RedgreenConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            log_dir: PathBuf::from("logs"),
            language: "python".to_string(),
            test_library: "pytest".to_string(),
            llm: LlmConfig::default(),
            sandbox: SandboxConfig::default(),
            checks: ChecksConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.2,
            max_tokens: 2000,
            request_timeout_secs: 180,
            api_key_env: "OPENAI_API_KEY".to_string(),
            cost_per_1k: 0.06,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: vec!["python3".to_string()],
            file_suffix: ".py".to_string(),
            timeout_secs: 5,
            max_attempts: 2,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            run_command: vec!["python3".to_string()],
            test_command: vec!["pytest".to_string()],
            timeout_secs: 120,
            output_limit_bytes: 100_000,
        }
    }
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ChecksConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RedgreenConfig {
    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(anyhow!("language must not be empty"));
        }
        if self.test_library.trim().is_empty() {
            return Err(anyhow!("test_library must not be empty"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(anyhow!("llm.model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("llm.temperature must be within 0.0..=2.0"));
        }
        if self.llm.max_tokens == 0 {
            return Err(anyhow!("llm.max_tokens must be > 0"));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(anyhow!("llm.request_timeout_secs must be > 0"));
        }
        if self.llm.cost_per_1k < 0.0 {
            return Err(anyhow!("llm.cost_per_1k must be >= 0"));
        }
        if self.sandbox.timeout_secs == 0 {
            return Err(anyhow!("sandbox.timeout_secs must be > 0"));
        }
        if self.sandbox.output_limit_bytes == 0 || self.checks.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.checks.timeout_secs == 0 {
            return Err(anyhow!("checks.timeout_secs must be > 0"));
        }
        validate_command("sandbox.interpreter", &self.sandbox.interpreter)?;
        validate_command("checks.run_command", &self.checks.run_command)?;
        validate_command("checks.test_command", &self.checks.test_command)?;
        Ok(())
    }
}

fn validate_command(field: &str, command: &[String]) -> Result<()> {
    if command.is_empty() || command[0].trim().is_empty() {
        return Err(anyhow!("{field} must be a non-empty array"));
    }
    Ok(())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RedgreenConfig::default()`.
pub fn load_config(path: &Path) -> Result<RedgreenConfig> {
    if !path.exists() {
        let cfg = RedgreenConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RedgreenConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RedgreenConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RedgreenConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("redgreen.toml");
        let mut cfg = RedgreenConfig::default();
        cfg.sandbox.max_attempts = 4;
        cfg.checks.test_command = vec!["python3".into(), "-m".into(), "pytest".into()];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("redgreen.toml");
        fs::write(&path, "log_dir = \"runs\"\n[sandbox]\ntimeout_secs = 9\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.log_dir, PathBuf::from("runs"));
        assert_eq!(cfg.sandbox.timeout_secs, 9);
        assert_eq!(cfg.sandbox.max_attempts, 2);
        assert_eq!(cfg.llm.model, "gpt-4");
    }

    #[test]
    fn default_retry_budget_is_two() {
        assert_eq!(RedgreenConfig::default().sandbox.max_attempts, 2);
    }

    #[test]
    fn rejects_empty_test_command() {
        let mut cfg = RedgreenConfig::default();
        cfg.checks.test_command.clear();
        let err = cfg.validate().expect_err("empty command");
        assert!(err.to_string().contains("checks.test_command"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut cfg = RedgreenConfig::default();
        cfg.sandbox.timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }
}
