//! Task definition and agent identifier resolution.

use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// One unit of work for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable name; also the transcript directory under the log root.
    pub name: String,
    /// Natural-language description of the code to write.
    pub prompt: String,
    /// Target file, relative to the output root.
    pub filename: PathBuf,
    /// Agent identifier such as `tdd` or `tdd-gpt-4o`.
    #[serde(default = "default_agent")]
    pub agent: String,
}

fn default_agent() -> String {
    "tdd".to_string()
}

impl Task {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>, filename: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            filename: filename.into(),
            agent: default_agent(),
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("task name must not be empty");
        }
        if self.prompt.trim().is_empty() {
            bail!("task prompt must not be empty");
        }
        if self.filename.file_name().is_none() {
            bail!("task filename must name a file: {}", self.filename.display());
        }
        if self.filename.is_absolute() || escapes_root(&self.filename) {
            bail!(
                "task filename must stay inside the output root: {}",
                self.filename.display()
            );
        }
        let name = Path::new(&self.name);
        if name.is_absolute() || escapes_root(name) {
            bail!("task name must stay inside the log root: {}", self.name);
        }
        Ok(())
    }
}

fn escapes_root(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

/// Map an agent identifier to the model it drives.
///
/// `tdd` uses `default_model`; `tdd3`, `tdd4` and `tdd-chat` are fixed
/// aliases; `tdd-<model>` names the model directly.
pub fn resolve_model(agent: &str, default_model: &str) -> Result<String> {
    let model = match agent {
        "tdd" => default_model,
        "tdd3" => "gpt-3.5-turbo",
        "tdd4" | "tdd-chat" => "gpt-4",
        other => match other.strip_prefix("tdd-") {
            Some(model) if !model.is_empty() => model,
            _ => bail!("agent {agent} not implemented"),
        },
    };
    Ok(model.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_aliases() {
        assert_eq!(resolve_model("tdd", "gpt-4o").unwrap(), "gpt-4o");
        assert_eq!(resolve_model("tdd3", "gpt-4o").unwrap(), "gpt-3.5-turbo");
        assert_eq!(resolve_model("tdd4", "gpt-4o").unwrap(), "gpt-4");
        assert_eq!(resolve_model("tdd-chat", "gpt-4o").unwrap(), "gpt-4");
    }

    #[test]
    fn resolves_explicit_model_suffix() {
        assert_eq!(
            resolve_model("tdd-gpt-4o-mini", "gpt-4").unwrap(),
            "gpt-4o-mini"
        );
    }

    #[test]
    fn rejects_unknown_agents() {
        assert!(resolve_model("linear", "gpt-4").is_err());
        assert!(resolve_model("tdd-", "gpt-4").is_err());
    }

    #[test]
    fn validate_rejects_absolute_and_empty_fields() {
        assert!(Task::new("add", "add numbers", "add.py").validate().is_ok());
        assert!(Task::new("", "add numbers", "add.py").validate().is_err());
        assert!(Task::new("add", " ", "add.py").validate().is_err());
        assert!(Task::new("add", "add numbers", "/tmp/add.py").validate().is_err());
    }

    #[test]
    fn validate_rejects_parent_components() {
        assert!(Task::new("add", "p", "pkg/add.py").validate().is_ok());
        assert!(Task::new("add", "p", "../../x.py").validate().is_err());
        assert!(Task::new("add", "p", "pkg/../../x.py").validate().is_err());
        assert!(Task::new("../x", "p", "add.py").validate().is_err());
        assert!(Task::new("/tmp/x", "p", "add.py").validate().is_err());
    }

    #[test]
    fn task_defaults_agent_when_deserialized() {
        let task: Task =
            serde_json::from_str(r#"{"name":"add","prompt":"p","filename":"add.py"}"#)
                .expect("parse");
        assert_eq!(task.agent, "tdd");
    }
}
