//! On-disk layout for generated artifacts and per-task logs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

/// Where one task's code and tests live under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Output root the artifacts are written under.
    pub root: PathBuf,
    /// Directory holding `code`; generated snippets run and import from here.
    pub dir: PathBuf,
    /// `<root>/<filename>`: the stub, later overwritten by the implementation.
    pub code: PathBuf,
    /// `<root>/<dir of filename>/tests/test_<name>`.
    pub test: PathBuf,
}

impl ArtifactPaths {
    pub fn new(root: &Path, filename: &Path) -> Result<Self> {
        let name = filename
            .file_name()
            .ok_or_else(|| anyhow!("filename has no file name: {}", filename.display()))?
            .to_string_lossy()
            .into_owned();
        let code = root.join(filename);
        let dir = code.parent().unwrap_or(root).to_path_buf();
        Ok(Self {
            root: root.to_path_buf(),
            test: dir.join("tests").join(format!("test_{name}")),
            dir,
            code,
        })
    }
}

/// Per-task log directory: `<log-root>/<task-name>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLogPaths {
    pub dir: PathBuf,
    pub report_path: PathBuf,
}

impl TaskLogPaths {
    pub fn new(log_root: &Path, task_name: &str) -> Self {
        let dir = log_root.join(task_name);
        Self {
            report_path: dir.join("report.json"),
            dir,
        }
    }

    /// Output log for the external check run by `step`.
    pub fn check_log(&self, step: &str) -> PathBuf {
        self.dir.join(format!("{step}-check.log"))
    }
}

/// Write `code` to `path`, creating parent directories and replacing any
/// previous contents. A trailing newline is added when missing.
pub fn save_artifact(path: &Path, code: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create artifact dir {}", parent.display()))?;
    }
    let mut contents = code.to_string();
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    fs::write(path, contents).with_context(|| format!("write artifact {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_are_stable() {
        let paths = ArtifactPaths::new(Path::new("/out"), Path::new("add.py")).expect("paths");

        assert_eq!(paths.code, PathBuf::from("/out/add.py"));
        assert_eq!(paths.test, PathBuf::from("/out/tests/test_add.py"));
    }

    #[test]
    fn nested_filename_keeps_tests_beside_module() {
        let paths = ArtifactPaths::new(Path::new("/out"), Path::new("pkg/math.py")).expect("paths");

        assert_eq!(paths.dir, PathBuf::from("/out/pkg"));
        assert_eq!(paths.code, PathBuf::from("/out/pkg/math.py"));
        assert_eq!(paths.test, PathBuf::from("/out/pkg/tests/test_math.py"));
    }

    #[test]
    fn task_log_paths_nest_under_task_name() {
        let logs = TaskLogPaths::new(Path::new("logs"), "add");
        assert_eq!(logs.dir, PathBuf::from("logs/add"));
        assert_eq!(logs.report_path, PathBuf::from("logs/add/report.json"));
        assert_eq!(logs.check_log("red"), PathBuf::from("logs/add/red-check.log"));
    }

    #[test]
    fn save_creates_dirs_and_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tests").join("test_add.py");

        save_artifact(&path, "first").expect("save");
        save_artifact(&path, "second\n").expect("save");

        assert_eq!(fs::read_to_string(&path).expect("read"), "second\n");
    }
}
