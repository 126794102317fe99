//! HumanEval-style problem sets and sample file naming.
//!
//! Problems are read from JSON Lines, one object per line with at least
//! `task_id` and `prompt`. Any other fields (`entry_point`, `test`, ...) are
//! kept so the problem can be written back out unchanged for scoring.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix shared by every generated sample file.
pub const SAMPLE_PREFIX: &str = "human_eval_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub task_id: String,
    pub prompt: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Load problems sorted by `task_id`, so sample indices are stable across
/// runs of the same file.
pub fn load_problems(path: &Path) -> Result<Vec<Problem>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut problems = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let problem: Problem = serde_json::from_str(line)
            .with_context(|| format!("parse {} line {}", path.display(), idx + 1))?;
        problems.push(problem);
    }
    problems.sort_by(|a, b| a.task_id.cmp(&b.task_id));
    if let Some(pair) = problems.windows(2).find(|w| w[0].task_id == w[1].task_id) {
        bail!("duplicate task_id {} in {}", pair[0].task_id, path.display());
    }
    Ok(problems)
}

/// `human_eval_<problem:04>_<sample:04>`, the task name and file stem of one sample.
pub fn sample_stem(problem: usize, sample: usize) -> String {
    format!("{SAMPLE_PREFIX}{problem:04}_{sample:04}")
}

pub fn sample_filename(problem: usize, sample: usize) -> String {
    format!("{}.py", sample_stem(problem, sample))
}

/// Inverse of [`sample_stem`]; `None` for names that are not samples.
pub fn parse_sample_stem(stem: &str) -> Option<(usize, usize)> {
    let rest = stem.strip_prefix(SAMPLE_PREFIX)?;
    let (problem, sample) = rest.split_once('_')?;
    Some((problem.parse().ok()?, sample.parse().ok()?))
}
