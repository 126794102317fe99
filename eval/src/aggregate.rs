//! Collect generated sample files into JSON Lines for scoring.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::problems::{Problem, parse_sample_stem};

pub const SAMPLES_FILE: &str = "human_eval_samples.jsonl";
pub const PROBLEMS_FILE: &str = "human_eval_problems.jsonl";

/// One generated completion, in the layout HumanEval scorers read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub task_id: String,
    pub completion: String,
}

/// A sample together with the indices encoded in its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedSample {
    pub problem: usize,
    pub sample: usize,
    pub inner: Sample,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregateSummary {
    pub samples: usize,
    pub problems: usize,
}

/// Read every `human_eval_<i>_<j>.py` in `outdir`, ordered by index.
///
/// Files whose problem index is outside `problems` are skipped with a
/// warning; they belong to a different problem file.
pub fn collect_samples(outdir: &Path, problems: &[Problem]) -> Result<Vec<IndexedSample>> {
    let mut samples = Vec::new();
    for entry in fs::read_dir(outdir).with_context(|| format!("read {}", outdir.display()))? {
        let path = entry.context("read entry")?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("py") {
            continue;
        }
        let Some((problem, sample)) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(parse_sample_stem)
        else {
            continue;
        };
        let Some(source) = problems.get(problem) else {
            warn!(path = %path.display(), "sample index has no matching problem, skipping");
            continue;
        };
        let completion =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        samples.push(IndexedSample {
            problem,
            sample,
            inner: Sample {
                task_id: source.task_id.clone(),
                completion,
            },
        });
    }
    samples.sort_by_key(|s| (s.problem, s.sample));
    Ok(samples)
}

/// Write `human_eval_samples.jsonl` and the matching subset of problems to
/// `human_eval_problems.jsonl`.
pub fn aggregate(outdir: &Path, problems: &[Problem]) -> Result<AggregateSummary> {
    let samples = collect_samples(outdir, problems)?;

    let sample_lines = samples
        .iter()
        .map(|s| serde_json::to_string(&s.inner))
        .collect::<Result<Vec<_>, _>>()
        .context("serialize samples")?;
    write_lines(&outdir.join(SAMPLES_FILE), &sample_lines)?;

    let mut used: Vec<usize> = samples.iter().map(|s| s.problem).collect();
    used.dedup();
    let problem_lines = used
        .iter()
        .map(|&idx| serde_json::to_string(&problems[idx]))
        .collect::<Result<Vec<_>, _>>()
        .context("serialize problems")?;
    write_lines(&outdir.join(PROBLEMS_FILE), &problem_lines)?;

    let summary = AggregateSummary {
        samples: sample_lines.len(),
        problems: problem_lines.len(),
    };
    info!(samples = summary.samples, problems = summary.problems, "aggregated samples");
    Ok(summary)
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut buf = String::new();
    for line in lines {
        buf.push_str(line);
        buf.push('\n');
    }
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn problem(id: &str) -> Problem {
        Problem {
            task_id: id.to_string(),
            prompt: format!("# {id}\n"),
            extra: Map::new(),
        }
    }

    #[test]
    fn aggregate_maps_files_back_to_task_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outdir = temp.path();
        fs::write(outdir.join("human_eval_0002_0000.py"), "c = 3\n").expect("write");
        fs::write(outdir.join("human_eval_0000_0001.py"), "a = 2\n").expect("write");
        fs::write(outdir.join("human_eval_0000_0000.py"), "a = 1\n").expect("write");
        fs::write(outdir.join("human_eval_0009_0000.py"), "stray\n").expect("write");
        fs::write(outdir.join("notes.py"), "ignored\n").expect("write");
        let problems = [problem("HumanEval/0"), problem("HumanEval/1"), problem("HumanEval/10")];

        let summary = aggregate(outdir, &problems).expect("aggregate");

        assert_eq!(summary, AggregateSummary { samples: 3, problems: 2 });
        let samples = fs::read_to_string(outdir.join(SAMPLES_FILE)).expect("samples");
        let parsed: Vec<Sample> = samples
            .lines()
            .map(|line| serde_json::from_str(line).expect("sample line"))
            .collect();
        assert_eq!(parsed[0].completion, "a = 1\n");
        assert_eq!(parsed[1].completion, "a = 2\n");
        assert_eq!(parsed[2].task_id, "HumanEval/10");

        let problems_out = fs::read_to_string(outdir.join(PROBLEMS_FILE)).expect("problems");
        assert_eq!(problems_out.lines().count(), 2);
        assert!(problems_out.contains("HumanEval/10"));
        assert!(!problems_out.contains("HumanEval/1\""));
    }
}
