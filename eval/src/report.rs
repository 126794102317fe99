//! Scoring: functional correctness of samples and pass@k.
//!
//! Each sample is run against its problem's hidden `test` block in the
//! sandbox. The pipeline's own Green test results are reported alongside,
//! read back from the per-sample `report.json` files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use redgreen::core::usage::ApiStats;
use redgreen::io::report::read_report;
use redgreen::io::sandbox::Sandbox;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::aggregate::IndexedSample;
use crate::problems::{Problem, sample_stem};

pub const RESULTS_FILE: &str = "human_eval_results.json";

/// k values reported when enough samples exist per problem.
pub const K_VALUES: &[usize] = &[1, 2, 3, 4, 5, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleScore {
    pub task_id: String,
    pub sample: usize,
    /// Hidden tests passed; `None` when the problem has no `test`/`entry_point`.
    pub passed: Option<bool>,
    /// Green's own test run, when a pipeline report exists.
    pub self_tests_passed: Option<bool>,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResults {
    pub generated_at: DateTime<Utc>,
    /// SHA-256 of the problem file, to tie results to their inputs.
    pub problems_sha256: Option<String>,
    pub samples: usize,
    pub passed: usize,
    pub self_tests_passed: usize,
    pub pass_at_k: BTreeMap<String, f64>,
    pub usage: ApiStats,
    pub scores: Vec<SampleScore>,
}

/// Unbiased pass@k estimate for `n` samples of which `c` passed.
pub fn pass_at_k(n: usize, c: usize, k: usize) -> f64 {
    if n.saturating_sub(c) < k {
        return 1.0;
    }
    let mut fail_all = 1.0;
    for i in (n - c + 1)..=n {
        fail_all *= 1.0 - k as f64 / i as f64;
    }
    1.0 - fail_all
}

/// Program that runs `completion` against the problem's hidden tests.
pub fn check_program(problem: &Problem, completion: &str) -> Option<String> {
    let test = problem.extra.get("test")?.as_str()?;
    let entry_point = problem.extra.get("entry_point")?.as_str()?;
    Some(format!(
        "{}\n{}\n\n{}\n\ncheck({})\n",
        problem.prompt, completion, test, entry_point
    ))
}

/// Score every sample and read back the pipeline reports under
/// `<outdir>/logs/`.
#[instrument(skip_all, fields(samples = samples.len()))]
pub fn score_samples<S: Sandbox + ?Sized>(
    sandbox: &S,
    outdir: &Path,
    problems: &[Problem],
    samples: &[IndexedSample],
) -> Result<(Vec<SampleScore>, ApiStats)> {
    let mut scores = Vec::with_capacity(samples.len());
    let mut usage = ApiStats::default();

    for sample in samples {
        let problem = &problems[sample.problem];
        let (passed, result) = match check_program(problem, &sample.inner.completion) {
            Some(program) => {
                let run = sandbox.execute(&program, outdir)?;
                match run.failure_reason() {
                    None => (Some(true), "passed".to_string()),
                    Some(reason) => (Some(false), format!("failed: {}", last_line(&reason))),
                }
            }
            None => (None, "no hidden tests".to_string()),
        };

        let report_path = outdir
            .join("logs")
            .join(sample_stem(sample.problem, sample.sample))
            .join("report.json");
        let self_tests_passed = if report_path.exists() {
            match read_report(&report_path) {
                Ok(report) => {
                    usage.merge(&report.usage);
                    Some(report.passed)
                }
                Err(err) => {
                    warn!(path = %report_path.display(), "unreadable report: {err:#}");
                    None
                }
            }
        } else {
            None
        };

        debug!(task_id = %problem.task_id, sample = sample.sample, ?passed, "sample scored");
        scores.push(SampleScore {
            task_id: problem.task_id.clone(),
            sample: sample.sample,
            passed,
            self_tests_passed,
            result,
        });
    }
    Ok((scores, usage))
}

/// pass@k averaged over problems, for each k no larger than the smallest
/// per-problem sample count.
pub fn pass_at_k_table(scores: &[SampleScore]) -> BTreeMap<String, f64> {
    let mut per_problem: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for score in scores {
        let Some(passed) = score.passed else { continue };
        let entry = per_problem.entry(score.task_id.as_str()).or_insert((0, 0));
        entry.0 += 1;
        if passed {
            entry.1 += 1;
        }
    }
    let Some(min_n) = per_problem.values().map(|(n, _)| *n).min() else {
        return BTreeMap::new();
    };

    K_VALUES
        .iter()
        .filter(|&&k| k <= min_n)
        .map(|&k| {
            let total: f64 = per_problem.values().map(|&(n, c)| pass_at_k(n, c, k)).sum();
            (format!("pass@{k}"), total / per_problem.len() as f64)
        })
        .collect()
}

pub fn build_results(
    scores: Vec<SampleScore>,
    usage: ApiStats,
    problems_sha256: Option<String>,
) -> EvalResults {
    EvalResults {
        generated_at: Utc::now(),
        problems_sha256,
        samples: scores.len(),
        passed: scores.iter().filter(|s| s.passed == Some(true)).count(),
        self_tests_passed: scores
            .iter()
            .filter(|s| s.self_tests_passed == Some(true))
            .count(),
        pass_at_k: pass_at_k_table(&scores),
        usage,
        scores,
    }
}

pub fn write_results(path: &Path, results: &EvalResults) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(results).context("serialize results")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    Ok(hex::encode(hasher.finalize()))
}

fn last_line(text: &str) -> &str {
    text.trim_end().lines().last().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Sample;
    use redgreen::core::types::ExecState;
    use redgreen::test_support::ScriptedSandbox;
    use serde_json::{Map, Value};

    fn problem(id: &str, with_tests: bool) -> Problem {
        let mut extra = Map::new();
        if with_tests {
            extra.insert(
                "test".to_string(),
                Value::from("def check(candidate):\n    assert candidate() == 1"),
            );
            extra.insert("entry_point".to_string(), Value::from("f"));
        }
        Problem {
            task_id: id.to_string(),
            prompt: "def f():\n    \"\"\"Return 1.\"\"\"\n".to_string(),
            extra,
        }
    }

    fn sample(problem: usize, sample: usize, task_id: &str) -> IndexedSample {
        IndexedSample {
            problem,
            sample,
            inner: Sample {
                task_id: task_id.to_string(),
                completion: "def f():\n    return 1\n".to_string(),
            },
        }
    }

    #[test]
    fn pass_at_k_matches_closed_form() {
        assert_eq!(pass_at_k(5, 0, 1), 0.0);
        assert_eq!(pass_at_k(5, 5, 1), 1.0);
        assert!((pass_at_k(4, 1, 1) - 0.25).abs() < 1e-12);
        // 1 - C(2,2)/C(4,2) = 1 - 1/6
        assert!((pass_at_k(4, 2, 2) - 5.0 / 6.0).abs() < 1e-12);
        assert_eq!(pass_at_k(3, 2, 2), 1.0);
    }

    #[test]
    fn check_program_appends_hidden_tests() {
        let program = check_program(&problem("HumanEval/0", true), "def f():\n    return 1\n")
            .expect("program");
        assert!(program.starts_with("def f():\n    \"\"\"Return 1.\"\"\"\n\ndef f():"));
        assert!(program.ends_with("check(f)\n"));
        assert!(check_program(&problem("HumanEval/0", false), "x").is_none());
    }

    /// Verifies sandbox outcomes become scores and pass@k covers only
    /// problems with hidden tests.
    #[test]
    fn scores_follow_sandbox_outcomes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let problems = [
            problem("HumanEval/0", true),
            problem("HumanEval/1", true),
            problem("HumanEval/2", false),
        ];
        let samples = [
            sample(0, 0, "HumanEval/0"),
            sample(1, 0, "HumanEval/1"),
            sample(2, 0, "HumanEval/2"),
        ];
        let sandbox = ScriptedSandbox::new([ExecState::Completed, ExecState::Failed]);

        let (scores, usage) =
            score_samples(&sandbox, temp.path(), &problems, &samples).expect("score");

        assert_eq!(sandbox.executed().len(), 2);
        assert_eq!(scores[0].passed, Some(true));
        assert_eq!(scores[1].passed, Some(false));
        assert_eq!(scores[1].result, "failed: scripted failure");
        assert_eq!(scores[2].passed, None);
        assert!(scores.iter().all(|s| s.self_tests_passed.is_none()));
        assert_eq!(usage.total_calls(), 0);

        let results = build_results(scores, usage, None);
        assert_eq!(results.samples, 3);
        assert_eq!(results.passed, 1);
        assert_eq!(results.pass_at_k.len(), 1);
        assert!((results.pass_at_k["pass@1"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn results_file_is_pretty_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(RESULTS_FILE);
        let results = build_results(Vec::new(), ApiStats::default(), Some("abc".to_string()));

        write_results(&path, &results).expect("write");

        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"problems_sha256\": \"abc\""));
        assert!(raw.ends_with("}\n"));
    }
}
