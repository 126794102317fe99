//! Batch generation over a problem set.
//!
//! Every (problem, sample) pair becomes one pipeline task whose module is
//! written to `<outdir>/human_eval_<i>_<j>.py`. Runs are sequential and can
//! be resumed from a problem/sample index after an interruption.

use std::path::PathBuf;

use anyhow::{Context, Result};
use redgreen::core::task::Task;
use redgreen::io::checks::CheckRunner;
use redgreen::io::config::RedgreenConfig;
use redgreen::io::llm::Llm;
use redgreen::io::sandbox::Sandbox;
use redgreen::pipeline::run_task;
use tracing::{info, instrument};

use crate::problems::{Problem, sample_filename, sample_stem};

/// Which part of the problem set to generate.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub agent: String,
    pub outdir: PathBuf,
    pub samples_per_problem: usize,
    /// First problem index to generate; earlier problems are skipped.
    pub start_problem: usize,
    /// First sample index within `start_problem`. Later problems start at 0.
    pub start_sample: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub generated: usize,
    pub passed: usize,
    pub skipped: usize,
}

impl RunPlan {
    /// Pipeline config for this plan: artifacts go to `outdir`, logs to
    /// `outdir/logs`.
    pub fn task_config(&self, base: &RedgreenConfig) -> RedgreenConfig {
        RedgreenConfig {
            output_dir: self.outdir.clone(),
            log_dir: self.outdir.join("logs"),
            ..base.clone()
        }
    }

    fn first_sample(&self, problem: usize) -> Option<usize> {
        match problem.cmp(&self.start_problem) {
            std::cmp::Ordering::Less => None,
            std::cmp::Ordering::Equal => Some(self.start_sample),
            std::cmp::Ordering::Greater => Some(0),
        }
    }
}

/// Generate every planned sample. Any pipeline error stops the batch; rerun
/// with the printed indices to resume.
#[instrument(skip_all, fields(agent = %plan.agent, problems = problems.len()))]
pub fn run_problems<L, S, C>(
    llm: &L,
    sandbox: &S,
    checks: &C,
    base: &RedgreenConfig,
    problems: &[Problem],
    plan: &RunPlan,
) -> Result<RunSummary>
where
    L: Llm + ?Sized,
    S: Sandbox + ?Sized,
    C: CheckRunner + ?Sized,
{
    let config = plan.task_config(base);
    let total = problems.len() * plan.samples_per_problem;
    let mut summary = RunSummary::default();

    for (i, problem) in problems.iter().enumerate() {
        let Some(first) = plan.first_sample(i) else {
            summary.skipped += plan.samples_per_problem;
            continue;
        };
        summary.skipped += first.min(plan.samples_per_problem);

        for j in first..plan.samples_per_problem {
            let task = Task::new(sample_stem(i, j), &problem.prompt, sample_filename(i, j))
                .with_agent(&plan.agent);
            let report = run_task(llm, sandbox, checks, &config, &task).with_context(|| {
                format!(
                    "{} sample {j} (resume with --start {i} --start-sample {j})",
                    problem.task_id
                )
            })?;

            summary.generated += 1;
            if report.passed {
                summary.passed += 1;
            }
            info!(
                task_id = %problem.task_id,
                sample = j,
                passed = report.passed,
                done = summary.generated + summary.skipped,
                total,
                "sample generated"
            );
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use redgreen::core::types::ExecState;
    use redgreen::test_support::{ScriptedCheckRunner, ScriptedLlm, ScriptedSandbox, test_config};
    use serde_json::Map;

    fn problem(id: &str) -> Problem {
        Problem {
            task_id: id.to_string(),
            prompt: "def f():\n    \"\"\"Return 1.\"\"\"\n".to_string(),
            extra: Map::new(),
        }
    }

    fn plan(outdir: PathBuf, samples: usize, start_problem: usize, start_sample: usize) -> RunPlan {
        RunPlan {
            agent: "tdd".to_string(),
            outdir,
            samples_per_problem: samples,
            start_problem,
            start_sample,
        }
    }

    #[test]
    fn resume_skips_earlier_problems_and_samples() {
        let p = plan(PathBuf::from("out"), 3, 1, 2);
        assert_eq!(p.first_sample(0), None);
        assert_eq!(p.first_sample(1), Some(2));
        assert_eq!(p.first_sample(2), Some(0));
    }

    /// Verifies one pipeline run per sample and the sample file layout.
    #[test]
    fn generates_one_file_per_sample() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outdir = temp.path().join("human_eval");
        let responses: Vec<String> = (0..6)
            .flat_map(|_| {
                [
                    "def f() -> int:\n    ...".to_string(),
                    "from human_eval import f\n\ndef test_f():\n    assert f() == 1".to_string(),
                    "def f() -> int:\n    return 1".to_string(),
                ]
            })
            .collect();
        let llm = ScriptedLlm::new(responses);
        let sandbox = ScriptedSandbox::always(ExecState::Completed);
        let checks = ScriptedCheckRunner::new([]);
        let problems = [problem("HumanEval/0"), problem("HumanEval/1")];

        let summary = run_problems(
            &llm,
            &sandbox,
            &checks,
            &test_config(temp.path()),
            &problems,
            &plan(outdir.clone(), 2, 0, 1),
        )
        .expect("run");

        assert_eq!(
            summary,
            RunSummary {
                generated: 3,
                passed: 3,
                skipped: 1
            }
        );
        assert!(!outdir.join("human_eval_0000_0000.py").exists());
        assert!(outdir.join("human_eval_0000_0001.py").is_file());
        assert!(outdir.join("human_eval_0001_0000.py").is_file());
        assert!(outdir.join("human_eval_0001_0001.py").is_file());
        assert!(
            outdir
                .join("logs")
                .join("human_eval_0001_0001")
                .join("report.json")
                .is_file()
        );
    }
}
