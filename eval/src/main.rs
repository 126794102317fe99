mod aggregate;
mod problems;
mod report;
mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use redgreen::core::task::resolve_model;
use redgreen::exit_codes;
use redgreen::io::checks::CommandCheckRunner;
use redgreen::io::config::{CONFIG_FILE, load_config};
use redgreen::io::llm::OpenAiLlm;
use redgreen::io::sandbox::ProcessSandbox;

use crate::aggregate::{aggregate, collect_samples};
use crate::problems::load_problems;
use crate::report::{RESULTS_FILE, build_results, file_sha256, score_samples, write_results};
use crate::run::{RunPlan, run_problems};

#[derive(Parser)]
#[command(name = "eval", version, about = "HumanEval harness for redgreen")]
struct Cli {
    /// redgreen config used for every sample.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,
    /// Directory for sample files, logs and results.
    #[arg(long, global = true, default_value = "human_eval")]
    outdir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate samples for a JSONL problem file. Costs money: every sample
    /// is a full Stub/Red/Green cycle against the model.
    Run {
        problems: PathBuf,
        #[arg(long, default_value = "tdd")]
        agent: String,
        #[arg(long, default_value_t = 1)]
        samples: usize,
        /// Problem index to resume from.
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Sample index to resume from within the `--start` problem.
        #[arg(long, default_value_t = 0)]
        start_sample: usize,
    },
    /// Write `human_eval_samples.jsonl` and `human_eval_problems.jsonl`.
    Aggregate { problems: PathBuf },
    /// Aggregate, run hidden tests and print pass rates.
    Report { problems: PathBuf },
}

const LOG_FILTER: &str = "warn,eval=info,redgreen=info";

fn main() {
    redgreen::logging::init(LOG_FILTER);
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(exit_codes::INVALID);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            problems,
            agent,
            samples,
            start,
            start_sample,
        } => {
            let plan = RunPlan {
                agent,
                outdir: cli.outdir,
                samples_per_problem: samples,
                start_problem: start,
                start_sample,
            };
            cmd_run(&cli.config, &problems, &plan)
        }
        Command::Aggregate { problems } => {
            let problems = load_problems(&problems)?;
            let summary = aggregate(&cli.outdir, &problems)?;
            println!(
                "aggregate: samples={} problems={} outdir={}",
                summary.samples,
                summary.problems,
                cli.outdir.display()
            );
            Ok(())
        }
        Command::Report { problems } => cmd_report(&cli.config, &cli.outdir, &problems),
    }
}

fn cmd_run(config_path: &Path, problems_path: &Path, plan: &RunPlan) -> Result<()> {
    let config = load_config(config_path)?;
    let problems = load_problems(problems_path)?;
    let model = resolve_model(&plan.agent, &config.llm.model)?;
    let api_key = std::env::var(&config.llm.api_key_env)
        .with_context(|| format!("read API key from ${}", config.llm.api_key_env))?;
    let llm = OpenAiLlm::new(&config.llm, model, api_key);
    let sandbox = ProcessSandbox::new(&config.sandbox);

    eprintln!(
        "generating {} samples for {} problems into {}; every sample is billed by the model provider",
        plan.samples_per_problem,
        problems.len(),
        plan.outdir.display()
    );
    let summary = run_problems(&llm, &sandbox, &CommandCheckRunner, &config, &problems, plan)?;
    println!(
        "run: generated={} passed={} skipped={}",
        summary.generated, summary.passed, summary.skipped
    );
    Ok(())
}

fn cmd_report(config_path: &Path, outdir: &Path, problems_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let problems = load_problems(problems_path)?;
    aggregate(outdir, &problems)?;

    let samples = collect_samples(outdir, &problems)?;
    let sandbox = ProcessSandbox::new(&config.sandbox);
    let (scores, usage) = score_samples(&sandbox, outdir, &problems, &samples)?;
    let results = build_results(scores, usage, file_sha256(problems_path).ok());
    write_results(&outdir.join(RESULTS_FILE), &results)?;

    println!(
        "report: samples={} passed={} self_tests_passed={}",
        results.samples, results.passed, results.self_tests_passed
    );
    for (k, rate) in &results.pass_at_k {
        println!("report: {k}={rate:.4}");
    }
    println!(
        "report: model_calls={} cost={:.4}",
        results.usage.total_calls(),
        results.usage.total_cost()
    );
    Ok(())
}
