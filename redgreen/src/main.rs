//! Test-driven code generation CLI.
//!
//! Runs one task through Stub → Red → Green and writes the generated module,
//! its tests, model transcripts and a JSON report.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use redgreen::core::signatures::extract_signatures;
use redgreen::core::task::{Task, resolve_model};
use redgreen::exit_codes;
use redgreen::io::checks::CommandCheckRunner;
use redgreen::io::config::{CONFIG_FILE, RedgreenConfig, load_config, write_config};
use redgreen::io::llm::OpenAiLlm;
use redgreen::io::sandbox::ProcessSandbox;
use redgreen::pipeline::run_task;

#[derive(Parser)]
#[command(
    name = "redgreen",
    version,
    about = "Test-driven code generation with a language model"
)]
struct Cli {
    /// Config file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Generate a stub, a failing test and an implementation for one task.
    Run {
        /// Task name; transcripts go to `<log_dir>/<name>/`.
        #[arg(long)]
        name: String,
        /// Target file, relative to the output directory.
        #[arg(long)]
        file: PathBuf,
        /// What the code should do.
        #[arg(long)]
        prompt: String,
        /// Agent identifier: `tdd`, `tdd3`, `tdd4`, `tdd-chat` or `tdd-<model>`.
        #[arg(long, default_value = "tdd")]
        agent: String,
        /// Override the configured output directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the function signatures of a Python file as JSON.
    Signatures { file: PathBuf },
}

fn main() {
    redgreen::logging::init(redgreen::logging::DEFAULT_FILTER);
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Run {
            name,
            file,
            prompt,
            agent,
            output_dir,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            let task = Task::new(name, prompt, file).with_agent(agent);
            cmd_run(&config, &task)
        }
        Command::Signatures { file } => cmd_signatures(&file),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &RedgreenConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(config: &RedgreenConfig, task: &Task) -> Result<i32> {
    let model = resolve_model(&task.agent, &config.llm.model)?;
    let api_key = std::env::var(&config.llm.api_key_env)
        .with_context(|| format!("read API key from ${}", config.llm.api_key_env))?;
    let llm = OpenAiLlm::new(&config.llm, model, api_key);
    let sandbox = ProcessSandbox::new(&config.sandbox);

    let report = run_task(&llm, &sandbox, &CommandCheckRunner, config, task)?;
    println!("{}", serde_json::to_string_pretty(&report).context("serialize report")?);
    Ok(if report.passed {
        exit_codes::OK
    } else {
        exit_codes::TESTS_FAILED
    })
}

fn cmd_signatures(file: &Path) -> Result<i32> {
    let source = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let signatures = extract_signatures(&source);
    println!(
        "{}",
        serde_json::to_string_pretty(&signatures).context("serialize signatures")?
    );
    Ok(exit_codes::OK)
}
