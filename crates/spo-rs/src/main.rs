//! Optimize a prompt template from the command line.
//!
//! Reads the API key from the LLM config file, or from the `SPO_API_KEY` /
//! `OPENROUTER_KEY` environment variables.
//!
//! # Examples
//!
//! ```sh
//! # Ten rounds on settings/Poem.yaml, artifacts in workspace/Poem/prompts
//! spo --template Poem.yaml --name Poem
//!
//! # Resume at round 6 with a different judge
//! spo --name Poem --initial-round 6 --max-rounds 5 --eval-model openai/gpt-4o
//!
//! # Run the template prompt once without optimizing
//! spo --template Poem.yaml --mode test
//! ```

use clap::{Parser, ValueEnum};
use spo_rs::config::{LlmConfig, SpoConfig};
use spo_rs::llm::{ModelSettings, RoleModels};
use spo_rs::optimizer::{LoggingHandler, OptimizationSummary, PromptOptimizer};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Rewrite, execute, and judge for `--max-rounds` rounds
    Optimize,
    /// Execute the template prompt once, no rewriting
    Test,
}

/// Self-supervised prompt optimization.
#[derive(Parser)]
#[command(name = "spo", version)]
struct Cli {
    // ── Models ─────────────────────────────────────────────────
    /// Model that rewrites prompts
    #[arg(long, default_value = "anthropic/claude-3.5-sonnet")]
    opt_model: String,

    /// Temperature for the optimize model
    #[arg(long, default_value_t = 0.7)]
    opt_temp: f32,

    /// Model that judges answer sets
    #[arg(long, default_value = "openai/gpt-4o-mini")]
    eval_model: String,

    /// Temperature for the evaluate model
    #[arg(long, default_value_t = 0.3)]
    eval_temp: f32,

    /// Model that answers questions with a candidate prompt
    #[arg(long, default_value = "openai/gpt-4o-mini")]
    exec_model: String,

    /// Temperature for the execute model
    #[arg(long, default_value_t = 0.0)]
    exec_temp: f32,

    // ── Project ────────────────────────────────────────────────
    /// Root directory for project artifacts
    #[arg(long, default_value = "workspace")]
    workspace: PathBuf,

    /// Project name (subdirectory of the workspace)
    #[arg(long, default_value = "Poem")]
    name: String,

    /// Template file name (resolved under --settings-dir) or path
    #[arg(long, default_value = "Poem.yaml")]
    template: String,

    /// Directory holding template files
    #[arg(long, default_value = "settings")]
    settings_dir: PathBuf,

    // ── Loop ───────────────────────────────────────────────────
    /// First round to run
    #[arg(long, default_value_t = 1)]
    initial_round: u32,

    /// Number of rounds to run
    #[arg(long, default_value_t = 10)]
    max_rounds: u32,

    /// Optimize, or test the template prompt once
    #[arg(long, value_enum, default_value_t = Mode::Optimize)]
    mode: Mode,

    /// Seed for question sampling and judge ordering
    #[arg(long)]
    seed: Option<u64>,

    /// Retries per LLM call on transient errors
    #[arg(long, default_value_t = 3)]
    retries: u32,

    // ── Endpoint ───────────────────────────────────────────────
    /// YAML file with base_url, api_key, and per-model overrides
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn spo_config(&self) -> SpoConfig {
        let models = RoleModels {
            optimize: ModelSettings::new(&self.opt_model, self.opt_temp),
            evaluate: ModelSettings::new(&self.eval_model, self.eval_temp),
            execute: ModelSettings::new(&self.exec_model, self.exec_temp),
        };
        let config = SpoConfig::default()
            .with_workspace(&self.workspace)
            .with_name(&self.name)
            .with_template(&self.template)
            .with_settings_dir(&self.settings_dir)
            .with_initial_round(self.initial_round)
            .with_max_rounds(self.max_rounds)
            .with_iterate(self.mode == Mode::Optimize)
            .with_retries(self.retries)
            .with_models(models);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }

    fn llm_config(&self) -> Result<LlmConfig, String> {
        let config = match &self.config {
            Some(path) => LlmConfig::load(path)?,
            None => LlmConfig::default(),
        };
        Ok(config.with_env_fallback())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn run(cli: &Cli) -> Result<OptimizationSummary, String> {
    let config = cli.spo_config();
    let llm = cli
        .llm_config()?
        .build_llm(config.models.clone(), config.retry.clone())?;

    PromptOptimizer::new(&llm, config)?
        .with_event_handler(&LoggingHandler)
        .optimize()
        .await
}

fn print_summary(summary: &OptimizationSummary, cli: &Cli) {
    let total = summary.costs.total();
    println!("Rounds run: {}", summary.rounds_run);
    match summary.best_round {
        Some(round) => {
            println!("Best round: {round}");
            println!("Prompt:\n{}", summary.best_prompt);
        }
        None => println!("No successful round recorded."),
    }
    println!("Usage: {}", total.summary());
    println!(
        "Artifacts: {}",
        cli.workspace.join(&cli.name).join("prompts").display()
    );
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(summary) => print_summary(&summary, &cli),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
