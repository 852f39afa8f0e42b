//! # Research Agent
//!
//! Command-line front end for the research-flow engine: a confidence-gated
//! research workflow over a corpus of social posts, driven by an
//! OpenAI-compatible reasoning oracle.
//!
//! ## Quick Start
//! ```bash
//! export ORACLE_API_KEY=...
//! cargo run -- query "What do developers think of async Rust?"
//! cargo run -- batch queries.json --parallel --workers 3
//! cargo run -- compare "Rust vs Go sentiment" --strategy fast=grok-3-mini --strategy deep=grok-4
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================
/// Environment configuration
mod config;

/// Command implementations and output
mod agent;

// =============================================================================
// IMPORTS
// =============================================================================
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use research_flow::{BatchMode, RunnerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::agent::ResearchAgent;
use crate::config::Config;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "research-agent",
    version,
    about = "Plan, retrieve, analyze, critique and summarize research questions over a post corpus",
    long_about = r#"
Research Agent - a self-correcting research workflow.

Every query walks a fixed state machine: plan, retrieve, validate, analyze,
evaluate, refine, critique and summarize. The workflow replans when results
are irrelevant, refines while confidence keeps improving and revises its
summary when the critique finds unsupported claims.

CONFIGURATION (environment or .env):
  ORACLE_API_KEY / GROK_API_KEY   API key (required)
  ORACLE_BASE_URL                 OpenAI-compatible endpoint
  PLANNER_MODEL, ANALYZER_MODEL, REFINER_MODEL, SUMMARIZER_MODEL
  MAX_ITERATIONS, MAX_REPLANS, FAST_MODE, DATA_FILE, MAX_WORKERS

EXAMPLES:
  research-agent query "What do developers think of async Rust?"
  research-agent query --fast --json "Tokio sentiment"
  research-agent batch queries.json --parallel --workers 4
  research-agent compare "Rust adoption" --strategy fast=grok-3-mini --strategy split=a:b:c:d
"#
)]
struct Cli {
    /// Corpus file (JSON array of posts)
    #[arg(short = 'd', long = "data", env = "DATA_FILE", global = true, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research a single question
    Query {
        #[arg(value_name = "TEXT")]
        query: String,

        /// Skip the evaluate and critique phases
        #[arg(long)]
        fast: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run every query of a `{"queries": [...]}` file and report metrics
    Batch {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Run queries concurrently instead of one at a time
        #[arg(long)]
        parallel: bool,

        /// Worker pool size in parallel mode (defaults to MAX_WORKERS)
        #[arg(short = 'w', long, value_name = "N")]
        workers: Option<usize>,

        /// Pause between sequential runs, e.g. "1s" or "500ms"
        #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
        delay: Option<Duration>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one question under several model strategies at once
    Compare {
        #[arg(value_name = "TEXT")]
        query: String,

        /// `name=model` or `name=planner:analyzer:refiner:summarizer`
        #[arg(short = 's', long = "strategy", value_name = "NAME=MODELS", required = true)]
        strategies: Vec<String>,

        /// Print the final report as one JSON line instead of a table
        #[arg(long)]
        json: bool,
    },
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads env-backed arguments
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let mut config = Config::from_env()?;
    if let Some(data) = cli.data {
        config.data_file = data;
    }
    if let Command::Batch { workers: Some(workers), .. } = &cli.command {
        config.max_workers = *workers;
    }
    config.validate()?;

    info!(
        data = %config.data_file.display(),
        planner = %config.models.planner,
        max_iterations = config.max_iterations,
        max_replans = config.max_replans,
        "Configuration loaded"
    );

    let agent = ResearchAgent::new(config.clone())?;

    let outcome = run(&agent, &config, cli.command).await;
    if let Err(e) = &outcome {
        error!(error = %e, "Command failed");
    }
    outcome
}

async fn run(agent: &ResearchAgent, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Query { query, fast, json } => {
            let result = agent.research(&query, fast).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                agent::print_result(&result);
            }
        }
        Command::Batch {
            file,
            parallel,
            delay,
            json,
            ..
        } => {
            let mode = if parallel {
                BatchMode::Parallel {
                    workers: config.max_workers,
                }
            } else {
                BatchMode::Sequential {
                    delay: delay.unwrap_or(RunnerConfig::default().sequential_delay),
                }
            };
            let report = agent.batch(&file, mode).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                agent::print_batch(&report)?;
            }
        }
        Command::Compare { query, strategies, json } => {
            let report = agent.compare(&query, &strategies).await?;
            if json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                agent::print_comparison(&report)?;
            }
        }
    }

    info!("Done");
    Ok(())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Install the tracing subscriber; logs go to stderr so stdout stays clean
/// for reports and JSON.
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))
}
