//! # Agent Module
//!
//! Wires the research-flow engine to the command line: loads the corpus,
//! builds the HTTP oracle and drives single runs, batches and strategy
//! comparisons, printing progress as it arrives.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use research_flow::runner::Strategy;
use research_flow::{
    AgentContext, BatchMode, BatchQuery, BatchReport, BatchRunner, ChannelSink, ComparisonReport, Corpus,
    HttpOracle, HttpOracleConfig, ProgressEvent, ResearchResult, RunnerConfig, StrategyComparison, TracingSink,
};

use crate::config::Config;

// =============================================================================
// QUERIES FILE
// =============================================================================
/// `{"queries": [{"id", "query", "category"?, "complexity"?}, ...]}`
#[derive(Debug, Deserialize)]
struct QueriesFile {
    queries: Vec<BatchQuery>,
}

/// Load the queries of a batch file
pub fn load_queries(path: &Path) -> Result<Vec<BatchQuery>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read queries file {}", path.display()))?;
    let file: QueriesFile = serde_json::from_str(&raw)
        .with_context(|| format!("Queries file {} is not valid JSON", path.display()))?;

    if file.queries.is_empty() {
        anyhow::bail!("Queries file {} contains no queries", path.display());
    }
    Ok(file.queries)
}

// =============================================================================
// RESEARCH AGENT
// =============================================================================
/// Everything a command needs: the shared context plus the loaded config
pub struct ResearchAgent {
    context: AgentContext,
    config: Config,
}

impl ResearchAgent {
    /// Load the corpus and connect the oracle.
    ///
    /// Fails before any run starts when the corpus is unreadable or the
    /// oracle cannot be configured.
    pub fn new(config: Config) -> Result<Self> {
        let corpus = Corpus::from_json_file(&config.data_file)
            .with_context(|| format!("Failed to load corpus from {}", config.data_file.display()))?;

        let oracle = HttpOracle::new(HttpOracleConfig::new(config.api_key.clone()).with_api_base(config.api_base.clone()))
            .context("Failed to configure the reasoning oracle")?;

        info!(
            documents = corpus.len(),
            api_base = %config.api_base,
            default_models = config.uses_default_models(),
            "Research agent ready"
        );

        let context = AgentContext::new(corpus, Arc::new(oracle))
            .with_models(config.models.clone())
            .with_config(config.workflow());

        Ok(Self { context, config })
    }

    /// One research run with live progress on stderr
    pub async fn research(&self, query: &str, fast: bool) -> Result<ResearchResult> {
        let workflow = self.config.workflow().with_fast_mode(self.config.fast_mode || fast);
        let orchestrator = self.context.orchestrator_with(self.config.models.clone(), workflow)?;

        let (sink, mut events) = ChannelSink::channel();
        let printer = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                print_progress(&event);
            }
        });

        let result = orchestrator.run(query, &sink).await;
        drop(sink);
        printer.await.context("Progress printer failed")?;

        Ok(result)
    }

    /// Run every query of a batch file
    pub async fn batch(&self, path: &Path, mode: BatchMode) -> Result<BatchReport> {
        let queries = load_queries(path)?;
        info!(queries = queries.len(), file = %path.display(), "Loaded batch");

        let runner_config = RunnerConfig::default().with_workers(self.config.max_workers);
        let report = BatchRunner::new(self.context.clone(), runner_config)
            .with_mode(mode)
            .with_sink(Arc::new(TracingSink::labeled("batch")))
            .run(queries)
            .await?;

        Ok(report)
    }

    /// Run one query under each `name=models` strategy at once.
    ///
    /// Every multiplexed stream event is printed to stdout as a JSON line as
    /// it arrives.
    pub async fn compare(&self, query: &str, strategies: &[String]) -> Result<ComparisonReport> {
        let strategies = strategies
            .iter()
            .map(|raw| Strategy::parse(raw, self.config.workflow()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Invalid --strategy")?;
        debug!(strategies = strategies.len(), "Parsed strategies");

        let comparison = StrategyComparison::new(self.context.clone(), RunnerConfig::default()).with_strategies(strategies);

        let report = comparison
            .run(query, |event| println!("{}", event.to_json()))
            .await?;

        Ok(report)
    }
}

// =============================================================================
// OUTPUT
// =============================================================================
fn print_progress(event: &ProgressEvent) {
    eprintln!("  {:<12} {}", event.phase.as_str(), event.summary);
}

fn rule() -> String {
    "=".repeat(60)
}

/// Human readable report of one run
pub fn print_result(result: &ResearchResult) {
    println!("\n{}", rule());
    println!("RESEARCH RESULTS");
    println!("{}\n", rule());
    println!("{}", result.final_summary);
    println!("\n{}", rule());

    let phases: Vec<&str> = result.phases_visited.iter().map(|s| s.as_str()).collect();
    println!("Query:        {}", result.query);
    println!("Confidence:   {:.2}", result.confidence);
    println!("Documents:    {}", result.results_count);
    println!("Replans:      {}", result.replan_count);
    println!("Refinements:  {}", result.refinement_iterations);
    println!("Critique:     {}", if result.critique_passed() { "passed" } else { "failed" });
    println!("Tokens:       {}", result.total_tokens);
    println!("Duration:     {} ms", result.duration_ms);
    println!("Phases:       {}", phases.join(" -> "));
}

/// Per-query lines followed by the metrics as JSON
pub fn print_batch(report: &BatchReport) -> Result<()> {
    println!("\n{}", rule());
    println!("BATCH RESULTS ({})", humantime::format_duration(report.elapsed));
    println!("{}\n", rule());

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(result) => println!(
                "{:<8} ok    confidence {:.2}  phases {:>2}  {}",
                outcome.query_id,
                result.confidence,
                result.phases_visited.len(),
                outcome.query
            ),
            Err(message) => println!("{:<8} error {}  {}", outcome.query_id, message, outcome.query),
        }
    }

    println!("\n{}", serde_json::to_string_pretty(&report.metrics)?);
    Ok(())
}

/// Winners per criterion and one line per strategy
pub fn print_comparison(report: &ComparisonReport) -> Result<()> {
    println!("\n{}", rule());
    println!("STRATEGY COMPARISON");
    println!("{}\n", rule());

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(result) => println!(
                "{:<12} confidence {:.2}  phases {:>2}  tokens {:>6}  autonomy {:.2}  {}",
                outcome.strategy,
                result.confidence,
                result.phases_visited.len(),
                result.total_tokens,
                outcome.autonomy_score.unwrap_or_default(),
                humantime::format_duration(outcome.elapsed)
            ),
            Err(message) => println!("{:<12} error {}", outcome.strategy, message),
        }
    }

    println!("\n{}", serde_json::to_string_pretty(&report.summary)?);
    Ok(())
}
