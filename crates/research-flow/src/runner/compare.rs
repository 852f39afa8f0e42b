//! One query under several strategies at once

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::config::RunnerConfig;
use super::metrics::AutonomyWeights;
use super::multiplex::{Multiplexer, StreamEvent};
use super::supervise;
use crate::context::AgentContext;
use crate::error::{Result, WorkflowError};
use crate::research::{ChannelSink, ModelSelection, ResearchResult, WorkflowConfig};

/// Named model selection plus thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    pub models: ModelSelection,
    pub config: WorkflowConfig,
}

impl Strategy {
    pub fn new(name: impl Into<String>, models: ModelSelection, config: WorkflowConfig) -> Self {
        Self {
            name: name.into(),
            models,
            config,
        }
    }

    /// Parse `name=planner:analyzer:refiner:summarizer`
    ///
    /// A single model after `=` is used for every role.
    pub fn parse(raw: &str, config: WorkflowConfig) -> Result<Self> {
        let (name, models) = raw
            .split_once('=')
            .ok_or_else(|| WorkflowError::config(format!("strategy '{}' is not name=models", raw)))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkflowError::config(format!("strategy '{}' has no name", raw)));
        }

        let parts: Vec<&str> = models.split(':').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(WorkflowError::config(format!("strategy '{}' has an empty model", raw)));
        }
        let models = match parts.as_slice() {
            [model] => ModelSelection::uniform(*model),
            [planner, analyzer, refiner, summarizer] => ModelSelection::uniform(*planner)
                .with_analyzer(*analyzer)
                .with_refiner(*refiner)
                .with_summarizer(*summarizer),
            _ => {
                return Err(WorkflowError::config(format!(
                    "strategy '{}' needs 1 or 4 models, got {}",
                    raw,
                    parts.len()
                )))
            }
        };
        Ok(Self::new(name, models, config))
    }
}

/// Terminal result of one strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub strategy: String,
    pub result: std::result::Result<ResearchResult, String>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// Single-run autonomy score, absent for failed runs
    pub autonomy_score: Option<f64>,
}

/// Which strategy won each criterion; `None` when every run failed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub completed: usize,
    pub failed: usize,
    /// Completed first
    pub best_completion: Option<String>,
    pub best_confidence: Option<String>,
    /// Fewest phases visited
    pub most_efficient: Option<String>,
    pub fewest_tokens: Option<String>,
    pub most_autonomous: Option<String>,
}

fn best_by<K: PartialOrd>(
    outcomes: &[StrategyOutcome],
    key: impl Fn(&StrategyOutcome, &ResearchResult) -> K,
    prefer_larger: bool,
) -> Option<String> {
    let mut best: Option<(&StrategyOutcome, K)> = None;
    for outcome in outcomes {
        let Ok(result) = &outcome.result else { continue };
        let k = key(outcome, result);
        let better = match &best {
            None => true,
            Some((_, current)) if prefer_larger => k > *current,
            Some((_, current)) => k < *current,
        };
        if better {
            best = Some((outcome, k));
        }
    }
    best.map(|(o, _)| o.strategy.clone())
}

impl ComparisonSummary {
    pub fn from_outcomes(outcomes: &[StrategyOutcome]) -> Self {
        let completed = outcomes.iter().filter(|o| o.result.is_ok()).count();
        Self {
            completed,
            failed: outcomes.len() - completed,
            best_completion: best_by(outcomes, |o, _| o.elapsed, false),
            best_confidence: best_by(outcomes, |_, r| r.confidence, true),
            most_efficient: best_by(outcomes, |_, r| r.phases_visited.len(), false),
            fewest_tokens: best_by(outcomes, |_, r| r.total_tokens, false),
            most_autonomous: best_by(outcomes, |o, _| o.autonomy_score.unwrap_or(0.0), true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub query: String,
    pub outcomes: Vec<StrategyOutcome>,
    pub summary: ComparisonSummary,
}

/// Runs one query under every strategy concurrently
///
/// Every strategy gets its own orchestrator and sink; all share the context's
/// corpus and index and one oracle call limit.
pub struct StrategyComparison {
    context: AgentContext,
    config: RunnerConfig,
    strategies: Vec<Strategy>,
    weights: AutonomyWeights,
}

impl StrategyComparison {
    pub fn new(context: AgentContext, config: RunnerConfig) -> Self {
        Self {
            context,
            config,
            strategies: Vec::new(),
            weights: AutonomyWeights::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with_strategies(mut self, strategies: impl IntoIterator<Item = Strategy>) -> Self {
        self.strategies.extend(strategies);
        self
    }

    pub fn with_weights(mut self, weights: AutonomyWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Run every strategy, passing each multiplexed event to `on_event` as it
    /// arrives, and return once all runs have finished
    pub async fn run(&self, query: &str, mut on_event: impl FnMut(&StreamEvent)) -> Result<ComparisonReport> {
        self.config.validate()?;
        if self.strategies.is_empty() {
            return Err(WorkflowError::config("comparison needs at least one strategy"));
        }
        let mut names: Vec<&str> = self.strategies.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(WorkflowError::config("strategy names must be unique"));
        }

        let shared = self.context.clone().with_call_limit(self.config.max_concurrent_calls);
        let mut orchestrators = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let orchestrator = shared.orchestrator_with(strategy.models.clone(), strategy.config.clone())?;
            orchestrators.push((strategy.name.clone(), orchestrator));
        }

        info!(query = %query, strategies = orchestrators.len(), "Starting strategy comparison");

        let mut mux = Multiplexer::new(self.config.heartbeat_interval, self.config.event_buffer);
        let terminals = mux.terminal_sender();
        let mut handles = Vec::with_capacity(orchestrators.len());

        for (name, orchestrator) in orchestrators {
            let (sink, events) = ChannelSink::channel();
            mux.add(name.clone(), events);

            let terminals = terminals.clone();
            let query = query.to_string();
            let budget = self.config.run_timeout;
            let weights = self.weights;
            let strategy = name.clone();

            let handle = tokio::spawn(async move {
                let started = Instant::now();
                let result = supervise(orchestrator, query, Arc::new(sink), budget).await;
                let elapsed = started.elapsed();

                let terminal = match &result {
                    Ok(r) => StreamEvent::complete(strategy.clone(), r.clone()),
                    Err(e) => StreamEvent::error(strategy.clone(), e.to_string()),
                };
                if terminals.send(terminal).is_err() {
                    debug!(strategy = %strategy, "Terminal event receiver dropped");
                }

                let autonomy_score = result.as_ref().ok().map(|r| weights.score_run(r));
                StrategyOutcome {
                    strategy,
                    result: result.map_err(|e| e.to_string()),
                    elapsed,
                    autonomy_score,
                }
            });
            handles.push((name, handle));
        }
        drop(terminals);

        let (mut events, aggregator) = mux.spawn();
        while let Some(event) = events.recv().await {
            on_event(&event);
        }
        if let Err(e) = aggregator.await {
            error!(error = %e, "Event multiplexer failed");
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(strategy = %name, error = %e, "Strategy task failed");
                    StrategyOutcome {
                        strategy: name,
                        result: Err(WorkflowError::task_failed(e.to_string()).to_string()),
                        elapsed: Duration::ZERO,
                        autonomy_score: None,
                    }
                }
            };
            outcomes.push(outcome);
        }

        let summary = ComparisonSummary::from_outcomes(&outcomes);
        info!(
            completed = summary.completed,
            failed = summary.failed,
            best_confidence = ?summary.best_confidence,
            "Strategy comparison complete"
        );

        Ok(ComparisonReport {
            query: query.to_string(),
            outcomes,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_four_models() {
        let s = Strategy::parse("mixed=a:b:c:d", WorkflowConfig::default()).unwrap();
        assert_eq!(s.name, "mixed");
        assert_eq!(s.models.planner, "a");
        assert_eq!(s.models.analyzer, "b");
        assert_eq!(s.models.refiner, "c");
        assert_eq!(s.models.summarizer, "d");
    }

    #[test]
    fn test_parse_single_model() {
        let s = Strategy::parse("fast = grok-3-mini", WorkflowConfig::default()).unwrap();
        assert_eq!(s.name, "fast");
        assert_eq!(s.models, ModelSelection::uniform("grok-3-mini"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["nomodels", "=a", "x=a:b", "x=a::c:d"] {
            assert!(Strategy::parse(bad, WorkflowConfig::default()).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_summary_with_all_failures() {
        let outcomes = vec![StrategyOutcome {
            strategy: "a".into(),
            result: Err("timeout".into()),
            elapsed: Duration::from_secs(1),
            autonomy_score: None,
        }];
        let summary = ComparisonSummary::from_outcomes(&outcomes);
        assert_eq!(summary.failed, 1);
        assert!(summary.best_confidence.is_none());
        assert!(summary.best_completion.is_none());
    }
}
