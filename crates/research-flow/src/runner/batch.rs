//! Batch evaluation over many queries

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info};

use super::config::RunnerConfig;
use super::metrics::{AutonomyWeights, EvaluationMetrics};
use super::supervise;
use crate::context::AgentContext;
use crate::error::{Result, WorkflowError};
use crate::research::{NullSink, ProgressSink, ResearchOrchestrator, ResearchResult};

/// How queries are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BatchMode {
    /// One at a time with a pause between runs
    Sequential {
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },
    /// Up to `workers` runs at once
    Parallel { workers: usize },
}

impl BatchMode {
    pub fn sequential(config: &RunnerConfig) -> Self {
        Self::Sequential {
            delay: config.sequential_delay,
        }
    }

    pub fn parallel(config: &RunnerConfig) -> Self {
        Self::Parallel {
            workers: config.workers,
        }
    }
}

/// One entry of a queries file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchQuery {
    pub id: String,
    pub query: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub complexity: Option<String>,
}

impl BatchQuery {
    pub fn new(id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
            category: None,
            complexity: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_complexity(mut self, complexity: impl Into<String>) -> Self {
        self.complexity = Some(complexity.into());
        self
    }
}

/// Result of one query, successful or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub query_id: String,
    pub query: String,
    pub category: Option<String>,
    pub complexity: Option<String>,
    pub result: std::result::Result<ResearchResult, String>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

impl TaskOutcome {
    pub fn new(query: BatchQuery, result: std::result::Result<ResearchResult, String>, elapsed: Duration) -> Self {
        Self {
            query_id: query.id,
            query: query.query,
            category: query.category,
            complexity: query.complexity,
            result,
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }
}

/// Outcomes in input order plus aggregate metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub mode: BatchMode,
    pub outcomes: Vec<TaskOutcome>,
    pub metrics: EvaluationMetrics,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

/// Runs a list of queries through independent orchestrator runs
pub struct BatchRunner {
    context: AgentContext,
    config: RunnerConfig,
    mode: BatchMode,
    sink: Arc<dyn ProgressSink>,
    weights: AutonomyWeights,
}

impl BatchRunner {
    /// Parallel with `config.workers` by default
    pub fn new(context: AgentContext, config: RunnerConfig) -> Self {
        let mode = BatchMode::parallel(&config);
        Self {
            context,
            config,
            mode,
            sink: Arc::new(NullSink),
            weights: AutonomyWeights::default(),
        }
    }

    pub fn with_mode(mut self, mode: BatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sink receiving the events of every run
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_weights(mut self, weights: AutonomyWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    /// Run every query; fails only on invalid configuration
    pub async fn run(&self, queries: Vec<BatchQuery>) -> Result<BatchReport> {
        self.config.validate()?;
        if let BatchMode::Parallel { workers: 0 } = self.mode {
            return Err(WorkflowError::config("parallel mode needs at least one worker"));
        }
        let orchestrator = self
            .context
            .clone()
            .with_call_limit(self.config.max_concurrent_calls)
            .orchestrator()?;

        let started = Instant::now();
        info!(queries = queries.len(), mode = ?self.mode, "Starting batch");

        let outcomes = match self.mode {
            BatchMode::Sequential { delay } => self.run_sequential(orchestrator, queries, delay).await,
            BatchMode::Parallel { workers } => self.run_parallel(orchestrator, queries, workers).await,
        };

        let metrics = EvaluationMetrics::from_outcomes(&outcomes, &self.weights);
        info!(
            completed = metrics.completed,
            failed = metrics.failed,
            autonomy = metrics.autonomy_score,
            "Batch complete"
        );

        Ok(BatchReport {
            mode: self.mode,
            outcomes,
            metrics,
            elapsed: started.elapsed(),
        })
    }

    async fn run_sequential(
        &self,
        orchestrator: ResearchOrchestrator,
        queries: Vec<BatchQuery>,
        delay: Duration,
    ) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::with_capacity(queries.len());
        for (i, query) in queries.into_iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            info!(index = i, query_id = %query.id, "Running query");
            let started = Instant::now();
            let result = supervise(
                orchestrator.clone(),
                query.query.clone(),
                self.sink.clone(),
                self.config.run_timeout,
            )
            .await;
            outcomes.push(TaskOutcome::new(query, result.map_err(|e| e.to_string()), started.elapsed()));
        }
        outcomes
    }

    async fn run_parallel(
        &self,
        orchestrator: ResearchOrchestrator,
        queries: Vec<BatchQuery>,
        workers: usize,
    ) -> Vec<TaskOutcome> {
        let semaphore = Arc::new(Semaphore::new(workers));
        let collected = Arc::new(Mutex::new(Vec::with_capacity(queries.len())));
        let budget = self.config.run_timeout;

        let mut handles = Vec::with_capacity(queries.len());
        for (index, query) in queries.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let collected = Arc::clone(&collected);
            let orchestrator = orchestrator.clone();
            let sink = self.sink.clone();

            handles.push(tokio::spawn(async move {
                let started = Instant::now();
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => supervise(orchestrator, query.query.clone(), sink, budget).await,
                    Err(e) => Err(WorkflowError::task_failed(format!("worker pool closed: {}", e))),
                };
                let outcome = TaskOutcome::new(query, result.map_err(|e| e.to_string()), started.elapsed());
                collected.lock().await.push((index, outcome));
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Batch worker failed");
            }
        }

        let mut collected = std::mem::take(&mut *collected.lock().await);
        collected.sort_by_key(|(index, _)| *index);

        // a worker that died before recording still gets an entry
        let mut recorded = collected.into_iter().peekable();
        let mut outcomes = Vec::with_capacity(queries.len());
        for (index, query) in queries.into_iter().enumerate() {
            match recorded.next_if(|(i, _)| *i == index) {
                Some((_, outcome)) => outcomes.push(outcome),
                None => outcomes.push(TaskOutcome::new(
                    query,
                    Err("worker exited without a result".to_string()),
                    Duration::ZERO,
                )),
            }
        }
        outcomes
    }
}
