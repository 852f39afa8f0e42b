//! Bounded concurrent execution of many research runs
//!
//! - [`BatchRunner`]: many queries, sequential or with a worker pool
//! - [`StrategyComparison`]: one query under several model/config strategies
//! - [`Multiplexer`]: fan-in of per-run progress events with heartbeats
//! - [`EvaluationMetrics`]: aggregate rates and the autonomy score
//!
//! Each run owns its state; only the corpus, index and oracle are shared.
//! A failing, panicking or timed-out run becomes an error entry for that task
//! and never affects its siblings.

pub mod batch;
pub mod compare;
pub mod config;
pub mod metrics;
pub mod multiplex;

pub use batch::{BatchMode, BatchQuery, BatchReport, BatchRunner, TaskOutcome};
pub use compare::{ComparisonReport, ComparisonSummary, Strategy, StrategyComparison, StrategyOutcome};
pub use config::RunnerConfig;
pub use metrics::{AutonomyWeights, ConfidenceDistribution, EvaluationMetrics, GroupMetrics};
pub use multiplex::{Multiplexer, StreamEvent};

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::error;

use crate::error::WorkflowError;
use crate::research::{ProgressSink, ResearchOrchestrator, ResearchResult};

/// Run one query on its own task, joined with a wall-clock budget
///
/// A panic surfaces as `TaskFailed`; an overrun aborts the task and surfaces
/// as `Timeout`.
pub(crate) async fn supervise(
    orchestrator: ResearchOrchestrator,
    query: String,
    sink: Arc<dyn ProgressSink>,
    budget: Duration,
) -> Result<ResearchResult, WorkflowError> {
    let label = query.clone();
    let mut handle = tokio::spawn(async move { orchestrator.run(&query, sink.as_ref()).await });

    let outcome = match timeout(budget, &mut handle).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(join_error)) => Err(WorkflowError::task_failed(join_error.to_string())),
        Err(_) => {
            handle.abort();
            Err(WorkflowError::Timeout(budget))
        }
    };

    if let Err(e) = &outcome {
        error!(query = %label, error = %e, "Research run failed");
    }
    outcome
}
