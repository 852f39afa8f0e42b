//! Batch and comparison runners under an instrumented oracle

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{corpus, CountingOracle, ScriptedOracle};
use research_flow::runner::Strategy;
use research_flow::{
    AgentContext, BatchMode, BatchQuery, BatchRunner, ModelSelection, RunnerConfig, StrategyComparison, StreamEvent,
    WorkflowConfig,
};

fn counting(delay: Duration) -> CountingOracle {
    CountingOracle::new(Arc::new(ScriptedOracle::new()), delay)
}

fn queries(texts: &[&str]) -> Vec<BatchQuery> {
    texts
        .iter()
        .enumerate()
        .map(|(i, q)| BatchQuery::new(format!("q{}", i + 1), *q).with_category("tech"))
        .collect()
}

#[tokio::test]
async fn test_worker_pool_bounds_oracle_calls() {
    let oracle = Arc::new(counting(Duration::from_millis(5)));
    let context = AgentContext::new(corpus(), oracle.clone());
    let config = RunnerConfig::default().with_workers(2).with_max_concurrent_calls(8);

    let report = BatchRunner::new(context, config)
        .run(queries(&["async rust", "tokio", "compile times", "runtimes", "pinning"]))
        .await
        .unwrap();

    assert!(oracle.peak() <= 2, "peak {} exceeds pool size", oracle.peak());
    assert!(oracle.total() > 0);
    assert_eq!(report.metrics.completed, 5);
    assert_eq!(report.mode, BatchMode::Parallel { workers: 2 });
    let ids: Vec<&str> = report.outcomes.iter().map(|o| o.query_id.as_str()).collect();
    assert_eq!(ids, vec!["q1", "q2", "q3", "q4", "q5"]);
}

#[tokio::test]
async fn test_call_limit_bounds_oracle_calls_across_workers() {
    let oracle = Arc::new(counting(Duration::from_millis(5)));
    let context = AgentContext::new(corpus(), oracle.clone());
    let config = RunnerConfig::default().with_workers(5).with_max_concurrent_calls(1);

    let report = BatchRunner::new(context, config)
        .run(queries(&["a", "b", "c", "d", "e"]))
        .await
        .unwrap();

    assert_eq!(oracle.peak(), 1);
    assert_eq!(report.metrics.completed, 5);
}

#[tokio::test]
async fn test_timed_out_run_does_not_affect_siblings() {
    let oracle = Arc::new(counting(Duration::from_millis(1)).slow_on("glacial", Duration::from_secs(5)));
    let context = AgentContext::new(corpus(), oracle);
    let config = RunnerConfig::default()
        .with_workers(2)
        .with_max_concurrent_calls(4)
        .with_run_timeout(Duration::from_millis(300));

    let report = BatchRunner::new(context, config)
        .run(queries(&["glacial topic", "async rust"]))
        .await
        .unwrap();

    let slow = &report.outcomes[0];
    assert!(slow.error().unwrap().contains("timed out"), "{:?}", slow.error());
    assert!(report.outcomes[1].is_success());
    assert_eq!(report.metrics.failed, 1);
    assert!((report.metrics.completion_rate - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_panicking_run_becomes_error_entry() {
    let oracle = Arc::new(counting(Duration::from_millis(1)).panic_on("explode"));
    let context = AgentContext::new(corpus(), oracle);

    let report = BatchRunner::new(context, RunnerConfig::default().with_workers(2).with_max_concurrent_calls(4))
        .run(queries(&["explode please", "async rust", "tokio"]))
        .await
        .unwrap();

    assert!(report.outcomes[0].error().unwrap().contains("Task failed"));
    assert!(report.outcomes[1].is_success());
    assert!(report.outcomes[2].is_success());
}

#[tokio::test]
async fn test_sequential_mode_keeps_order() {
    let oracle = Arc::new(counting(Duration::ZERO));
    let context = AgentContext::new(corpus(), oracle.clone());
    let config = RunnerConfig::default();

    let report = BatchRunner::new(context, config)
        .with_mode(BatchMode::Sequential { delay: Duration::ZERO })
        .run(queries(&["async rust", "tokio"]))
        .await
        .unwrap();

    assert_eq!(oracle.peak(), 1);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[1].query_id, "q2");
    assert_eq!(report.metrics.completion_rate, 1.0);
    assert_eq!(report.metrics.by_category["tech"].completed, 2);
}

#[tokio::test]
async fn test_comparison_tags_events_per_strategy() {
    let oracle = Arc::new(counting(Duration::from_millis(2)));
    let context = AgentContext::new(corpus(), oracle);
    let comparison = StrategyComparison::new(context, RunnerConfig::default())
        .with_strategy(Strategy::new("fast", ModelSelection::uniform("m-fast"), WorkflowConfig::default()))
        .with_strategy(Strategy::new(
            "thorough",
            ModelSelection::uniform("m-big"),
            WorkflowConfig::default().with_fast_mode(true),
        ));

    let mut events = Vec::new();
    let report = comparison.run("async rust", |e| events.push(e.clone())).await.unwrap();

    for name in ["fast", "thorough"] {
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::Progress { run_id, .. } if run_id == name)));
        let terminal: Vec<&StreamEvent> = events
            .iter()
            .filter(|e| e.is_terminal() && e.run_id() == Some(name))
            .collect();
        assert_eq!(terminal.len(), 1);
        assert!(matches!(terminal[0], StreamEvent::Complete { .. }));
    }

    // each instance's own events stay in order: planning comes first
    let first_fast = events
        .iter()
        .find_map(|e| match e {
            StreamEvent::Progress { run_id, event } if run_id == "fast" => Some(event),
            _ => None,
        })
        .unwrap();
    assert_eq!(first_fast.phase, research_flow::EventPhase::Planning);

    assert_eq!(report.summary.completed, 2);
    assert!(report.summary.best_confidence.is_some());
    assert!(report.summary.most_efficient.is_some());
    let names: Vec<&str> = report.outcomes.iter().map(|o| o.strategy.as_str()).collect();
    assert_eq!(names, vec!["fast", "thorough"]);
}

#[tokio::test]
async fn test_comparison_emits_heartbeats_while_quiet() {
    let oracle = Arc::new(counting(Duration::from_millis(40)));
    let context = AgentContext::new(corpus(), oracle);
    let config = RunnerConfig::default().with_heartbeat_interval(Duration::from_millis(10));
    let comparison = StrategyComparison::new(context, config).with_strategy(Strategy::new(
        "only",
        ModelSelection::default(),
        WorkflowConfig::default(),
    ));

    let mut heartbeats = 0;
    comparison
        .run("async rust", |e| {
            if matches!(e, StreamEvent::Heartbeat { .. }) {
                heartbeats += 1;
            }
        })
        .await
        .unwrap();

    assert!(heartbeats > 0);
}

#[tokio::test]
async fn test_comparison_rejects_duplicate_names() {
    let context = AgentContext::new(corpus(), Arc::new(ScriptedOracle::new()));
    let strategy = Strategy::new("same", ModelSelection::default(), WorkflowConfig::default());
    let result = StrategyComparison::new(context, RunnerConfig::default())
        .with_strategies([strategy.clone(), strategy])
        .run("q", |_| {})
        .await;

    assert!(result.is_err());
}
