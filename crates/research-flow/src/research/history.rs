//! Execution history
//!
//! Append-only audit log of every step a run takes, in chronological order
//! including repeated visits to the same phase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use super::state::WorkflowState;

/// Model id recorded for steps that never call the oracle
pub const RETRIEVAL_MODEL: &str = "retrieval_system";
/// Model id recorded for deterministic decisions
pub const DECISION_MODEL: &str = "decision_logic";

/// One audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub phase: WorkflowState,
    pub name: String,
    pub input: Value,
    pub output: Value,
    /// Raw oracle content or a short explanation
    pub reasoning: String,
    pub model: String,
    pub tokens_used: u64,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionStep {
    pub fn new(phase: WorkflowState, name: impl Into<String>) -> Self {
        Self {
            phase,
            name: name.into(),
            input: Value::Null,
            output: Value::Null,
            reasoning: String::new(),
            model: DECISION_MODEL.to_string(),
            tokens_used: 0,
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = output;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = tokens;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }
}

/// Append-only step log owned by one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionHistory {
    steps: Vec<ExecutionStep>,
    total_tokens: u64,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn record(&mut self, step: ExecutionStep) {
        self.total_tokens += step.tokens_used;
        self.steps.push(step);
    }

    /// Forget everything (full workflow restart only)
    pub fn reset(&mut self) {
        self.steps.clear();
        self.total_tokens = 0;
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// The last `n` steps
    pub fn recent(&self, n: usize) -> &[ExecutionStep] {
        &self.steps[self.steps.len().saturating_sub(n)..]
    }

    pub fn by_phase(&self, phase: WorkflowState) -> impl Iterator<Item = &ExecutionStep> {
        self.steps.iter().filter(move |s| s.phase == phase)
    }

    /// Step count per phase name
    pub fn phase_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for step in &self.steps {
            *counts.entry(step.phase.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Compact text of the run so far, for logs and prompts
    pub fn summarized_context(&self) -> String {
        if self.steps.is_empty() {
            return "No execution history yet.".to_string();
        }

        let mut lines = vec![
            format!("Total steps executed: {}", self.steps.len()),
            format!("Total tokens used: {}", self.total_tokens),
            String::new(),
            "Recent steps:".to_string(),
        ];
        for step in self.recent(5) {
            let reasoning: String = step.reasoning.chars().take(100).collect();
            lines.push(format!("- {} ({}): {}", step.name, step.phase.as_str(), reasoning));
        }
        lines.join("\n")
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.steps).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(phase: WorkflowState, tokens: u64) -> ExecutionStep {
        ExecutionStep::new(phase, phase.as_str())
            .with_tokens(tokens)
            .with_reasoning("x".repeat(150))
    }

    #[test]
    fn test_record_accumulates_tokens() {
        let mut history = ExecutionHistory::new();
        history.record(step(WorkflowState::Plan, 100));
        history.record(step(WorkflowState::Execute, 0));
        history.record(step(WorkflowState::Analyze, 250));

        assert_eq!(history.len(), 3);
        assert_eq!(history.total_tokens(), 350);

        history.reset();
        assert!(history.is_empty());
        assert_eq!(history.total_tokens(), 0);
    }

    #[test]
    fn test_chronological_order_with_repeats() {
        let mut history = ExecutionHistory::new();
        for phase in [
            WorkflowState::Analyze,
            WorkflowState::Refine,
            WorkflowState::Analyze,
        ] {
            history.record(step(phase, 1));
        }

        let phases: Vec<_> = history.steps().iter().map(|s| s.phase).collect();
        assert_eq!(
            phases,
            vec![WorkflowState::Analyze, WorkflowState::Refine, WorkflowState::Analyze]
        );
        assert_eq!(history.by_phase(WorkflowState::Analyze).count(), 2);
        assert_eq!(history.phase_counts().get("analyze"), Some(&2));
    }

    #[test]
    fn test_recent_and_summary() {
        let mut history = ExecutionHistory::new();
        assert_eq!(history.summarized_context(), "No execution history yet.");

        for _ in 0..7 {
            history.record(step(WorkflowState::Execute, 2));
        }
        assert_eq!(history.recent(5).len(), 5);
        assert_eq!(history.recent(50).len(), 7);

        let summary = history.summarized_context();
        assert!(summary.contains("Total steps executed: 7"));
        assert!(summary.contains("Total tokens used: 14"));
        assert_eq!(summary.lines().filter(|l| l.starts_with("- ")).count(), 5);
    }

    #[test]
    fn test_step_builder_and_json() {
        let step = ExecutionStep::new(WorkflowState::Execute, "Execution")
            .with_input(json!({"query": "q"}))
            .with_model(RETRIEVAL_MODEL)
            .with_duration(Duration::from_millis(42));

        let mut history = ExecutionHistory::new();
        history.record(step);
        let json = history.to_json();
        assert_eq!(json[0]["model"], RETRIEVAL_MODEL);
        assert_eq!(json[0]["duration_ms"], 42);
        assert_eq!(json[0]["phase"], "execute");
    }
}
