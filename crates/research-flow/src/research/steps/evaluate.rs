use serde_json::json;
use tracing::warn;

use super::{pretty, StepExecutor, StepOutput};
use crate::llm::parse_json_response;
use crate::research::history::ExecutionStep;
use crate::research::model::{Analysis, Evaluation, Plan, SentimentHistogram};
use crate::research::normalize::evaluation_from_value;
use crate::research::prompts::WorkflowPrompts;
use crate::research::result_set::ResultSet;
use crate::research::state::WorkflowState;

/// Negative share of the analysis histogram, or of the documents when the
/// analyst reported no counts
fn negative_ratio(analysis: &Analysis, results: &ResultSet) -> f64 {
    if analysis.sentiment.total() > 0 {
        analysis.sentiment.negative_ratio()
    } else {
        SentimentHistogram::from_documents(results.documents().iter().map(|d| d.as_ref())).negative_ratio()
    }
}

impl StepExecutor {
    /// Decide whether the whole strategy must be replaced
    pub async fn evaluate(
        &self,
        query: &str,
        plan: &Plan,
        analysis: &Analysis,
        results: &ResultSet,
    ) -> StepOutput<Evaluation> {
        let model = &self.models.refiner;
        let ratio = negative_ratio(analysis, results);
        let user = WorkflowPrompts::evaluator_user(query, &pretty(plan), &pretty(analysis), ratio, results.len());
        let (response, elapsed) = self.ask_json(model, WorkflowPrompts::evaluator_system(), user).await;

        let evaluation = if response.success {
            evaluation_from_value(&parse_json_response(&response.content), ratio)
        } else {
            warn!(phase = "evaluate", "Evaluator unavailable, keeping current plan");
            Evaluation::fallback(ratio)
        };

        let record = ExecutionStep::new(WorkflowState::Evaluate, "Strategy Evaluation")
            .with_input(json!({ "results_count": results.len(), "negative_ratio": ratio }))
            .with_output(serde_json::to_value(&evaluation).unwrap_or_default())
            .with_reasoning(response.content)
            .with_model(model.as_str())
            .with_tokens(response.usage.total_tokens)
            .with_duration(elapsed);

        StepOutput::new(evaluation, record)
    }
}
