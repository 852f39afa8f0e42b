use serde_json::json;
use tracing::warn;

use super::{sample_documents, StepExecutor, StepOutput};
use crate::llm::parse_json_response;
use crate::research::history::ExecutionStep;
use crate::research::model::Validation;
use crate::research::normalize::validation_from_value;
use crate::research::prompts::WorkflowPrompts;
use crate::research::result_set::ResultSet;
use crate::research::state::WorkflowState;

const VALIDATE_TEXT_LENGTH: usize = 150;

impl StepExecutor {
    /// Score how well the current results answer the query
    ///
    /// An empty result set is a deterministic replan verdict; the oracle is
    /// not consulted.
    pub async fn validate(&self, query: &str, results: &ResultSet) -> StepOutput<Validation> {
        if results.is_empty() {
            let validation = Validation::empty_results();
            let record = ExecutionStep::new(WorkflowState::ValidateResults, "Result Validation")
                .with_input(json!({ "results_count": 0 }))
                .with_output(serde_json::to_value(&validation).unwrap_or_default())
                .with_reasoning("Empty result set - replan required");
            return StepOutput::new(validation, record);
        }

        let model = &self.models.analyzer;
        let sample = sample_documents(
            results.documents(),
            self.config.validate_sample_size,
            VALIDATE_TEXT_LENGTH,
            false,
        );
        let (response, elapsed) = self
            .ask_json(model, WorkflowPrompts::validator_system(), WorkflowPrompts::validator_user(query, &sample))
            .await;

        let validation = if response.success {
            validation_from_value(&parse_json_response(&response.content), query)
        } else {
            warn!(phase = "validate_results", "Validator unavailable, proceeding without validation");
            Validation::fallback()
        };

        let record = ExecutionStep::new(WorkflowState::ValidateResults, "Result Validation")
            .with_input(json!({ "results_count": results.len() }))
            .with_output(serde_json::to_value(&validation).unwrap_or_default())
            .with_reasoning(response.content)
            .with_model(model.as_str())
            .with_tokens(response.usage.total_tokens)
            .with_duration(elapsed);

        StepOutput::new(validation, record)
    }
}
