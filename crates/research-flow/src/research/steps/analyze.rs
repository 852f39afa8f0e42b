use serde_json::json;
use tracing::warn;

use super::{pretty, sample_documents, StepExecutor, StepOutput};
use crate::llm::parse_json_response;
use crate::research::history::ExecutionStep;
use crate::research::model::{Analysis, Plan};
use crate::research::normalize::analysis_from_value;
use crate::research::prompts::WorkflowPrompts;
use crate::research::result_set::ResultSet;
use crate::research::state::WorkflowState;

const ANALYZE_TEXT_LENGTH: usize = 150;

impl StepExecutor {
    /// Extract themes, insights and a confidence score from the results
    pub async fn analyze(&self, query: &str, results: &ResultSet, plan: &Plan) -> StepOutput<Analysis> {
        if results.is_empty() {
            let analysis = Analysis::no_results();
            let record = ExecutionStep::new(WorkflowState::Analyze, "Analysis")
                .with_input(json!({ "results_count": 0 }))
                .with_output(serde_json::to_value(&analysis).unwrap_or_default())
                .with_reasoning("No documents to analyze");
            return StepOutput::new(analysis, record);
        }

        let model = &self.models.analyzer;
        let sample = sample_documents(
            results.documents(),
            self.config.analyze_sample_size,
            ANALYZE_TEXT_LENGTH,
            true,
        );
        let user = WorkflowPrompts::analyst_user(query, &sample, &pretty(&plan.steps));
        let (response, elapsed) = self.ask_json(model, WorkflowPrompts::analyst_system(), user).await;

        let analysis = if response.success {
            analysis_from_value(&parse_json_response(&response.content))
        } else {
            warn!(phase = "analyze", results = results.len(), "Analyst unavailable, using fallback analysis");
            Analysis::fallback(results.len())
        };

        let record = ExecutionStep::new(WorkflowState::Analyze, "Analysis")
            .with_input(json!({ "results_count": results.len() }))
            .with_output(serde_json::to_value(&analysis).unwrap_or_default())
            .with_reasoning(response.content)
            .with_model(model.as_str())
            .with_tokens(response.usage.total_tokens)
            .with_duration(elapsed);

        StepOutput::new(analysis, record)
    }
}
