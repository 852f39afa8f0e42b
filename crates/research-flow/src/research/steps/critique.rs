use serde_json::json;
use tracing::warn;

use super::{pretty, sample_documents, StepExecutor, StepOutput};
use crate::llm::parse_json_response;
use crate::research::history::ExecutionStep;
use crate::research::model::{Analysis, Critique};
use crate::research::normalize::critique_from_value;
use crate::research::prompts::WorkflowPrompts;
use crate::research::result_set::ResultSet;
use crate::research::state::WorkflowState;

const CRITIQUE_TEXT_LENGTH: usize = 120;

impl StepExecutor {
    /// Check the draft summary against the retrieved evidence
    pub async fn critique(
        &self,
        query: &str,
        analysis: Option<&Analysis>,
        results: &ResultSet,
        summary: &str,
    ) -> StepOutput<Critique> {
        let model = &self.models.analyzer;
        let sample = sample_documents(
            results.documents(),
            self.config.critique_sample_size,
            CRITIQUE_TEXT_LENGTH,
            false,
        );
        let analysis_json = analysis.map(pretty).unwrap_or_else(|| "null".into());
        let user = WorkflowPrompts::critic_user(query, &sample, &analysis_json, summary);
        let (response, elapsed) = self.ask_json(model, WorkflowPrompts::critic_system(), user).await;

        let critique = if response.success {
            critique_from_value(&parse_json_response(&response.content))
        } else {
            warn!(phase = "critique", "Critic unavailable, passing critique");
            Critique::fallback()
        };

        let record = ExecutionStep::new(WorkflowState::Critique, "Critique")
            .with_input(json!({ "results_count": results.len() }))
            .with_output(serde_json::to_value(&critique).unwrap_or_default())
            .with_reasoning(response.content)
            .with_model(model.as_str())
            .with_tokens(response.usage.total_tokens)
            .with_duration(elapsed);

        StepOutput::new(critique, record)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{documents, executor, StaticOracle};
    use super::*;

    #[tokio::test]
    async fn test_critique_flags_hallucinations() {
        let oracle = StaticOracle::replying(
            r#"{"critique_passed": false, "hallucinations": ["claims 40% speedup"], "revised_summary": "Runtimes improved."}"#,
        );
        let results = ResultSet::from_documents(documents(), 15);
        let out = executor(oracle.clone()).critique("q", None, &results, "Runtimes are 40% faster.").await;

        assert!(out.value.failed());
        assert_eq!(out.value.revised_summary.as_deref(), Some("Runtimes improved."));
        let prompt = oracle.requests.lock().unwrap()[0].prompt_text();
        assert!(prompt.contains("Runtimes are 40% faster."));
    }

    #[tokio::test]
    async fn test_critique_fallback_passes() {
        let results = ResultSet::from_documents(documents(), 15);
        let out = executor(StaticOracle::failing()).critique("q", None, &results, "draft").await;

        assert!(!out.value.failed());
        assert_eq!(out.value.biases, vec!["Could not complete critique due to API error"]);
    }
}
