use serde_json::json;
use tracing::warn;

use super::{pretty, StepExecutor, StepOutput};
use crate::research::history::ExecutionStep;
use crate::research::model::{Analysis, Plan};
use crate::research::prompts::WorkflowPrompts;
use crate::research::state::WorkflowState;

/// Summary used when the summarizer cannot be reached
pub const SUMMARY_FALLBACK: &str = "Summary could not be generated due to an API error. Please try again. The analysis and retrieved results are still available.";

impl StepExecutor {
    /// Write the free-text answer to the query
    ///
    /// `phase` is the state the summary is produced in: Critique drafts one
    /// before reviewing it, Summarize writes it when no draft exists.
    pub async fn summarize(
        &self,
        phase: WorkflowState,
        query: &str,
        plan: Option<&Plan>,
        analysis: Option<&Analysis>,
    ) -> StepOutput<String> {
        let model = &self.models.summarizer;
        let plan_json = plan.map(pretty).unwrap_or_else(|| "null".into());
        let analysis_json = analysis.map(pretty).unwrap_or_else(|| "null".into());
        let user = WorkflowPrompts::summarizer_user(query, &plan_json, &analysis_json);
        let (response, elapsed) = self
            .ask(
                model,
                WorkflowPrompts::summarizer_system(),
                user,
                false,
                self.config.summary_max_tokens,
            )
            .await;

        let summary = if response.success && !response.content.trim().is_empty() {
            response.content.trim().to_string()
        } else {
            warn!(phase = %phase, "Summarizer unavailable, using fallback summary");
            SUMMARY_FALLBACK.to_string()
        };

        let record = ExecutionStep::new(phase, "Summarization")
            .with_input(json!({ "has_analysis": analysis.is_some() }))
            .with_output(json!({ "summary": summary }))
            .with_reasoning(summary.clone())
            .with_model(model.as_str())
            .with_tokens(response.usage.total_tokens)
            .with_duration(elapsed);

        StepOutput::new(summary, record)
    }
}
