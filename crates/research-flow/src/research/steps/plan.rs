use serde_json::json;
use tracing::warn;

use super::{StepExecutor, StepOutput};
use crate::llm::parse_json_response;
use crate::research::history::ExecutionStep;
use crate::research::model::{Plan, QueryType};
use crate::research::normalize::plan_from_value;
use crate::research::prompts::WorkflowPrompts;
use crate::research::state::WorkflowState;

impl StepExecutor {
    /// Decompose the query into retrieval and analysis steps
    pub async fn plan(&self, query: &str) -> StepOutput<Plan> {
        let model = &self.models.planner;
        let (response, elapsed) = self
            .ask_json(model, &WorkflowPrompts::planner_system(), WorkflowPrompts::planner_user(query))
            .await;

        let plan = if response.success {
            plan_from_value(&parse_json_response(&response.content), query)
        } else {
            warn!(phase = "plan", "Planner unavailable, using fallback plan");
            Plan::fallback(QueryType::Other)
        };

        let record = ExecutionStep::new(WorkflowState::Plan, "Planning")
            .with_input(json!({ "query": query }))
            .with_output(serde_json::to_value(&plan).unwrap_or_default())
            .with_reasoning(response.content)
            .with_model(model.as_str())
            .with_tokens(response.usage.total_tokens)
            .with_duration(elapsed);

        StepOutput::new(plan, record)
    }
}
