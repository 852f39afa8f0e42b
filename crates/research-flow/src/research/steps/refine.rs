use serde_json::json;
use tracing::{info, warn};

use super::{pretty, StepExecutor, StepOutput};
use crate::llm::parse_json_response;
use crate::research::history::ExecutionStep;
use crate::research::model::{Analysis, Critique, Plan, PlanStep, Refinement, ToolHint};
use crate::research::normalize::refinement_from_value;
use crate::research::prompts::WorkflowPrompts;
use crate::research::state::WorkflowState;

/// Searches seeded per forced refinement when the refiner offers none
const MAX_SEEDED_STEPS: usize = 3;

/// Turn a refinement into a forced one with at least one search step
fn force(mut refinement: Refinement, critique: Option<&Critique>, query: &str) -> Refinement {
    if refinement.next_steps.is_empty() {
        let corrections = critique.map(|c| c.corrections.as_slice()).unwrap_or_default();
        refinement.next_steps = if corrections.is_empty() {
            vec![PlanStep::search(query, vec![ToolHint::Hybrid])]
        } else {
            corrections
                .iter()
                .take(MAX_SEEDED_STEPS)
                .map(|c| PlanStep::search(c.as_str(), vec![ToolHint::Hybrid]))
                .collect()
        };
    }
    refinement.needed = true;
    refinement.reason = format!("Critique found unsupported claims; refining. {}", refinement.reason);
    refinement
}

impl StepExecutor {
    /// Decide whether more retrieval is needed and which steps to run
    ///
    /// `forced` is set after a failed critique: the confidence short-circuit
    /// is bypassed and the result always carries executable steps.
    pub async fn refine(
        &self,
        query: &str,
        plan: &Plan,
        analysis: Option<&Analysis>,
        critique: Option<&Critique>,
        forced: bool,
    ) -> StepOutput<Refinement> {
        let confidence = analysis.map(|a| a.confidence).unwrap_or(0.0);

        if !forced && confidence > self.config.skip_refinement_above {
            let refinement = Refinement::not_needed("High confidence achieved");
            let record = ExecutionStep::new(WorkflowState::Refine, "Refinement Check")
                .with_input(json!({ "confidence": confidence }))
                .with_output(serde_json::to_value(&refinement).unwrap_or_default())
                .with_reasoning("High confidence - no refinement needed");
            return StepOutput::new(refinement, record);
        }

        let model = &self.models.refiner;
        let corrections = match critique {
            Some(c) if forced => c.corrections.clone(),
            _ => Vec::new(),
        };
        let analysis_json = analysis.map(pretty).unwrap_or_else(|| "null".into());
        let user = WorkflowPrompts::refiner_user(query, &analysis_json, &pretty(plan), &corrections);
        let (response, elapsed) = self.ask_json(model, WorkflowPrompts::refiner_system(), user).await;

        let mut refinement = if response.success {
            refinement_from_value(&parse_json_response(&response.content), query)
        } else {
            warn!(phase = "refine", forced, "Refiner unavailable, skipping refinement");
            Refinement::fallback()
        };
        if forced {
            info!(phase = "refine", "Refinement forced by failed critique");
            refinement = force(refinement, critique, query);
        }

        let reasoning = if response.success {
            response.content
        } else {
            "Refinement API call failed; treating as no refinement needed".to_string()
        };
        let record = ExecutionStep::new(WorkflowState::Refine, "Refinement")
            .with_input(json!({ "confidence": confidence, "forced": forced }))
            .with_output(serde_json::to_value(&refinement).unwrap_or_default())
            .with_reasoning(reasoning)
            .with_model(model.as_str())
            .with_tokens(response.usage.total_tokens)
            .with_duration(elapsed);

        StepOutput::new(refinement, record)
    }
}
