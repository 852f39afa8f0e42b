use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::debug;

use super::{StepExecutor, StepOutput};
use crate::research::history::{ExecutionStep, RETRIEVAL_MODEL};
use crate::research::model::{PlanStep, SearchMethod, StepAction};
use crate::research::result_set::ResultSet;
use crate::research::state::WorkflowState;
use crate::retrieval::Document;

impl StepExecutor {
    /// Resolve executable steps against the retrieval engine and merge the
    /// hits into `existing`
    ///
    /// A search step queries by its description (or the query) with the
    /// method its hints select, narrowed by its own filters when present. A
    /// filter step narrows everything retrieved earlier in the same call.
    pub async fn execute(
        &self,
        phase: WorkflowState,
        query: &str,
        steps: &[PlanStep],
        existing: &ResultSet,
    ) -> StepOutput<ResultSet> {
        let started = Instant::now();
        let mut batch: Vec<Arc<Document>> = Vec::new();

        for step in steps.iter().filter(|s| s.is_executable()) {
            match step.action {
                StepAction::Search => {
                    let mut hits = self.search(step, query);
                    if let Some(filters) = &step.filters {
                        hits = self.retrieval.filter_by_metadata(&hits, filters);
                    }
                    debug!(description = %step.description, hits = hits.len(), "Search step");
                    batch.extend(hits);
                }
                StepAction::Filter => {
                    if let Some(filters) = &step.filters {
                        batch = self.retrieval.filter_by_metadata(&batch, filters);
                    }
                }
                StepAction::Analyze | StepAction::Other => {}
            }
        }

        let new_documents = existing.count_new(&batch);
        let merged = existing.merged(batch);

        let name = if phase == WorkflowState::Refine {
            "Refinement Execution"
        } else {
            "Execution"
        };
        let record = ExecutionStep::new(phase, name)
            .with_input(json!({ "query": query, "steps": steps }))
            .with_output(json!({
                "results_count": merged.len(),
                "new_documents": new_documents,
                "sample_ids": merged.ids().into_iter().take(3).collect::<Vec<_>>(),
            }))
            .with_reasoning(format!("Retrieved {} relevant items", merged.len()))
            .with_model(RETRIEVAL_MODEL)
            .with_duration(started.elapsed());

        StepOutput::new(merged, record)
    }

    fn search(&self, step: &PlanStep, query: &str) -> Vec<Arc<Document>> {
        let text = if step.description.trim().is_empty() {
            query
        } else {
            step.description.as_str()
        };
        let k = self.config.search_top_k;

        match SearchMethod::from_hints(&step.tool_hints) {
            SearchMethod::Hybrid => self.retrieval.hybrid_search(text, k, self.config.hybrid_alpha),
            SearchMethod::Semantic => self
                .retrieval
                .semantic_search(text, k)
                .into_iter()
                .map(|s| s.document)
                .collect(),
            SearchMethod::Keyword => self
                .retrieval
                .keyword_search(text, k)
                .into_iter()
                .map(|s| s.document)
                .collect(),
        }
    }
}
