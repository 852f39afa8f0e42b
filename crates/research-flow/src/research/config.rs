//! Workflow configuration
//!
//! Every threshold and ceiling the state machine consults lives here so tests
//! can force each branch deterministically.

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Default model for every oracle role
pub const DEFAULT_MODEL: &str = "grok-4-fast-reasoning";

/// Oracle model per workflow role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    /// Plan
    pub planner: String,
    /// ValidateResults, Analyze, Critique
    pub analyzer: String,
    /// Evaluate, Refine
    pub refiner: String,
    /// Summarize
    pub summarizer: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self::uniform(DEFAULT_MODEL)
    }
}

impl ModelSelection {
    /// Same model for every role
    pub fn uniform(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            planner: model.clone(),
            analyzer: model.clone(),
            refiner: model.clone(),
            summarizer: model,
        }
    }

    pub fn with_planner(mut self, model: impl Into<String>) -> Self {
        self.planner = model.into();
        self
    }

    pub fn with_analyzer(mut self, model: impl Into<String>) -> Self {
        self.analyzer = model.into();
        self
    }

    pub fn with_refiner(mut self, model: impl Into<String>) -> Self {
        self.refiner = model.into();
        self
    }

    pub fn with_summarizer(mut self, model: impl Into<String>) -> Self {
        self.summarizer = model.into();
        self
    }
}

/// State machine thresholds, ceilings and sampling sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Ceiling on executed refinement rounds
    pub max_iterations: usize,
    /// Ceiling on full restarts from Plan
    pub max_replans: usize,
    /// Ceiling on Critique -> Refine loops
    pub max_critique_refine_loops: usize,

    /// Skip Evaluate and Critique entirely
    pub fast_mode: bool,
    /// Refine is skipped when confidence is above this
    pub skip_refinement_above: f64,
    /// Evaluate/Critique are skipped above this when data quality is high
    pub skip_review_above: f64,
    /// Minimum confidence gain between analyses to keep refining
    pub stagnation_epsilon: f64,
    /// ValidateResults replans below this relevance
    pub replan_relevance_below: f64,
    /// ValidateResults refines below this relevance when the validator asks to
    pub refine_relevance_below: f64,

    /// Result set cap
    pub max_results: usize,
    pub analyze_sample_size: usize,
    pub critique_sample_size: usize,
    pub validate_sample_size: usize,
    /// Documents requested per search step
    pub search_top_k: usize,
    /// Semantic weight in hybrid search
    pub hybrid_alpha: f64,

    pub temperature: f64,
    pub max_tokens: u64,
    pub summary_max_tokens: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            max_replans: 2,
            max_critique_refine_loops: 2,
            fast_mode: false,
            skip_refinement_above: 0.75,
            skip_review_above: 0.85,
            stagnation_epsilon: 0.05,
            replan_relevance_below: 0.3,
            refine_relevance_below: 0.4,
            max_results: 15,
            analyze_sample_size: 6,
            critique_sample_size: 4,
            validate_sample_size: 5,
            search_top_k: 8,
            hybrid_alpha: 0.6,
            temperature: 0.7,
            max_tokens: 1500,
            summary_max_tokens: 1200,
        }
    }
}

impl WorkflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_replans(mut self, max: usize) -> Self {
        self.max_replans = max;
        self
    }

    pub fn with_max_critique_refine_loops(mut self, max: usize) -> Self {
        self.max_critique_refine_loops = max;
        self
    }

    pub fn with_fast_mode(mut self, fast: bool) -> Self {
        self.fast_mode = fast;
        self
    }

    pub fn with_skip_refinement_above(mut self, threshold: f64) -> Self {
        self.skip_refinement_above = threshold;
        self
    }

    pub fn with_skip_review_above(mut self, threshold: f64) -> Self {
        self.skip_review_above = threshold;
        self
    }

    pub fn with_stagnation_epsilon(mut self, epsilon: f64) -> Self {
        self.stagnation_epsilon = epsilon;
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max.max(1);
        self
    }

    pub fn with_search_top_k(mut self, k: usize) -> Self {
        self.search_top_k = k.max(1);
        self
    }

    pub fn with_hybrid_alpha(mut self, alpha: f64) -> Self {
        self.hybrid_alpha = alpha;
        self
    }

    /// Upper bound on state visits for one run, derived from the three ceilings.
    ///
    /// Each planning cycle visits Plan, Execute and ValidateResults; each
    /// executed refinement adds Refine and ValidateResults; every
    /// ValidateResults may lead to Analyze and Evaluate; non-executing Refine
    /// visits are bounded by Critique visits, which are bounded by the
    /// critique loop ceiling plus one.
    pub fn transition_bound(&self) -> usize {
        5 * self.max_replans + 4 * self.max_iterations + 2 * self.max_critique_refine_loops + 9
    }

    /// Validate ranges before any run starts
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let unit = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(WorkflowError::config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )))
            }
        };

        unit("skip_refinement_above", self.skip_refinement_above)?;
        unit("skip_review_above", self.skip_review_above)?;
        unit("stagnation_epsilon", self.stagnation_epsilon)?;
        unit("replan_relevance_below", self.replan_relevance_below)?;
        unit("refine_relevance_below", self.refine_relevance_below)?;
        unit("hybrid_alpha", self.hybrid_alpha)?;

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(WorkflowError::config(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.max_results == 0 || self.search_top_k == 0 {
            return Err(WorkflowError::config("max_results and search_top_k must be at least 1"));
        }
        if self.max_tokens == 0 || self.summary_max_tokens == 0 {
            return Err(WorkflowError::config("token limits must be at least 1"));
        }
        Ok(())
    }
}
