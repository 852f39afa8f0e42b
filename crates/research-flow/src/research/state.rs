//! Workflow state machine
//!
//! [`WorkflowRun`] holds everything one run owns. Transitions are decided by
//! the pure function [`next_transition`] from the run's recorded phase outputs,
//! then applied with [`WorkflowRun::apply`]. Counter increments happen only in
//! `apply` and are checked against their ceilings first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::config::WorkflowConfig;
use super::history::ExecutionHistory;
use super::model::{Analysis, Critique, Evaluation, Plan, Refinement, Validation};
use super::result_set::ResultSet;

/// Workflow phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Plan,
    Execute,
    ValidateResults,
    Analyze,
    Evaluate,
    Refine,
    Critique,
    Summarize,
    Complete,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Execute => "execute",
            Self::ValidateResults => "validate_results",
            Self::Analyze => "analyze",
            Self::Evaluate => "evaluate",
            Self::Refine => "refine",
            Self::Critique => "critique",
            Self::Summarize => "summarize",
            Self::Complete => "complete",
        }
    }

    /// Check if this is the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the last Refine visit did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineOutcome {
    /// Retrieval ran and results were merged
    Executed,
    /// The refiner (or the confidence short-circuit) declined
    NotNeeded,
    /// `max_iterations` already reached
    CeilingReached,
    /// Confidence gain since the previous analysis below epsilon
    Stagnated,
    /// Arrived from a failed critique with the loop ceiling reached
    CritiqueLoopExhausted,
}

/// Deterministic gate evaluated on entering Refine, before any oracle call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineGate {
    /// Stop without consulting the oracle
    Stop(RefineOutcome),
    /// Execute the refinement staged by ValidateResults
    Staged,
    /// Ask the refiner; `forced` after a failed critique
    Consult { forced: bool },
}

/// Side effect attached to a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Discard plan, results and analysis; count a replan
    Replan,
    /// Count a critique-refine loop and force the next refinement
    CritiqueLoop,
}

/// A decided transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: WorkflowState,
    pub effect: Effect,
}

impl Transition {
    pub fn to(next: WorkflowState) -> Self {
        Self {
            next,
            effect: Effect::None,
        }
    }

    fn replan() -> Self {
        Self {
            next: WorkflowState::Plan,
            effect: Effect::Replan,
        }
    }

    fn critique_loop() -> Self {
        Self {
            next: WorkflowState::Refine,
            effect: Effect::CritiqueLoop,
        }
    }
}

/// One end-to-end execution
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub query: String,
    pub state: WorkflowState,
    pub plan: Option<Plan>,
    pub results: ResultSet,
    pub analysis: Option<Analysis>,
    pub confidence_history: Vec<f64>,

    pub iteration_count: usize,
    pub replan_count: usize,
    pub critique_refine_loop_count: usize,

    pub validation: Option<Validation>,
    /// Refinement built from validator recommendations, consumed by Refine
    pub staged_refinement: Option<Refinement>,
    pub evaluation: Option<Evaluation>,
    pub refinement: Option<Refinement>,
    pub refine_outcome: Option<RefineOutcome>,
    pub critique: Option<Critique>,
    /// Set by a failed critique, cleared when Refine consumes it
    pub from_failed_critique: bool,
    pub summary: Option<String>,

    pub history: ExecutionHistory,
    pub phases_visited: Vec<WorkflowState>,
    pub started_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn new(query: impl Into<String>, config: &WorkflowConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            state: WorkflowState::Plan,
            plan: None,
            results: ResultSet::new(config.max_results),
            analysis: None,
            confidence_history: Vec::new(),
            iteration_count: 0,
            replan_count: 0,
            critique_refine_loop_count: 0,
            validation: None,
            staged_refinement: None,
            evaluation: None,
            refinement: None,
            refine_outcome: None,
            critique: None,
            from_failed_critique: false,
            summary: None,
            history: ExecutionHistory::new(),
            phases_visited: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Latest analysis confidence, 0 when nothing was analyzed
    pub fn confidence(&self) -> f64 {
        self.analysis.as_ref().map(|a| a.confidence).unwrap_or(0.0)
    }

    /// Whether Evaluate and Critique should be skipped
    pub fn should_skip_review(&self, config: &WorkflowConfig) -> bool {
        if config.fast_mode {
            return true;
        }
        self.analysis
            .as_ref()
            .is_some_and(|a| a.confidence > config.skip_review_above && a.data_quality.is_high())
    }

    /// Confidence gain between the last two analyses is below epsilon
    /// after at least one executed refinement
    pub fn has_stagnated(&self, config: &WorkflowConfig) -> bool {
        if self.iteration_count < 1 {
            return false;
        }
        match self.confidence_history.as_slice() {
            [.., previous, latest] => latest - previous < config.stagnation_epsilon,
            _ => false,
        }
    }

    /// Count one executed refinement round; false when the ceiling is reached
    pub fn try_begin_iteration(&mut self, config: &WorkflowConfig) -> bool {
        if self.iteration_count >= config.max_iterations {
            return false;
        }
        self.iteration_count += 1;
        true
    }

    /// Apply a decided transition, including its counter effect
    pub fn apply(&mut self, transition: Transition, config: &WorkflowConfig) {
        match transition.effect {
            Effect::None => {}
            Effect::Replan => {
                if self.replan_count < config.max_replans {
                    self.replan_count += 1;
                }
                info!(run_id = %self.id, replan_count = self.replan_count, "Replanning from scratch");
                self.plan = None;
                self.results.clear();
                self.analysis = None;
                self.validation = None;
                self.staged_refinement = None;
                self.evaluation = None;
                self.refinement = None;
                self.summary = None;
            }
            Effect::CritiqueLoop => {
                if self.critique_refine_loop_count < config.max_critique_refine_loops {
                    self.critique_refine_loop_count += 1;
                }
                self.from_failed_critique = true;
            }
        }

        debug!(run_id = %self.id, from = %self.state, to = %transition.next, "Transition");
        self.state = transition.next;
    }
}

/// Entry gate for the Refine phase
pub fn refine_gate(run: &WorkflowRun, config: &WorkflowConfig) -> RefineGate {
    if run.from_failed_critique {
        if run.critique_refine_loop_count > config.max_critique_refine_loops {
            return RefineGate::Stop(RefineOutcome::CritiqueLoopExhausted);
        }
        if run.iteration_count >= config.max_iterations {
            return RefineGate::Stop(RefineOutcome::CeilingReached);
        }
        return RefineGate::Consult { forced: true };
    }

    if run.iteration_count >= config.max_iterations {
        return RefineGate::Stop(RefineOutcome::CeilingReached);
    }
    if run.staged_refinement.as_ref().is_some_and(|r| r.needed) {
        return RefineGate::Staged;
    }
    if run.has_stagnated(config) {
        return RefineGate::Stop(RefineOutcome::Stagnated);
    }
    RefineGate::Consult { forced: false }
}

/// Decide the next state from the current state and recorded phase outputs
pub fn next_transition(run: &WorkflowRun, config: &WorkflowConfig) -> Transition {
    use WorkflowState::*;

    match run.state {
        Plan => Transition::to(Execute),
        Execute => Transition::to(ValidateResults),
        ValidateResults => {
            let Some(validation) = &run.validation else {
                return Transition::to(Analyze);
            };
            if validation.relevance_score < config.replan_relevance_below
                && run.replan_count < config.max_replans
            {
                return Transition::replan();
            }
            if validation.relevance_score < config.refine_relevance_below
                && validation.action == super::model::ValidationAction::Refine
                && run.iteration_count < config.max_iterations
                && run.staged_refinement.as_ref().is_some_and(|r| r.needed)
            {
                return Transition::to(Refine);
            }
            Transition::to(Analyze)
        }
        Analyze => Transition::to(Evaluate),
        Evaluate => {
            let replan = run.evaluation.as_ref().is_some_and(|e| e.replan_needed);
            if replan && run.replan_count < config.max_replans {
                Transition::replan()
            } else {
                Transition::to(Refine)
            }
        }
        Refine => match run.refine_outcome {
            Some(RefineOutcome::Executed) => Transition::to(ValidateResults),
            Some(RefineOutcome::CritiqueLoopExhausted) => Transition::to(Summarize),
            _ => Transition::to(Critique),
        },
        Critique => {
            let failed = run.critique.as_ref().is_some_and(|c| c.failed());
            if failed
                && run.iteration_count < config.max_iterations
                && run.critique_refine_loop_count < config.max_critique_refine_loops
            {
                Transition::critique_loop()
            } else {
                Transition::to(Summarize)
            }
        }
        Summarize | Complete => Transition::to(Complete),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::model::{DataQuality, PlanStep, ValidationAction};
    use crate::retrieval::Document;
    use std::sync::Arc;

    fn run_in(state: WorkflowState) -> WorkflowRun {
        let mut run = WorkflowRun::new("query", &WorkflowConfig::default());
        run.state = state;
        run
    }

    fn validation(score: f64, action: ValidationAction) -> Validation {
        Validation {
            relevance_score: score,
            action,
            reason: String::new(),
            recommendations: Vec::new(),
        }
    }

    fn analysis(confidence: f64, quality: DataQuality) -> Analysis {
        let mut a = Analysis::fallback(1);
        a.confidence = confidence;
        a.data_quality = quality;
        a
    }

    #[test]
    fn test_unconditional_edges() {
        let config = WorkflowConfig::default();
        assert_eq!(next_transition(&run_in(WorkflowState::Plan), &config).next, WorkflowState::Execute);
        assert_eq!(
            next_transition(&run_in(WorkflowState::Execute), &config).next,
            WorkflowState::ValidateResults
        );
        assert_eq!(next_transition(&run_in(WorkflowState::Analyze), &config).next, WorkflowState::Evaluate);
        assert_eq!(
            next_transition(&run_in(WorkflowState::Summarize), &config).next,
            WorkflowState::Complete
        );
    }

    #[test]
    fn test_validation_low_relevance_replans_until_ceiling() {
        let config = WorkflowConfig::default().with_max_replans(1);
        let mut run = run_in(WorkflowState::ValidateResults);
        run.validation = Some(Validation::empty_results());

        let t = next_transition(&run, &config);
        assert_eq!(t.effect, Effect::Replan);

        run.replan_count = 1;
        let t = next_transition(&run, &config);
        assert_eq!(t, Transition::to(WorkflowState::Analyze));
    }

    #[test]
    fn test_validation_refine_requires_staged_steps() {
        let config = WorkflowConfig::default();
        let mut run = run_in(WorkflowState::ValidateResults);
        run.validation = Some(validation(0.35, ValidationAction::Refine));
        assert_eq!(next_transition(&run, &config).next, WorkflowState::Analyze);

        run.staged_refinement = Some(Refinement::with_steps("v", vec![PlanStep::search("more", vec![])]));
        assert_eq!(next_transition(&run, &config).next, WorkflowState::Refine);

        run.validation = Some(validation(0.45, ValidationAction::Refine));
        assert_eq!(next_transition(&run, &config).next, WorkflowState::Analyze);
    }

    #[test]
    fn test_replan_reset() {
        let config = WorkflowConfig::default();
        let mut run = run_in(WorkflowState::Evaluate);
        run.results = run.results.merged(vec![Arc::new(Document::new("a", "x"))]);
        run.analysis = Some(analysis(0.2, DataQuality::Low));
        run.evaluation = Some(Evaluation {
            replan_needed: true,
            reason: "wrong data".into(),
            suggested_strategy: None,
            negative_ratio: 0.9,
            skipped: false,
        });

        let t = next_transition(&run, &config);
        assert_eq!(t.effect, Effect::Replan);
        run.apply(t, &config);

        assert_eq!(run.state, WorkflowState::Plan);
        assert_eq!(run.replan_count, 1);
        assert!(run.results.is_empty());
        assert!(run.analysis.is_none());
    }

    #[test]
    fn test_counters_never_pass_ceiling() {
        let config = WorkflowConfig::default()
            .with_max_replans(0)
            .with_max_critique_refine_loops(0)
            .with_max_iterations(0);
        let mut run = run_in(WorkflowState::Evaluate);
        run.apply(Transition::replan(), &config);
        run.apply(Transition::critique_loop(), &config);
        assert!(!run.try_begin_iteration(&config));

        assert_eq!(run.replan_count, 0);
        assert_eq!(run.critique_refine_loop_count, 0);
        assert_eq!(run.iteration_count, 0);
    }

    #[test]
    fn test_stagnation_routes_refine_to_critique() {
        let config = WorkflowConfig::default();
        let mut run = run_in(WorkflowState::Refine);
        run.iteration_count = 1;
        run.confidence_history = vec![0.40, 0.44];

        assert!(run.has_stagnated(&config));
        assert_eq!(refine_gate(&run, &config), RefineGate::Stop(RefineOutcome::Stagnated));

        run.refine_outcome = Some(RefineOutcome::Stagnated);
        assert_eq!(next_transition(&run, &config).next, WorkflowState::Critique);
    }

    #[test]
    fn test_no_stagnation_before_first_iteration() {
        let config = WorkflowConfig::default();
        let mut run = run_in(WorkflowState::Refine);
        run.confidence_history = vec![0.40, 0.41];
        assert!(!run.has_stagnated(&config));
        assert_eq!(refine_gate(&run, &config), RefineGate::Consult { forced: false });
    }

    #[test]
    fn test_refine_gate_ceiling_and_staged() {
        let config = WorkflowConfig::default().with_max_iterations(1);
        let mut run = run_in(WorkflowState::Refine);
        run.staged_refinement = Some(Refinement::with_steps("v", vec![PlanStep::search("x", vec![])]));
        assert_eq!(refine_gate(&run, &config), RefineGate::Staged);

        run.iteration_count = 1;
        assert_eq!(refine_gate(&run, &config), RefineGate::Stop(RefineOutcome::CeilingReached));
    }

    #[test]
    fn test_executed_refinement_revalidates() {
        let config = WorkflowConfig::default();
        let mut run = run_in(WorkflowState::Refine);
        run.refine_outcome = Some(RefineOutcome::Executed);
        assert_eq!(next_transition(&run, &config).next, WorkflowState::ValidateResults);
    }

    #[test]
    fn test_failed_critique_loops_until_cap() {
        let config = WorkflowConfig::default().with_max_iterations(5);
        let mut run = run_in(WorkflowState::Critique);
        run.critique = Some(Critique {
            passed: false,
            hallucinations: vec!["claim".into()],
            biases: Vec::new(),
            corrections: Vec::new(),
            confidence_adjustment: None,
            revised_summary: Some("revised".into()),
            skipped: false,
        });

        let t = next_transition(&run, &config);
        assert_eq!(t.effect, Effect::CritiqueLoop);
        run.apply(t, &config);
        assert!(run.from_failed_critique);
        assert_eq!(refine_gate(&run, &config), RefineGate::Consult { forced: true });

        run.state = WorkflowState::Critique;
        run.critique_refine_loop_count = 2;
        assert_eq!(next_transition(&run, &config).next, WorkflowState::Summarize);
    }

    #[test]
    fn test_review_skip_rule() {
        let config = WorkflowConfig::default();
        let mut run = run_in(WorkflowState::Evaluate);
        run.analysis = Some(analysis(0.9, DataQuality::Medium));
        assert!(!run.should_skip_review(&config));

        run.analysis = Some(analysis(0.9, DataQuality::High));
        assert!(run.should_skip_review(&config));

        run.analysis = Some(analysis(0.2, DataQuality::Low));
        assert!(run.should_skip_review(&config.clone().with_fast_mode(true)));
    }

    #[test]
    fn test_complete_is_terminal() {
        assert!(WorkflowState::Complete.is_terminal());
        assert!(!WorkflowState::Summarize.is_terminal());
        assert_eq!(WorkflowState::ValidateResults.to_string(), "validate_results");
    }
}
