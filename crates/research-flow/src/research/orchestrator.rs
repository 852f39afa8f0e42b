//! Research orchestrator
//!
//! Drives one [`WorkflowRun`] from Plan to Complete. Each loop iteration runs
//! the current phase through the [`StepExecutor`], stores its output on the
//! run, then asks [`next_transition`] where to go. A run always completes;
//! oracle failures are absorbed by the executors and the transition fuse
//! forces Summarize if the visit count ever reaches the configured bound.

use std::borrow::Cow;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::config::WorkflowConfig;
use super::events::{EventPhase, ProgressEvent, ProgressSink};
use super::history::{ExecutionHistory, ExecutionStep};
use super::model::{Analysis, Critique, Evaluation, Plan, QueryType, Refinement, ValidationAction};
use super::state::{next_transition, refine_gate, Effect, RefineGate, RefineOutcome, WorkflowRun, WorkflowState};
use super::steps::{StepExecutor, StepOutput};

/// Everything a finished run reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub run_id: Uuid,
    pub query: String,
    pub plan: Option<Plan>,
    pub results_count: usize,
    pub document_ids: Vec<String>,
    pub analysis: Option<Analysis>,
    /// Confidence of the last analysis, 0 when none ran
    pub confidence: f64,
    pub refinement_iterations: usize,
    pub replan_count: usize,
    pub critique_refine_loops: usize,
    pub critique: Option<Critique>,
    pub final_summary: String,
    pub phases_visited: Vec<WorkflowState>,
    pub execution_steps: usize,
    pub total_tokens: u64,
    pub confidence_history: Vec<f64>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub history: ExecutionHistory,
}

impl ResearchResult {
    /// Critique passed, was skipped, or never ran
    pub fn critique_passed(&self) -> bool {
        !self.critique.as_ref().is_some_and(Critique::failed)
    }
}

/// State machine driver for single research runs
///
/// Cheap to clone; every clone shares the oracle and retrieval engine.
#[derive(Clone)]
pub struct ResearchOrchestrator {
    executor: StepExecutor,
}

fn keep<T>(run: &mut WorkflowRun, output: StepOutput<T>) -> T {
    run.history.record(output.record);
    output.value
}

fn plan_of(run: &WorkflowRun) -> Cow<'_, Plan> {
    match &run.plan {
        Some(plan) => Cow::Borrowed(plan),
        None => Cow::Owned(Plan::fallback(QueryType::Other)),
    }
}

impl ResearchOrchestrator {
    pub fn new(executor: StepExecutor) -> Self {
        Self { executor }
    }

    pub fn config(&self) -> &WorkflowConfig {
        self.executor.config()
    }

    /// Run the workflow for one query to completion
    pub async fn run(&self, query: &str, sink: &dyn ProgressSink) -> ResearchResult {
        let config = self.executor.config();
        let started = Instant::now();
        let bound = config.transition_bound();
        let mut run = WorkflowRun::new(query, config);
        run.history.reset();

        info!(run_id = %run.id, query = %query, bound, "Starting research workflow");

        while !run.state.is_terminal() {
            if run.phases_visited.len() >= bound && run.state != WorkflowState::Summarize {
                warn!(run_id = %run.id, visits = run.phases_visited.len(), "Transition bound reached, forcing summary");
                run.state = WorkflowState::Summarize;
            }
            run.phases_visited.push(run.state);
            info!(run_id = %run.id, phase = %run.state, "Entering phase");

            self.step(&mut run, sink).await;

            let transition = next_transition(&run, config);
            self.note_transition(&run, transition.effect, sink);
            run.apply(transition, config);
        }

        let result = self.compile(run, started);
        info!(
            run_id = %result.run_id,
            phases = result.phases_visited.len(),
            steps = result.execution_steps,
            tokens = result.total_tokens,
            confidence = result.confidence,
            "Research workflow complete"
        );
        result
    }

    async fn step(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) {
        match run.state {
            WorkflowState::Plan => self.plan(run, sink).await,
            WorkflowState::Execute => self.execute(run, sink).await,
            WorkflowState::ValidateResults => self.validate(run, sink).await,
            WorkflowState::Analyze => self.analyze(run, sink).await,
            WorkflowState::Evaluate => self.evaluate(run, sink).await,
            WorkflowState::Refine => self.refine(run, sink).await,
            WorkflowState::Critique => self.critique(run, sink).await,
            WorkflowState::Summarize => self.summarize(run, sink).await,
            WorkflowState::Complete => {}
        }
    }

    async fn plan(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) {
        sink.emit(ProgressEvent::started(EventPhase::Planning, "Analyzing query and creating plan..."));
        let output = self.executor.plan(&run.query).await;
        let plan = keep(run, output);

        let summary = format!(
            "Created a {} complexity plan for a {} query. Identified {} execution steps.",
            plan.complexity.as_str(),
            plan.query_type.as_str(),
            plan.steps.len()
        );
        sink.emit(
            ProgressEvent::completed(EventPhase::Planning, summary)
                .with("query_type", plan.query_type.as_str())
                .with("steps_count", plan.steps.len())
                .with("complexity", plan.complexity.as_str())
                .with("fallback", plan.is_fallback),
        );
        run.plan = Some(plan);
    }

    async fn execute(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) {
        sink.emit(ProgressEvent::started(EventPhase::Executing, "Retrieving relevant data..."));
        let plan = plan_of(run).into_owned();
        let output = self
            .executor
            .execute(WorkflowState::Execute, &run.query, &plan.steps, &run.results)
            .await;
        run.results = keep(run, output);

        sink.emit(
            ProgressEvent::completed(
                EventPhase::Executing,
                format!("Retrieved {} relevant items from the dataset.", run.results.len()),
            )
            .with("results_count", run.results.len()),
        );
    }

    async fn validate(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) {
        let config = self.executor.config();
        sink.emit(ProgressEvent::started(EventPhase::Validating, "Checking result relevance..."));
        let output = self.executor.validate(&run.query, &run.results).await;
        let validation = keep(run, output);

        run.staged_refinement = (validation.action == ValidationAction::Refine
            && validation.relevance_score < config.refine_relevance_below)
            .then(|| Refinement::with_steps(validation.reason.clone(), validation.recommendations.clone()));

        sink.emit(
            ProgressEvent::completed(
                EventPhase::Validating,
                format!("Relevance {:.2}: {}", validation.relevance_score, validation.reason),
            )
            .with("relevance_score", validation.relevance_score)
            .with("action", json!(validation.action))
            .with("results_count", run.results.len()),
        );
        run.validation = Some(validation);
    }

    async fn analyze(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) {
        sink.emit(ProgressEvent::started(EventPhase::Analyzing, "Analyzing retrieved data..."));
        run.staged_refinement = None;
        let plan = plan_of(run).into_owned();
        let output = self.executor.analyze(&run.query, &run.results, &plan).await;
        let analysis = keep(run, output);

        run.confidence_history.push(analysis.confidence);
        sink.emit(
            ProgressEvent::completed(
                EventPhase::Analyzing,
                format!("Analysis completed with {:.0}% confidence.", analysis.confidence * 100.0),
            )
            .with("confidence", analysis.confidence)
            .with("main_themes", json!(analysis.themes.iter().take(3).collect::<Vec<_>>()))
            .with("data_quality", json!(analysis.data_quality)),
        );
        run.analysis = Some(analysis);
    }

    async fn evaluate(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) {
        if run.should_skip_review(self.executor.config()) {
            let evaluation = Evaluation::skipped("Skipped for performance");
            run.history.record(
                ExecutionStep::new(WorkflowState::Evaluate, "Strategy Evaluation")
                    .with_input(json!({ "confidence": run.confidence() }))
                    .with_reasoning("Fast mode or high confidence with high data quality"),
            );
            sink.emit(
                ProgressEvent::skipped(EventPhase::Evaluating, "Evaluation skipped for performance")
                    .with("reason", "High confidence or fast mode"),
            );
            run.evaluation = Some(evaluation);
            return;
        }

        sink.emit(ProgressEvent::started(EventPhase::Evaluating, "Evaluating if replan needed..."));
        let plan = plan_of(run).into_owned();
        let analysis = run.analysis.clone().unwrap_or_else(Analysis::no_results);
        let output = self.executor.evaluate(&run.query, &plan, &analysis, &run.results).await;
        let evaluation = keep(run, output);

        let summary = if evaluation.replan_needed {
            format!("Strategy evaluation completed - Replan needed: {}", evaluation.reason)
        } else {
            "Strategy evaluation completed - Strategy is sound".to_string()
        };
        sink.emit(
            ProgressEvent::completed(EventPhase::Evaluating, summary)
                .with("replan_needed", evaluation.replan_needed)
                .with("reason", evaluation.reason.as_str())
                .with("negative_ratio", evaluation.negative_ratio),
        );
        run.evaluation = Some(evaluation);
    }

    async fn refine(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) {
        let config = self.executor.config();
        match refine_gate(run, config) {
            RefineGate::Stop(outcome) => self.stop_refinement(run, outcome, sink),
            RefineGate::Staged => {
                let staged = run
                    .staged_refinement
                    .take()
                    .unwrap_or_else(|| Refinement::not_needed("No staged refinement"));
                run.history.record(
                    ExecutionStep::new(WorkflowState::Refine, "Refinement Check")
                        .with_output(serde_json::to_value(&staged).unwrap_or_default())
                        .with_reasoning(format!("Validator requested refinement: {}", staged.reason)),
                );
                self.run_refinement(run, staged, sink).await;
            }
            RefineGate::Consult { forced } => {
                sink.emit(
                    ProgressEvent::started(
                        EventPhase::Refining,
                        format!("Checking if refinement needed (iteration {})...", run.iteration_count + 1),
                    )
                    .with("iteration", run.iteration_count + 1)
                    .with("forced", forced),
                );
                let plan = plan_of(run).into_owned();
                let critique = if forced { run.critique.clone() } else { None };
                let output = self
                    .executor
                    .refine(&run.query, &plan, run.analysis.as_ref(), critique.as_ref(), forced)
                    .await;
                let refinement = keep(run, output);
                run.from_failed_critique = false;

                if refinement.needed && !refinement.next_steps.is_empty() {
                    self.run_refinement(run, refinement, sink).await;
                } else {
                    sink.emit(
                        ProgressEvent::completed(
                            EventPhase::Refining,
                            format!("No refinement needed: {}", refinement.reason),
                        )
                        .with("refinement_needed", false),
                    );
                    run.refinement = Some(refinement);
                    run.refine_outcome = Some(RefineOutcome::NotNeeded);
                }
            }
        }
    }

    fn stop_refinement(&self, run: &mut WorkflowRun, outcome: RefineOutcome, sink: &dyn ProgressSink) {
        let reason = match outcome {
            RefineOutcome::CeilingReached => "Maximum refinement iterations reached",
            RefineOutcome::Stagnated => "Confidence stagnated since the previous analysis",
            RefineOutcome::CritiqueLoopExhausted => "Critique-refine loop limit reached",
            RefineOutcome::Executed | RefineOutcome::NotNeeded => "Refinement not needed",
        };
        info!(run_id = %run.id, iterations = run.iteration_count, reason, "Refinement stopped");

        run.history.record(
            ExecutionStep::new(WorkflowState::Refine, "Refinement Check")
                .with_input(json!({
                    "iteration_count": run.iteration_count,
                    "confidence_history": run.confidence_history,
                }))
                .with_reasoning(reason),
        );
        sink.emit(ProgressEvent::skipped(EventPhase::Refining, reason).with("iteration", run.iteration_count));

        run.from_failed_critique = false;
        run.refine_outcome = Some(outcome);
    }

    async fn run_refinement(&self, run: &mut WorkflowRun, refinement: Refinement, sink: &dyn ProgressSink) {
        let config = self.executor.config();
        if !run.try_begin_iteration(config) {
            self.stop_refinement(run, RefineOutcome::CeilingReached, sink);
            return;
        }

        sink.emit(
            ProgressEvent::started(
                EventPhase::Refining,
                format!("Refinement iteration {}: {}", run.iteration_count, refinement.reason),
            )
            .with("iteration", run.iteration_count)
            .with("reason", refinement.reason.as_str()),
        );

        let before = run.results.len();
        let output = self
            .executor
            .execute(WorkflowState::Refine, &run.query, &refinement.next_steps, &run.results)
            .await;
        run.results = keep(run, output);
        run.summary = None;

        sink.emit(
            ProgressEvent::completed(
                EventPhase::Refining,
                format!("Added {} new items", run.results.len() - before),
            )
            .with("iteration", run.iteration_count)
            .with("results_count", run.results.len()),
        );
        run.refinement = Some(refinement);
        run.refine_outcome = Some(RefineOutcome::Executed);
    }

    async fn critique(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) {
        if run.should_skip_review(self.executor.config()) {
            run.history.record(
                ExecutionStep::new(WorkflowState::Critique, "Critique")
                    .with_reasoning("Fast mode or high confidence with high data quality"),
            );
            sink.emit(
                ProgressEvent::skipped(EventPhase::Critiquing, "Critique skipped for performance")
                    .with("critique_passed", true),
            );
            run.critique = Some(Critique::skipped());
            return;
        }

        sink.emit(ProgressEvent::started(EventPhase::Critiquing, "Reviewing for hallucinations and bias..."));
        let draft = match run.summary.clone() {
            Some(draft) => draft,
            None => {
                let plan = plan_of(run).into_owned();
                let output = self
                    .executor
                    .summarize(WorkflowState::Critique, &run.query, Some(&plan), run.analysis.as_ref())
                    .await;
                keep(run, output)
            }
        };
        run.summary = Some(draft.clone());

        let output = self
            .executor
            .critique(&run.query, run.analysis.as_ref(), &run.results, &draft)
            .await;
        let critique = keep(run, output);

        let failed = critique.failed();
        let mut summary = format!("Critique {}", if failed { "found issues" } else { "passed" });
        if failed {
            if !critique.hallucinations.is_empty() {
                summary.push_str(&format!(" ({} hallucinations)", critique.hallucinations.len()));
            }
            if !critique.biases.is_empty() {
                summary.push_str(&format!(" ({} biases)", critique.biases.len()));
            }
        }
        sink.emit(
            ProgressEvent::completed(EventPhase::Critiquing, summary)
                .with("critique_passed", !failed)
                .with("hallucinations_count", critique.hallucinations.len())
                .with("biases_count", critique.biases.len()),
        );
        run.critique = Some(critique);
    }

    async fn summarize(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) {
        let revised = run
            .critique
            .as_ref()
            .filter(|c| c.failed())
            .and_then(|c| c.revised_summary.clone());

        if let Some(revised) = revised {
            run.history.record(
                ExecutionStep::new(WorkflowState::Summarize, "Summarization")
                    .with_output(json!({ "summary": revised }))
                    .with_reasoning("Applied the critique's revised summary"),
            );
            sink.emit(ProgressEvent::completed(EventPhase::Summarizing, "Applied critique corrections to the summary"));
            run.summary = Some(revised);
            return;
        }

        if run.summary.is_some() {
            sink.emit(ProgressEvent::skipped(EventPhase::Summarizing, "Summary already drafted during critique"));
            return;
        }

        sink.emit(ProgressEvent::started(EventPhase::Summarizing, "Generating final summary..."));
        let plan = run.plan.clone();
        let output = self
            .executor
            .summarize(WorkflowState::Summarize, &run.query, plan.as_ref(), run.analysis.as_ref())
            .await;
        let summary = keep(run, output);
        sink.emit(
            ProgressEvent::completed(EventPhase::Summarizing, "Summary complete")
                .with("length", summary.chars().count()),
        );
        run.summary = Some(summary);
    }

    fn note_transition(&self, run: &WorkflowRun, effect: Effect, sink: &dyn ProgressSink) {
        let config = self.executor.config();
        match effect {
            Effect::Replan => {
                let reason = match run.state {
                    WorkflowState::ValidateResults => run.validation.as_ref().map(|v| v.reason.clone()),
                    _ => run.evaluation.as_ref().map(|e| e.reason.clone()),
                }
                .unwrap_or_default();
                info!(run_id = %run.id, attempt = run.replan_count + 1, reason = %reason, "Replan triggered");
                sink.emit(
                    ProgressEvent::completed(EventPhase::Replanning, format!("Replanning due to: {}", reason))
                        .with("attempt", run.replan_count + 1)
                        .with("reason", reason),
                );
            }
            Effect::CritiqueLoop => {
                info!(
                    run_id = %run.id,
                    loop_count = run.critique_refine_loop_count + 1,
                    "Critique failed, forcing refinement"
                );
            }
            Effect::None => {
                let wanted_replan = match run.state {
                    WorkflowState::Evaluate => run.evaluation.as_ref().is_some_and(|e| e.replan_needed),
                    WorkflowState::ValidateResults => run
                        .validation
                        .as_ref()
                        .is_some_and(|v| v.relevance_score < config.replan_relevance_below),
                    _ => false,
                };
                if wanted_replan {
                    info!(run_id = %run.id, max_replans = config.max_replans, "Max replans reached, proceeding with current data");
                }
            }
        }
    }

    fn compile(&self, run: WorkflowRun, started: Instant) -> ResearchResult {
        let confidence = run.confidence();
        let final_summary = run
            .summary
            .unwrap_or_else(|| super::steps::SUMMARY_FALLBACK.to_string());

        ResearchResult {
            run_id: run.id,
            query: run.query,
            plan: run.plan,
            results_count: run.results.len(),
            document_ids: run.results.ids(),
            analysis: run.analysis,
            confidence,
            refinement_iterations: run.iteration_count,
            replan_count: run.replan_count,
            critique_refine_loops: run.critique_refine_loop_count,
            critique: run.critique,
            final_summary,
            phases_visited: run.phases_visited,
            execution_steps: run.history.len(),
            total_tokens: run.history.total_tokens(),
            confidence_history: run.confidence_history,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
            history: run.history,
        }
    }
}
