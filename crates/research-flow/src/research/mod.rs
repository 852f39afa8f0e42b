//! Research workflow
//!
//! The confidence-gated state machine and everything it operates on:
//!
//! ```text
//! Plan → Execute → ValidateResults → Analyze → Evaluate → Refine → Critique → Summarize → Complete
//!  ▲                 │    │                        │        │  ▲       │
//!  └───── replan ────┘    └──── staged refine ─────┼───────►┘  │       │
//!  └────────────────────── replan ─────────────────┘           │       │
//!                     ValidateResults ◄── executed refinement ─┘       │
//!                                          Refine ◄── failed critique ─┘
//! ```
//!
//! - [`WorkflowRun`]: per-run state, counters and audit history
//! - [`next_transition`]: pure transition rules, guarded by three ceilings
//! - [`StepExecutor`]: one oracle-backed operation per phase, each with a
//!   conservative fallback
//! - [`ResearchOrchestrator`]: drives a run to Complete and emits
//!   [`ProgressEvent`]s to a [`ProgressSink`]

pub mod config;
pub mod events;
pub mod history;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod prompts;
pub mod result_set;
pub mod state;
pub mod steps;

pub use config::{ModelSelection, WorkflowConfig, DEFAULT_MODEL};
pub use events::{
    ChannelSink, CollectingSink, EventPhase, EventStatus, NullSink, ProgressEvent, ProgressSink, TracingSink,
};
pub use history::{ExecutionHistory, ExecutionStep, DECISION_MODEL, RETRIEVAL_MODEL};
pub use model::{
    Analysis, Complexity, Critique, DataQuality, Evaluation, Plan, PlanStep, QueryType, Refinement,
    SearchMethod, SentimentHistogram, StepAction, ToolHint, Validation, ValidationAction,
};
pub use orchestrator::{ResearchOrchestrator, ResearchResult};
pub use prompts::WorkflowPrompts;
pub use result_set::ResultSet;
pub use state::{next_transition, refine_gate, Effect, RefineGate, RefineOutcome, Transition, WorkflowRun, WorkflowState};
pub use steps::{StepExecutor, StepOutput, SUMMARY_FALLBACK};
