//! research-flow: confidence-gated research workflow engine
//!
//! A research run walks a fixed state machine (plan, retrieve, validate,
//! analyze, evaluate, refine, critique, summarize) where every phase is one
//! call to a reasoning oracle or the retrieval engine. Oracle failures fall
//! back to conservative defaults, so a run always completes.
//!
//! - [`ReasoningOracle`]: oracle seam, with an HTTP client and a call limiter
//! - [`RetrievalEngine`]: search seam, with an in-memory hybrid index
//! - [`ResearchOrchestrator`]: the state machine driver
//! - [`BatchRunner`] / [`StrategyComparison`]: bounded concurrent runs
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use research_flow::{AgentContext, Corpus, HttpOracle, HttpOracleConfig, TracingSink};
//!
//! let corpus = Corpus::from_json_file("data/posts.json")?;
//! let oracle = Arc::new(HttpOracle::new(HttpOracleConfig::new(api_key))?);
//! let context = AgentContext::new(corpus, oracle);
//!
//! let result = context.orchestrator()?.run("What do developers say about async Rust?", &TracingSink::new()).await;
//! println!("{}", result.final_summary);
//! ```

pub mod context;
pub mod error;
pub mod llm;
pub mod research;
pub mod retrieval;
pub mod runner;

pub use context::AgentContext;
pub use error::{OracleError, RetrievalError, WorkflowError};

pub use llm::{
    call_oracle, parse_json_response, HttpOracle, HttpOracleConfig, OracleRequest, OracleResponse,
    RateLimitedOracle, ReasoningOracle, TokenUsage,
};

pub use retrieval::{Corpus, Document, InMemoryIndex, MetadataFilter, RetrievalEngine, ScoredDocument};

pub use research::{
    ChannelSink, CollectingSink, EventPhase, EventStatus, ExecutionHistory, ExecutionStep, ModelSelection,
    NullSink, ProgressEvent, ProgressSink, ResearchOrchestrator, ResearchResult, TracingSink, WorkflowConfig,
    WorkflowState,
};

pub use runner::{
    AutonomyWeights, BatchMode, BatchQuery, BatchReport, BatchRunner, ComparisonReport, EvaluationMetrics,
    Multiplexer, RunnerConfig, StrategyComparison, StreamEvent, TaskOutcome,
};
