//! Shared, read-only collaborators for every run
//!
//! [`AgentContext`] owns the corpus, its index and the oracle. Orchestrators
//! built from it share those by `Arc`; each run still owns its own state.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::llm::{RateLimitedOracle, ReasoningOracle};
use crate::research::{ModelSelection, ResearchOrchestrator, StepExecutor, WorkflowConfig};
use crate::retrieval::{Corpus, InMemoryIndex, RetrievalEngine};

#[derive(Clone)]
pub struct AgentContext {
    corpus: Arc<Corpus>,
    retrieval: Arc<dyn RetrievalEngine>,
    oracle: Arc<dyn ReasoningOracle>,
    models: ModelSelection,
    config: WorkflowConfig,
}

impl AgentContext {
    /// Index the corpus and use default models and thresholds
    pub fn new(corpus: Corpus, oracle: Arc<dyn ReasoningOracle>) -> Self {
        let index = InMemoryIndex::new(&corpus);
        info!(documents = corpus.len(), oracle = oracle.name(), "Agent context ready");
        Self {
            corpus: Arc::new(corpus),
            retrieval: Arc::new(index),
            oracle,
            models: ModelSelection::default(),
            config: WorkflowConfig::default(),
        }
    }

    /// Use a custom retrieval engine instead of the in-memory index
    pub fn with_retrieval(mut self, retrieval: Arc<dyn RetrievalEngine>) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn with_models(mut self, models: ModelSelection) -> Self {
        self.models = models;
        self
    }

    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound in-flight oracle calls across every orchestrator built from here
    pub fn with_call_limit(mut self, max_in_flight: usize) -> Self {
        self.oracle = Arc::new(RateLimitedOracle::new(self.oracle, max_in_flight));
        self
    }

    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    pub fn retrieval(&self) -> &Arc<dyn RetrievalEngine> {
        &self.retrieval
    }

    pub fn oracle(&self) -> &Arc<dyn ReasoningOracle> {
        &self.oracle
    }

    pub fn models(&self) -> &ModelSelection {
        &self.models
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Orchestrator with the context's models and config
    pub fn orchestrator(&self) -> Result<ResearchOrchestrator> {
        self.orchestrator_with(self.models.clone(), self.config.clone())
    }

    /// Orchestrator sharing this context's oracle and index but with its own
    /// models and thresholds
    pub fn orchestrator_with(&self, models: ModelSelection, config: WorkflowConfig) -> Result<ResearchOrchestrator> {
        config.validate()?;
        let executor = StepExecutor::new(self.oracle.clone(), self.retrieval.clone(), models, config);
        Ok(ResearchOrchestrator::new(executor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OracleError, WorkflowError};
    use crate::llm::{OracleRequest, OracleResponse};
    use crate::retrieval::Document;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl ReasoningOracle for Silent {
        async fn complete(&self, _request: &OracleRequest) -> std::result::Result<OracleResponse, OracleError> {
            Err(OracleError::Timeout)
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    fn context() -> AgentContext {
        let corpus = Corpus::from_documents(vec![Document::new("a", "rust async")]).unwrap();
        AgentContext::new(corpus, Arc::new(Silent))
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = WorkflowConfig::default().with_hybrid_alpha(1.5);
        let err = context().orchestrator_with(ModelSelection::default(), bad).err().unwrap();
        assert!(matches!(err, WorkflowError::Config(_)));
    }

    #[test]
    fn test_call_limit_keeps_oracle_name() {
        let ctx = context().with_call_limit(2);
        assert_eq!(ctx.oracle().name(), "silent");
        assert_eq!(ctx.corpus().len(), 1);
    }

    #[test]
    fn test_orchestrator_runs_against_context() {
        let orchestrator = context().orchestrator().unwrap();
        let result = tokio_test::block_on(orchestrator.run("rust", &crate::research::NullSink));
        assert_eq!(result.results_count, 1);
        assert_eq!(result.total_tokens, 0);
    }
}
