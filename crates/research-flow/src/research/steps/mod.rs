//! Step executors
//!
//! One async method per phase on [`StepExecutor`]. Each takes only the
//! inputs it needs, makes at most one oracle call, and returns the typed
//! phase output with the [`ExecutionStep`] audit record. Oracle failures are
//! replaced by documented fallbacks; nothing here returns an error.

mod analyze;
mod critique;
mod evaluate;
mod execute;
mod plan;
mod refine;
mod summarize;
mod validate;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::llm::{call_oracle, OracleRequest, OracleResponse, ReasoningOracle};
use crate::retrieval::{Document, RetrievalEngine};

use super::config::{ModelSelection, WorkflowConfig};
use super::history::ExecutionStep;

pub use summarize::SUMMARY_FALLBACK;

/// Phase output plus its audit record
#[derive(Debug, Clone)]
pub struct StepOutput<T> {
    pub value: T,
    pub record: ExecutionStep,
}

impl<T> StepOutput<T> {
    pub fn new(value: T, record: ExecutionStep) -> Self {
        Self { value, record }
    }
}

/// Runs individual workflow phases against the oracle and retrieval engine
#[derive(Clone)]
pub struct StepExecutor {
    oracle: Arc<dyn ReasoningOracle>,
    retrieval: Arc<dyn RetrievalEngine>,
    models: ModelSelection,
    config: WorkflowConfig,
}

impl StepExecutor {
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        retrieval: Arc<dyn RetrievalEngine>,
        models: ModelSelection,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            oracle,
            retrieval,
            models,
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelSelection {
        &self.models
    }

    /// One oracle round trip with the configured sampling parameters
    async fn ask(
        &self,
        model: &str,
        system: &str,
        user: String,
        json_mode: bool,
        max_tokens: u64,
    ) -> (OracleResponse, Duration) {
        let request = OracleRequest::new(model)
            .with_system_prompt(system)
            .with_user_message(user)
            .with_json_mode(json_mode)
            .with_max_tokens(max_tokens)
            .with_temperature(self.config.temperature);

        let started = Instant::now();
        let response = call_oracle(self.oracle.as_ref(), &request).await;
        (response, started.elapsed())
    }

    async fn ask_json(&self, model: &str, system: &str, user: String) -> (OracleResponse, Duration) {
        self.ask(model, system, user, true, self.config.max_tokens).await
    }
}

/// Cut text to at most `max_chars` characters on a word boundary, marking the cut with `...`
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();
    let head = match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}...", head.trim_end())
}

/// Numbered document sample for prompts
fn sample_documents(
    documents: &[Arc<Document>],
    size: usize,
    max_chars: usize,
    with_engagement: bool,
) -> String {
    let mut out = format!("Retrieved {} items. Sample:\n\n", documents.len());
    for (i, doc) in documents.iter().take(size).enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, truncate_text(&doc.text, max_chars)));
        let author = if doc.author.display_name.is_empty() {
            "Unknown"
        } else {
            doc.author.display_name.as_str()
        };
        out.push_str(&format!("   Author: {}\n", author));
        if with_engagement {
            out.push_str(&format!("   Engagement: {} total\n", doc.engagement.total()));
        }
        out.push_str(&format!("   Sentiment: {}\n\n", doc.sentiment));
    }
    out
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the executor tests

    use super::*;
    use crate::error::OracleError;
    use crate::llm::TokenUsage;
    use crate::retrieval::{Author, Corpus, Engagement, InMemoryIndex, Sentiment};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns the same content (or failure) for every call and keeps the requests
    pub struct StaticOracle {
        content: Option<String>,
        pub requests: Mutex<Vec<OracleRequest>>,
    }

    impl StaticOracle {
        pub fn replying(content: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                content: Some(content.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                content: None,
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ReasoningOracle for StaticOracle {
        async fn complete(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.content {
                Some(content) => Ok(OracleResponse::success(&request.model, content, TokenUsage::new(40, 10))),
                None => Err(OracleError::ServerError {
                    status: 503,
                    message: "unavailable".into(),
                }),
            }
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    pub fn corpus() -> Corpus {
        let author = |name: &str, verified: bool| Author {
            username: name.to_lowercase(),
            display_name: name.to_string(),
            verified,
            ..Default::default()
        };
        Corpus::from_documents(vec![
            Document::new("t1", "Rust async runtimes are getting faster every release")
                .with_author(author("Ferris", true))
                .with_sentiment(Sentiment::Positive)
                .with_engagement(Engagement {
                    likes: 150,
                    ..Default::default()
                }),
            Document::new("t2", "Async rust compile times are painful")
                .with_author(author("Dev", false))
                .with_sentiment(Sentiment::Negative),
            Document::new("t3", "Python notebooks for data science")
                .with_author(author("Ana", false)),
            Document::new("t4", "Tokio scheduler deep dive for async rust services")
                .with_author(author("Tok", true))
                .with_sentiment(Sentiment::Positive),
        ])
        .unwrap()
    }

    pub fn executor(oracle: Arc<dyn ReasoningOracle>) -> StepExecutor {
        executor_with(oracle, WorkflowConfig::default())
    }

    pub fn executor_with(oracle: Arc<dyn ReasoningOracle>, config: WorkflowConfig) -> StepExecutor {
        let index = Arc::new(InMemoryIndex::new(&corpus()));
        StepExecutor::new(oracle, index, ModelSelection::default(), config)
    }

    pub fn documents() -> Vec<Arc<Document>> {
        corpus().documents().to_vec()
    }
}
