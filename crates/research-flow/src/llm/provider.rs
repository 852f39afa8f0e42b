//! Reasoning oracle trait definition
//!
//! Defines the request/response contract for the external reasoning service.
//! Step executors never see an `Err`: [`call_oracle`] folds client errors
//! into a failed [`OracleResponse`] so that `success` is the only failure signal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

use super::config::TokenUsage;
use crate::error::OracleError;

/// Message author role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Oracle request
///
/// # Example
///
/// ```
/// use research_flow::llm::OracleRequest;
///
/// let request = OracleRequest::new("grok-4-fast-reasoning")
///     .with_system_prompt("You are a research planner.")
///     .with_user_message("Plan a search for: rust async")
///     .with_json_mode(true)
///     .with_max_tokens(800);
///
/// assert_eq!(request.to_messages().len(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    /// Model identifier
    pub model: String,
    /// Ordered conversation messages
    pub messages: Vec<Message>,
    /// Optional system prompt, always sent first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Ask the service for a JSON object response
    pub json_mode: bool,
    pub max_tokens: u64,
    pub temperature: f64,
}

impl OracleRequest {
    /// Create a request for the given model with default sampling settings
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system_prompt: None,
            json_mode: false,
            max_tokens: 1500,
            temperature: 0.7,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_user_message(self, content: impl Into<String>) -> Self {
        self.with_message(Message::user(content))
    }

    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Messages as sent on the wire, system prompt first
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.extend(self.messages.iter().cloned());
        messages
    }

    /// Concatenated prompt text, used for token estimates
    pub fn prompt_text(&self) -> String {
        self.to_messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Oracle response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleResponse {
    /// Response text, or a bracketed error marker on failure
    pub content: String,
    /// Model that produced the response
    pub model: String,
    pub usage: TokenUsage,
    /// The only reliable failure signal
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OracleResponse {
    /// Successful response
    pub fn success(model: impl Into<String>, content: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage,
            success: true,
            error: None,
        }
    }

    /// Failed response carrying an `[Error: ...]` marker
    pub fn failure(model: impl Into<String>, error: &OracleError) -> Self {
        let message = error.to_string();
        Self {
            content: format!("[Error: {}]", message),
            model: model.into(),
            usage: TokenUsage::default(),
            success: false,
            error: Some(message),
        }
    }
}

/// Reasoning oracle trait
///
/// Stateless request/response function turning a prompt into structured or
/// free-text content. Implementations must be shareable across concurrent runs.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Perform one completion
    async fn complete(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Call the oracle and fold any error into a failed response
pub async fn call_oracle(oracle: &dyn ReasoningOracle, request: &OracleRequest) -> OracleResponse {
    match oracle.complete(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(oracle = oracle.name(), model = %request.model, error = %e, "Oracle call failed");
            OracleResponse::failure(&request.model, &e)
        }
    }
}

/// Oracle wrapper bounding the number of calls in flight
///
/// Every clone of the wrapped semaphore counts against the same limit, so one
/// instance shared by many runs caps concurrency across all of them.
pub struct RateLimitedOracle {
    inner: Arc<dyn ReasoningOracle>,
    permits: Arc<Semaphore>,
}

impl RateLimitedOracle {
    /// Wrap an oracle with a new limit
    pub fn new(inner: Arc<dyn ReasoningOracle>, max_in_flight: usize) -> Self {
        Self::with_semaphore(inner, Arc::new(Semaphore::new(max_in_flight.max(1))))
    }

    /// Wrap an oracle with an existing shared semaphore
    pub fn with_semaphore(inner: Arc<dyn ReasoningOracle>, permits: Arc<Semaphore>) -> Self {
        Self { inner, permits }
    }

    /// Currently unused permits
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl ReasoningOracle for RateLimitedOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| OracleError::Network(format!("limiter closed: {}", e)))?;
        self.inner.complete(request).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
