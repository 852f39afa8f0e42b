//! OpenAI-compatible chat completions client
//!
//! Talks to any `/chat/completions` endpoint (xAI, OpenAI, local proxies).
//! Transient failures are retried with exponential backoff.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::{HttpOracleConfig, TokenUsage};
use super::provider::{Message, OracleRequest, OracleResponse, ReasoningOracle};
use crate::error::OracleError;

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u64,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// HTTP reasoning oracle
///
/// # Example
///
/// ```rust,ignore
/// use research_flow::llm::{HttpOracle, HttpOracleConfig};
///
/// let oracle = HttpOracle::new(HttpOracleConfig::new(std::env::var("ORACLE_API_KEY")?))?;
/// ```
pub struct HttpOracle {
    client: Client,
    config: HttpOracleConfig,
}

impl HttpOracle {
    /// Create a client; fails when no API key is configured
    pub fn new(config: HttpOracleConfig) -> Result<Self, OracleError> {
        if config.api_key.trim().is_empty() {
            return Err(OracleError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| OracleError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpOracleConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base)
    }

    async fn execute_with_retry(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let mut last_error = OracleError::Network("No attempts made".to_string());

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.delay_for_attempt(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying oracle request");
                tokio::time::sleep(delay).await;
            }

            match self.execute_single_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    warn!(attempt, model = %request.model, error = %e, "Oracle request failed, will retry");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn execute_single_request(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let body = ChatRequest {
            model: &request.model,
            messages: request.to_messages(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let chat: ChatResponse = response
                .json()
                .await
                .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
            return Ok(self.into_oracle_response(request, chat));
        }

        let message = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OracleError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => OracleError::RateLimited,
            StatusCode::BAD_REQUEST => OracleError::BadRequest(message),
            s if s.is_server_error() => OracleError::ServerError {
                status: s.as_u16(),
                message,
            },
            s => OracleError::InvalidResponse(format!("unexpected status {}: {}", s, message)),
        })
    }

    fn into_oracle_response(&self, request: &OracleRequest, chat: ChatResponse) -> OracleResponse {
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let usage = match chat.usage {
            Some(u) if u.prompt_tokens + u.completion_tokens > 0 => {
                TokenUsage::new(u.prompt_tokens, u.completion_tokens)
            }
            _ => TokenUsage::estimate(&request.prompt_text(), &content),
        };

        let model = chat.model.unwrap_or_else(|| request.model.clone());
        OracleResponse::success(model, content, usage)
    }
}

#[async_trait]
impl ReasoningOracle for HttpOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        self.execute_with_retry(request).await
    }

    fn name(&self) -> &str {
        "http"
    }
}
