//! Error types for the research workflow engine
//!
//! Oracle and retrieval failures inside a run are recovered by the step
//! executors; only the errors below ever reach a caller.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a reasoning oracle client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    /// No credentials configured; no call can ever succeed
    #[error("Oracle API key is not configured")]
    MissingApiKey,

    #[error("Oracle rejected credentials")]
    Unauthorized,

    #[error("Oracle rate limit exceeded")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Oracle call timed out")]
    Timeout,
}

impl OracleError {
    /// Whether a retry has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError { .. } | Self::Network(_) | Self::Timeout
        )
    }
}

/// Errors raised while loading or indexing a corpus
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Failed to read corpus {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse corpus: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate document id in corpus: {0}")]
    DuplicateId(String),
}

/// Top-level workflow and runner errors
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Invalid configuration, detected before any run starts
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// A run exceeded its wall-clock budget and was abandoned
    #[error("Run timed out after {0:?}")]
    Timeout(Duration),

    /// A run panicked or its task was cancelled
    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Event channel closed: {0}")]
    Channel(String),
}

impl WorkflowError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a task failure error
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::TaskFailed(message.into())
    }

    /// Errors that must stop the process before the state machine is entered
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Oracle(OracleError::MissingApiKey) | Self::Retrieval(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(OracleError::RateLimited.is_retryable());
        assert!(OracleError::Timeout.is_retryable());
        assert!(OracleError::Network("reset".into()).is_retryable());
        assert!(OracleError::ServerError {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());

        assert!(!OracleError::Unauthorized.is_retryable());
        assert!(!OracleError::MissingApiKey.is_retryable());
        assert!(!OracleError::BadRequest("bad".into()).is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(WorkflowError::config("no corpus").is_fatal());
        assert!(WorkflowError::from(OracleError::MissingApiKey).is_fatal());
        assert!(!WorkflowError::from(OracleError::RateLimited).is_fatal());
        assert!(!WorkflowError::Timeout(Duration::from_secs(1)).is_fatal());
        assert!(!WorkflowError::task_failed("panic").is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = OracleError::ServerError {
            status: 502,
            message: "gateway".into(),
        };
        assert_eq!(err.to_string(), "Server error (502): gateway");

        let err = WorkflowError::Timeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }
}
