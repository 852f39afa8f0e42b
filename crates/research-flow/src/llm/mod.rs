//! Reasoning oracle abstraction
//!
//! - [`ReasoningOracle`]: request/response trait implemented by oracle clients
//! - [`HttpOracle`]: OpenAI-compatible chat completions client
//! - [`RateLimitedOracle`]: semaphore bound on in-flight calls
//! - [`parse`]: JSON recovery for untrusted oracle output

pub mod config;
pub mod http;
pub mod parse;
pub mod provider;

pub use config::{HttpOracleConfig, TokenUsage, DEFAULT_API_BASE};
pub use http::HttpOracle;
pub use parse::{parse_json_response, recover_json, Recovered, RecoveryStrategy, RAW_RESPONSE_KEY};
pub use provider::{
    call_oracle, Message, OracleRequest, OracleResponse, RateLimitedOracle, ReasoningOracle, Role,
};
