//! JSON recovery for untrusted oracle output
//!
//! Strategies are tried in order until one yields parseable JSON:
//! the raw text, the body of a fenced code block, then the span between the
//! first `{` and the last `}`. When every strategy fails the raw text is kept
//! under [`RAW_RESPONSE_KEY`] so downstream code never sees an absent object.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::debug;

/// Sentinel key holding unparseable oracle output
pub const RAW_RESPONSE_KEY: &str = "raw_response";

/// Recovery strategy that produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Text parsed as-is
    Direct,
    /// Body of a ```json fenced block
    CodeFence,
    /// First `{` to last `}`
    BraceSpan,
    /// Nothing parsed; raw text wrapped under the sentinel key
    RawWrapped,
}

/// Result of a recovery attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    pub strategy: RecoveryStrategy,
}

impl Recovered {
    /// Whether a real JSON document was recovered
    pub fn is_parsed(&self) -> bool {
        self.strategy != RecoveryStrategy::RawWrapped
    }
}

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)\n?\s*```").ok())
        .as_ref()
}

fn strip_code_fence(text: &str) -> Option<&str> {
    fence_pattern()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Recover a JSON value from oracle text
pub fn recover_json(content: &str) -> Recovered {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Recovered {
            value,
            strategy: RecoveryStrategy::Direct,
        };
    }

    if let Some(body) = strip_code_fence(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            return Recovered {
                value,
                strategy: RecoveryStrategy::CodeFence,
            };
        }
    }

    if let Some(span) = brace_span(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return Recovered {
                value,
                strategy: RecoveryStrategy::BraceSpan,
            };
        }
    }

    debug!(len = content.len(), "Oracle output is not JSON, wrapping raw text");
    let mut wrapped = Map::new();
    wrapped.insert(RAW_RESPONSE_KEY.to_string(), Value::String(content.to_string()));
    Recovered {
        value: Value::Object(wrapped),
        strategy: RecoveryStrategy::RawWrapped,
    }
}

/// Recover a JSON value, discarding which strategy succeeded
pub fn parse_json_response(content: &str) -> Value {
    recover_json(content).value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_parse() {
        let recovered = recover_json(r#"{"confidence": 0.7}"#);
        assert_eq!(recovered.strategy, RecoveryStrategy::Direct);
        assert_eq!(recovered.value, json!({"confidence": 0.7}));
    }

    #[test]
    fn test_fenced_json_block() {
        let recovered = recover_json("```json\n{\"confidence\":0.9}\n```");
        assert_eq!(recovered.strategy, RecoveryStrategy::CodeFence);
        assert_eq!(recovered.value, json!({"confidence": 0.9}));
    }

    #[test]
    fn test_bare_fence_with_prose() {
        let text = "Here you go:\n```\n{\"steps\": []}\n```\nHope this helps";
        assert_eq!(parse_json_response(text), json!({"steps": []}));
    }

    #[test]
    fn test_brace_span_inside_prose() {
        let text = "Sure! The result is {\"relevance_score\": 0.2, \"action\": \"replan\"} as requested.";
        let recovered = recover_json(text);
        assert_eq!(recovered.strategy, RecoveryStrategy::BraceSpan);
        assert_eq!(recovered.value["action"], "replan");
    }

    #[test]
    fn test_unparseable_is_wrapped() {
        let recovered = recover_json("I cannot answer that {not json");
        assert!(!recovered.is_parsed());
        assert_eq!(recovered.value[RAW_RESPONSE_KEY], "I cannot answer that {not json");
    }

    #[test]
    fn test_empty_content_is_wrapped() {
        let value = parse_json_response("");
        assert_eq!(value, json!({"raw_response": ""}));
    }
}
