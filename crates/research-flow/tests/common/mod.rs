//! Shared fixtures for the integration tests
//!
//! - [`ScriptedOracle`]: canned replies keyed by the workflow role a request
//!   is for (recognized from its system prompt)
//! - [`CountingOracle`]: wraps another oracle and records peak concurrency
//! - [`corpus`]: a small post corpus about async Rust

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use research_flow::retrieval::{Author, Engagement, Sentiment};
use research_flow::{Corpus, Document, OracleError, OracleRequest, OracleResponse, ReasoningOracle, TokenUsage};

/// Workflow role a request was made for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Persona {
    Planner,
    Validator,
    Analyst,
    Evaluator,
    Refiner,
    Critic,
    Summarizer,
}

impl Persona {
    pub fn of(request: &OracleRequest) -> Option<Self> {
        let system = request.system_prompt.as_deref().unwrap_or_default();
        [
            ("expert research planner", Self::Planner),
            ("relevance validator", Self::Validator),
            ("research analyst", Self::Analyst),
            ("strategy evaluator", Self::Evaluator),
            ("refinement specialist", Self::Refiner),
            ("critique specialist", Self::Critic),
            ("summarization expert", Self::Summarizer),
        ]
        .into_iter()
        .find(|(phrase, _)| system.contains(phrase))
        .map(|(_, persona)| persona)
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail,
}

impl Reply {
    pub fn json(value: Value) -> Self {
        Self::Text(value.to_string())
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }
}

/// Replies per persona: queued replies first, then the persona's default
pub struct ScriptedOracle {
    queued: Mutex<HashMap<Persona, VecDeque<Reply>>>,
    defaults: HashMap<Persona, Reply>,
    calls: Mutex<Vec<Persona>>,
}

impl ScriptedOracle {
    /// A well-behaved oracle: one search plan, relevant results, medium
    /// confidence, no replan or refinement, passing critique
    pub fn new() -> Self {
        let defaults = HashMap::from([
            (
                Persona::Planner,
                Reply::json(json!({
                    "query_type": "sentiment",
                    "steps": [
                        {"action": "search", "description": "async rust", "tool_hints": ["hybrid"]},
                        {"action": "analyze", "description": "summarize sentiment"}
                    ],
                    "expected_complexity": "medium"
                })),
            ),
            (
                Persona::Validator,
                Reply::json(json!({"relevance_score": 0.9, "action": "proceed", "reason": "on topic"})),
            ),
            (
                Persona::Analyst,
                Reply::json(json!({"main_themes": ["performance"], "confidence": 0.6, "data_quality": "medium"})),
            ),
            (Persona::Evaluator, Reply::json(json!({"replan_needed": false, "reason": "plan is sound"}))),
            (
                Persona::Refiner,
                Reply::json(json!({"refinement_needed": false, "reason": "sufficient"})),
            ),
            (Persona::Critic, Reply::json(json!({"critique_passed": true, "hallucinations": []}))),
            (Persona::Summarizer, Reply::text("Developers find async Rust fast but complex.")),
        ]);
        Self {
            queued: Mutex::new(HashMap::new()),
            defaults,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply used whenever nothing is queued for the persona
    pub fn always(mut self, persona: Persona, reply: Reply) -> Self {
        self.defaults.insert(persona, reply);
        self
    }

    /// Queue a one-off reply
    pub fn then(self, persona: Persona, reply: Reply) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(persona)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self, persona: Persona) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| **p == persona).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn reply_for(&self, persona: Persona) -> Reply {
        self.calls.lock().unwrap().push(persona);
        self.queued
            .lock()
            .unwrap()
            .get_mut(&persona)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.defaults.get(&persona).cloned())
            .unwrap_or(Reply::Fail)
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let persona = Persona::of(request)
            .ok_or_else(|| OracleError::BadRequest("unrecognized system prompt".into()))?;
        match self.reply_for(persona) {
            Reply::Text(content) => Ok(OracleResponse::success(&request.model, content, TokenUsage::new(30, 20))),
            Reply::Fail => Err(OracleError::ServerError {
                status: 500,
                message: "scripted failure".into(),
            }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Counts concurrent calls into the wrapped oracle
///
/// Each call sleeps for `delay` (longer when the prompt mentions a slow
/// marker) so overlapping runs actually overlap.
pub struct CountingOracle {
    inner: Arc<dyn ReasoningOracle>,
    delay: Duration,
    slow_marker: Option<(String, Duration)>,
    panic_marker: Option<String>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl CountingOracle {
    pub fn new(inner: Arc<dyn ReasoningOracle>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            slow_marker: None,
            panic_marker: None,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }

    /// Sleep `delay` instead when the prompt contains `marker`
    pub fn slow_on(mut self, marker: impl Into<String>, delay: Duration) -> Self {
        self.slow_marker = Some((marker.into(), delay));
        self
    }

    /// Panic when the prompt contains `marker`
    pub fn panic_on(mut self, marker: impl Into<String>) -> Self {
        self.panic_marker = Some(marker.into());
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningOracle for CountingOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let prompt = request.prompt_text();
        if let Some(marker) = &self.panic_marker {
            if prompt.contains(marker.as_str()) {
                panic!("oracle exploded on {}", marker);
            }
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);

        let delay = match &self.slow_marker {
            Some((marker, slow)) if prompt.contains(marker.as_str()) => *slow,
            _ => self.delay,
        };
        tokio::time::sleep(delay).await;
        let response = self.inner.complete(request).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }

    fn name(&self) -> &str {
        "counting"
    }
}

fn author(name: &str, verified: bool) -> Author {
    Author {
        username: name.to_lowercase(),
        display_name: name.to_string(),
        verified,
        ..Default::default()
    }
}

/// Six posts, four about async Rust
pub fn corpus() -> Corpus {
    Corpus::from_documents(vec![
        Document::new("p1", "Async rust runtimes keep getting faster with every tokio release")
            .with_author(author("Ferris", true))
            .with_sentiment(Sentiment::Positive)
            .with_engagement(Engagement {
                likes: 320,
                retweets: 40,
                ..Default::default()
            }),
        Document::new("p2", "Async rust compile times and pinning errors are painful")
            .with_author(author("Dev", false))
            .with_sentiment(Sentiment::Negative),
        Document::new("p3", "Tokio scheduler deep dive for async rust services")
            .with_author(author("Tok", true))
            .with_sentiment(Sentiment::Positive),
        Document::new("p4", "Oh great, another async rust runtime. Exactly what we needed")
            .with_author(author("Snark", false))
            .with_sentiment(Sentiment::Negative),
        Document::new("p5", "Python notebooks remain the default for data science")
            .with_author(author("Ana", false))
            .with_sentiment(Sentiment::Neutral),
        Document::new("p6", "Weekend hiking photos from the mountains").with_author(author("Hiker", false)),
    ])
    .expect("fixture corpus has unique ids")
}
