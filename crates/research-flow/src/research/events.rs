//! Progress events and sinks
//!
//! The orchestrator pushes one [`ProgressEvent`] per phase start, completion or
//! skip into a [`ProgressSink`]. Emission is synchronous and never blocks; a
//! sink that bridges to another task does so through an unbounded channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Stable phase vocabulary of the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPhase {
    Planning,
    Executing,
    Validating,
    Analyzing,
    Evaluating,
    Replanning,
    Refining,
    Critiquing,
    Summarizing,
}

impl EventPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Validating => "validating",
            Self::Analyzing => "analyzing",
            Self::Evaluating => "evaluating",
            Self::Replanning => "replanning",
            Self::Refining => "refining",
            Self::Critiquing => "critiquing",
            Self::Summarizing => "summarizing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Started,
    Completed,
    Skipped,
}

/// One progress event
///
/// Serializes flat: `{"type": phase, "timestamp", "status", ...payload, "summary"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub phase: EventPhase,
    pub timestamp: DateTime<Utc>,
    pub status: EventStatus,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    pub summary: String,
}

impl ProgressEvent {
    pub fn new(phase: EventPhase, status: EventStatus, summary: impl Into<String>) -> Self {
        Self {
            phase,
            timestamp: Utc::now(),
            status,
            payload: Map::new(),
            summary: summary.into(),
        }
    }

    pub fn started(phase: EventPhase, summary: impl Into<String>) -> Self {
        Self::new(phase, EventStatus::Started, summary)
    }

    pub fn completed(phase: EventPhase, summary: impl Into<String>) -> Self {
        Self::new(phase, EventStatus::Completed, summary)
    }

    pub fn skipped(phase: EventPhase, summary: impl Into<String>) -> Self {
        Self::new(phase, EventStatus::Skipped, summary)
    }

    /// Attach a phase-specific field
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Push interface the orchestrator reports progress to
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Logs every event at debug level
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    label: Option<String>,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag records with a run or strategy label
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }
}

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        debug!(
            label = self.label.as_deref().unwrap_or("-"),
            phase = event.phase.as_str(),
            status = ?event.status,
            summary = %event.summary,
            "Progress"
        );
    }
}

/// Forwards events into an unbounded channel
///
/// Sending never blocks; events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }

    /// Sink plus the receiving half
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Events of one phase, in emission order
    pub fn of_phase(&self, phase: EventPhase) -> Vec<ProgressEvent> {
        self.events().into_iter().filter(|e| e.phase == phase).collect()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_flat() {
        let event = ProgressEvent::completed(EventPhase::Executing, "Retrieved 3 relevant items")
            .with("results_count", 3);
        let json = event.to_json();

        assert_eq!(json["type"], "executing");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["results_count"], 3);
        assert_eq!(json["summary"], "Retrieved 3 relevant items");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.emit(ProgressEvent::started(EventPhase::Planning, "a"));
        sink.emit(ProgressEvent::completed(EventPhase::Planning, "b"));
        sink.emit(ProgressEvent::skipped(EventPhase::Evaluating, "c"));

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].status, EventStatus::Completed);
        assert_eq!(sink.of_phase(EventPhase::Planning).len(), 2);
    }

    #[tokio::test]
    async fn test_channel_sink_survives_dropped_receiver() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.emit(ProgressEvent::started(EventPhase::Analyzing, "x"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.phase, EventPhase::Analyzing);

        drop(rx);
        sink.emit(ProgressEvent::started(EventPhase::Analyzing, "ignored"));
    }
}
