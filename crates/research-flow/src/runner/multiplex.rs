//! Fan-in of many runs' progress onto one ordered stream
//!
//! Each run reports through its own [`ChannelSink`](crate::research::ChannelSink);
//! the multiplexer merges those receivers plus a terminal channel into one
//! bounded output, tagging every event with the run it came from. When no
//! event arrives for `heartbeat` it emits [`StreamEvent::Heartbeat`]. The
//! output closes once every source has closed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

use crate::research::{ProgressEvent, ResearchResult};

/// One element of the multiplexed stream
///
/// Serialized flat: progress events keep their own `type` and gain `run_id`;
/// the others are `{"type": "heartbeat" | "complete" | "error", ...}`.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Progress { run_id: String, event: ProgressEvent },
    Heartbeat { timestamp: DateTime<Utc> },
    Complete { run_id: String, result: Box<ResearchResult> },
    Error { run_id: String, message: String },
}

impl StreamEvent {
    pub fn heartbeat() -> Self {
        Self::Heartbeat { timestamp: Utc::now() }
    }

    pub fn complete(run_id: impl Into<String>, result: ResearchResult) -> Self {
        Self::Complete {
            run_id: run_id.into(),
            result: Box::new(result),
        }
    }

    pub fn error(run_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            run_id: run_id.into(),
            message: message.into(),
        }
    }

    /// Originating run, none for heartbeats
    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::Progress { run_id, .. } | Self::Complete { run_id, .. } | Self::Error { run_id, .. } => Some(run_id),
            Self::Heartbeat { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Progress { run_id, event } => {
                let mut value = event.to_json();
                if let Value::Object(map) = &mut value {
                    map.insert("run_id".into(), Value::String(run_id.clone()));
                }
                value
            }
            Self::Heartbeat { timestamp } => json!({ "type": "heartbeat", "timestamp": timestamp }),
            Self::Complete { run_id, result } => json!({
                "type": "complete",
                "run_id": run_id,
                "result": serde_json::to_value(result.as_ref()).unwrap_or(Value::Null),
            }),
            Self::Error { run_id, message } => json!({
                "type": "error",
                "run_id": run_id,
                "message": message,
            }),
        }
    }
}

impl Serialize for StreamEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Merges per-run progress receivers into one bounded stream
pub struct Multiplexer {
    sources: Vec<BoxStream<'static, StreamEvent>>,
    terminal_tx: mpsc::UnboundedSender<StreamEvent>,
    terminal_rx: mpsc::UnboundedReceiver<StreamEvent>,
    heartbeat: Duration,
    buffer: usize,
}

fn drain<T: Send + 'static>(rx: mpsc::UnboundedReceiver<T>) -> BoxStream<'static, T> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}

impl Multiplexer {
    pub fn new(heartbeat: Duration, buffer: usize) -> Self {
        let (terminal_tx, terminal_rx) = mpsc::unbounded_channel();
        Self {
            sources: Vec::new(),
            terminal_tx,
            terminal_rx,
            heartbeat,
            buffer: buffer.max(1),
        }
    }

    /// Register a run's progress receiver under `run_id`
    pub fn add(&mut self, run_id: impl Into<String>, events: mpsc::UnboundedReceiver<ProgressEvent>) {
        let run_id = run_id.into();
        self.sources.push(
            drain(events)
                .map(move |event| StreamEvent::Progress {
                    run_id: run_id.clone(),
                    event,
                })
                .boxed(),
        );
    }

    /// Sender for `Complete`/`Error` events; the stream stays open while any
    /// clone is alive
    pub fn terminal_sender(&self) -> mpsc::UnboundedSender<StreamEvent> {
        self.terminal_tx.clone()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Start the aggregator task
    pub fn spawn(self) -> (mpsc::Receiver<StreamEvent>, JoinHandle<usize>) {
        let Self {
            mut sources,
            terminal_tx,
            terminal_rx,
            heartbeat,
            buffer,
        } = self;
        drop(terminal_tx);
        sources.push(drain(terminal_rx));

        let (out_tx, out_rx) = mpsc::channel(buffer);
        let handle = tokio::spawn(async move {
            let mut merged = stream::select_all(sources);
            let mut forwarded = 0usize;
            loop {
                let event = match timeout(heartbeat, merged.next()).await {
                    Ok(Some(event)) => event,
                    Ok(None) => break,
                    Err(_) => StreamEvent::heartbeat(),
                };
                if out_tx.send(event).await.is_err() {
                    debug!("Multiplexed stream receiver dropped");
                    break;
                }
                forwarded += 1;
            }
            debug!(forwarded, "Multiplexer finished");
            forwarded
        });

        (out_rx, handle)
    }
}
