//! Runner configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::WorkflowError;

/// Oracle providers throttle hard above a handful of parallel requests
const MAX_DEFAULT_CALLS: usize = 3;

/// Limits for batch and comparison runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Oracle calls in flight across every run
    pub max_concurrent_calls: usize,

    /// Runs executing at once in parallel batch mode
    pub workers: usize,

    /// Wall-clock budget per run; the run is abandoned after it
    #[serde(with = "humantime_serde")]
    pub run_timeout: Duration,

    /// Pause between runs in sequential batch mode
    #[serde(with = "humantime_serde")]
    pub sequential_delay: Duration,

    /// Silence after which the multiplexer emits a heartbeat
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,

    /// Capacity of the multiplexed output channel
    pub event_buffer: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: num_cpus::get().min(MAX_DEFAULT_CALLS),
            workers: 3,
            run_timeout: Duration::from_secs(300),
            sequential_delay: Duration::from_secs(1),
            heartbeat_interval: Duration::from_millis(500),
            event_buffer: 256,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_sequential_delay(mut self, delay: Duration) -> Self {
        self.sequential_delay = delay;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.max_concurrent_calls == 0 || self.workers == 0 {
            return Err(WorkflowError::config("max_concurrent_calls and workers must be at least 1"));
        }
        if self.run_timeout.is_zero() || self.heartbeat_interval.is_zero() {
            return Err(WorkflowError::config("run_timeout and heartbeat_interval must be non-zero"));
        }
        if self.event_buffer == 0 {
            return Err(WorkflowError::config("event_buffer must be at least 1"));
        }
        Ok(())
    }
}
