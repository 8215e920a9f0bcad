//! Pipeline state and status types.
//!
//! # State Transitions
//!
//! ```text
//!          run()              both connected
//! Idle ──────────► Connecting ───────────────► Running
//!                      │                          │ cancelled, or source
//!                      │ connect failed           │ stream closed
//!                      ▼                          ▼
//!                   Failed                     Draining
//!                                                 │ workers and error
//!                                                 │ drains returned
//!                                                 ▼
//!                                              Stopped
//! ```
//!
//! There are no retries: a failed `Connecting` ends in `Failed`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Lifecycle state of a [`Pipeline`](super::Pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed, `run()` not called yet.
    Idle,

    /// Connecting source, then sink.
    Connecting,

    /// Events are flowing.
    Running,

    /// Cancelled or source exhausted; waiting for workers to return.
    Draining,

    /// All workers returned and connections are closed.
    Stopped,

    /// A connect call failed. Terminal.
    Failed,
}

impl PipelineState {
    /// Whether the pipeline has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Stopped | PipelineState::Failed)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Idle"),
            PipelineState::Connecting => write!(f, "Connecting"),
            PipelineState::Running => write!(f, "Running"),
            PipelineState::Draining => write!(f, "Draining"),
            PipelineState::Stopped => write!(f, "Stopped"),
            PipelineState::Failed => write!(f, "Failed"),
        }
    }
}

/// Connection flags and timing, guarded by the pipeline's status lock.
#[derive(Debug, Clone)]
pub struct PipelineStatus {
    pub source_connected: bool,
    pub sink_connected: bool,
    /// When the transform stage last received an event.
    pub last_event_time: Option<DateTime<Utc>>,
    pub start_time: Instant,
}

impl PipelineStatus {
    pub(crate) fn new() -> Self {
        Self {
            source_connected: false,
            sink_connected: false,
            last_event_time: None,
            start_time: Instant::now(),
        }
    }

    /// Healthy means both ends are connected.
    pub fn is_healthy(&self) -> bool {
        self.source_connected && self.sink_connected
    }

    /// Snapshot for health endpoints.
    pub fn health(&self) -> HealthStatus {
        let healthy = self.is_healthy();
        HealthStatus {
            healthy,
            pipeline_running: healthy,
            source_connected: self.source_connected,
            sink_connected: self.sink_connected,
            last_event_time: self
                .last_event_time
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

/// Serializable health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub pipeline_running: bool,
    pub source_connected: bool,
    pub sink_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_time: Option<String>,
    pub uptime_seconds: u64,
}
