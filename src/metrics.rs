// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! The pipeline never touches a global registry directly: it records through
//! the [`MetricsRecorder`] handle it was constructed with. [`PipelineMetrics`]
//! forwards to the `metrics` facade, so whichever exporter the entry point
//! installs (Prometheus, statsd, ...) receives them.
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `datapipe_` and labelled with `pipeline`:
//! - `datapipe_events_processed_total{operation}`
//! - `datapipe_events_errored_total{component, error_type}`
//! - `datapipe_event_processing_duration_seconds{component}`
//! - `datapipe_pipeline_status`, `datapipe_source_connected`, `datapipe_sink_connected` (0/1 gauges)
//!
//! # Usage
//!
//! ```rust,no_run
//! use data_pipe::metrics::{MetricsRecorder, PipelineMetrics};
//! use data_pipe::event::Operation;
//!
//! let metrics = PipelineMetrics::new("users-to-pg");
//! metrics.record_event_processed(Operation::Insert);
//! ```

use crate::error::Component;
use crate::event::Operation;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Recording surface used by the pipeline and reconciler.
pub trait MetricsRecorder: Send + Sync + 'static {
    /// An event made it through the transform stage.
    fn record_event_processed(&self, operation: Operation);

    /// A component reported an error.
    fn record_event_error(&self, component: Component, error_type: &str);

    /// Time spent in a step (`source_connect`, `sink_connect`, `transform`, ...).
    fn record_processing_duration(&self, step: &str, duration: Duration);

    fn set_pipeline_running(&self, running: bool);

    fn set_source_connected(&self, connected: bool);

    fn set_sink_connected(&self, connected: bool);
}

/// Recorder that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_event_processed(&self, _operation: Operation) {}
    fn record_event_error(&self, _component: Component, _error_type: &str) {}
    fn record_processing_duration(&self, _step: &str, _duration: Duration) {}
    fn set_pipeline_running(&self, _running: bool) {}
    fn set_source_connected(&self, _connected: bool) {}
    fn set_sink_connected(&self, _connected: bool) {}
}

/// Recorder bound to one pipeline name, emitting through the `metrics` crate.
#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pipeline: String,
}

impl PipelineMetrics {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
        }
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }
}

fn flag(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

impl MetricsRecorder for PipelineMetrics {
    fn record_event_processed(&self, operation: Operation) {
        counter!(
            "datapipe_events_processed_total",
            "pipeline" => self.pipeline.clone(),
            "operation" => operation.as_str()
        )
        .increment(1);
    }

    fn record_event_error(&self, component: Component, error_type: &str) {
        counter!(
            "datapipe_events_errored_total",
            "pipeline" => self.pipeline.clone(),
            "component" => component.as_str(),
            "error_type" => error_type.to_string()
        )
        .increment(1);
    }

    fn record_processing_duration(&self, step: &str, duration: Duration) {
        histogram!(
            "datapipe_event_processing_duration_seconds",
            "pipeline" => self.pipeline.clone(),
            "component" => step.to_string()
        )
        .record(duration.as_secs_f64());
    }

    fn set_pipeline_running(&self, running: bool) {
        gauge!("datapipe_pipeline_status", "pipeline" => self.pipeline.clone()).set(flag(running));
    }

    fn set_source_connected(&self, connected: bool) {
        gauge!("datapipe_source_connected", "pipeline" => self.pipeline.clone())
            .set(flag(connected));
    }

    fn set_sink_connected(&self, connected: bool) {
        gauge!("datapipe_sink_connected", "pipeline" => self.pipeline.clone()).set(flag(connected));
    }
}
