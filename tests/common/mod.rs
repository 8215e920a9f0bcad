//! Shared test utilities for pipeline and reconciler tests.
//!
//! This module provides:
//! - Recording mock Source/Sink connectors
//! - A metrics recorder that counts calls
//! - Event helpers

#![allow(dead_code)]

pub mod mock_connectors;

pub use mock_connectors::*;

use data_pipe::metrics::MetricsRecorder;
use data_pipe::{record, Component, Event, Operation};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// `n` insert events with ids `"0".."n"` and an increasing `seq` field.
pub fn events(n: usize) -> Vec<Event> {
    (0..n).map(|i| event(i as i64)).collect()
}

/// Insert event whose id is `seq` as a string.
pub fn event(seq: i64) -> Event {
    Event::insert(seq.to_string(), record! { "seq" => seq, "name" => format!("user {seq}") })
        .with_origin("mock", "app", "users")
}

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Metrics recorder that keeps counts for assertions.
#[derive(Default)]
pub struct RecordingMetrics {
    processed: Mutex<HashMap<Operation, usize>>,
    errors: Mutex<HashMap<(Component, String), usize>>,
    durations: Mutex<Vec<String>>,
    running: Mutex<Vec<bool>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&self, operation: Operation) -> usize {
        self.processed
            .lock()
            .unwrap()
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn errors(&self, component: Component, error_type: &str) -> usize {
        self.errors
            .lock()
            .unwrap()
            .get(&(component, error_type.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn recorded_steps(&self) -> Vec<String> {
        self.durations.lock().unwrap().clone()
    }

    pub fn running_transitions(&self) -> Vec<bool> {
        self.running.lock().unwrap().clone()
    }
}

impl MetricsRecorder for RecordingMetrics {
    fn record_event_processed(&self, operation: Operation) {
        *self.processed.lock().unwrap().entry(operation).or_default() += 1;
    }

    fn record_event_error(&self, component: Component, error_type: &str) {
        *self
            .errors
            .lock()
            .unwrap()
            .entry((component, error_type.to_string()))
            .or_default() += 1;
    }

    fn record_processing_duration(&self, step: &str, _duration: Duration) {
        self.durations.lock().unwrap().push(step.to_string());
    }

    fn set_pipeline_running(&self, running: bool) {
        self.running.lock().unwrap().push(running);
    }

    fn set_source_connected(&self, _connected: bool) {}

    fn set_sink_connected(&self, _connected: bool) {}
}
