// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pipeline engine.
//!
//! Wires one [`Source`] to one [`Sink`] through an optional [`Transformer`]:
//!
//! ```text
//! Source::read ──events──► transform worker ──events──► Sink::write
//!      │                                                     │
//!      └──errors──► source drain             sink drain ◄──errors──┘
//! ```
//!
//! # Lifecycle
//!
//! 1. Connects the source, then the sink (no retries)
//! 2. Streams until the source closes its event stream or `cancel` fires
//! 3. Waits for every worker and both error drains
//! 4. Closes the sink, then the source; each exactly once
//!
//! Mid-stream errors are logged and counted, never fatal. Only a failed
//! connect makes [`Pipeline::run`] return an error.

mod stages;
mod types;

pub use stages::TransformStats;
pub use types::{HealthStatus, PipelineState, PipelineStatus};

pub(crate) use stages::{drain_errors, run_transform, TransformStage};

use crate::connector::{handoff_channel, Sink, Source};
use crate::error::{Component, PipeError, Result};
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::transform::Transformer;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// One source-to-sink pipeline.
///
/// Generic over the adapter types so the [`Reconciler`](crate::reconciler::Reconciler)
/// can reuse the same handles through their extended capabilities. The
/// defaults make `Pipeline` a plain trait-object pipeline.
pub struct Pipeline<Src: Source + ?Sized = dyn Source, Snk: Sink + ?Sized = dyn Sink> {
    name: String,
    source: Arc<Src>,
    sink: Arc<Snk>,

    /// `None` forwards events unchanged
    transformer: Option<Arc<dyn Transformer>>,

    metrics: Arc<dyn MetricsRecorder>,

    /// Connection flags and last event time, written only by the engine
    status: Arc<Mutex<PipelineStatus>>,

    /// Lifecycle state (broadcast to watchers)
    state_tx: watch::Sender<PipelineState>,

    state_rx: watch::Receiver<PipelineState>,
}

impl<Src, Snk> Pipeline<Src, Snk>
where
    Src: Source + ?Sized,
    Snk: Sink + ?Sized,
{
    /// Create a pipeline in the `Idle` state with no transformer and no-op metrics.
    pub fn new(name: impl Into<String>, source: Arc<Src>, sink: Arc<Snk>) -> Self {
        let (state_tx, state_rx) = watch::channel(PipelineState::Idle);
        Self {
            name: name.into(),
            source,
            sink,
            transformer: None,
            metrics: Arc::new(NoOpMetrics),
            status: Arc::new(Mutex::new(PipelineStatus::new())),
            state_tx,
            state_rx,
        }
    }

    /// Transform every event before it reaches the sink.
    pub fn with_transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Record through `metrics` instead of discarding.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Arc<Src> {
        &self.source
    }

    pub fn sink(&self) -> &Arc<Snk> {
        &self.sink
    }

    pub fn transformer(&self) -> Option<&Arc<dyn Transformer>> {
        self.transformer.as_ref()
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsRecorder> {
        &self.metrics
    }

    /// Get current pipeline state.
    pub fn state(&self) -> PipelineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<PipelineState> {
        self.state_rx.clone()
    }

    /// Snapshot of the connection flags and timing.
    pub async fn status(&self) -> PipelineStatus {
        self.status.lock().await.clone()
    }

    /// Both source and sink are connected.
    pub async fn is_healthy(&self) -> bool {
        self.status.lock().await.is_healthy()
    }

    /// Serializable health report for monitoring endpoints.
    pub async fn health(&self) -> HealthStatus {
        self.status.lock().await.health()
    }

    /// Run the pipeline until the source is exhausted or `cancel` fires.
    ///
    /// Returns `Ok(())` after a clean drain, even if events were dropped or
    /// the adapters reported errors along the way. A pipeline runs once:
    /// calling this outside `Idle` fails with [`PipeError::InvalidState`].
    ///
    /// Cancellation relies on the adapters observing `cancel`: a source that
    /// never closes its streams keeps `run` waiting.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let claimed = self.state_tx.send_if_modified(|state| {
            if *state == PipelineState::Idle {
                *state = PipelineState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(PipeError::InvalidState {
                expected: PipelineState::Idle.to_string(),
                actual: self.state().to_string(),
            });
        }

        let span = info_span!("pipeline", pipeline = %self.name);
        async {
            info!("Starting pipeline");
            self.metrics.set_pipeline_running(true);

            let result = self.connect_and_stream(&cancel).await;

            self.metrics.set_pipeline_running(false);
            match &result {
                Ok(()) => {
                    self.set_state(PipelineState::Stopped);
                    info!("Pipeline stopped");
                }
                Err(e) => {
                    self.set_state(PipelineState::Failed);
                    error!(error = %e, "Pipeline failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    fn set_state(&self, state: PipelineState) {
        debug!(state = %state, "Pipeline state change");
        let _ = self.state_tx.send(state);
    }

    async fn connect_and_stream(&self, cancel: &CancellationToken) -> Result<()> {
        let started = Instant::now();
        if let Err(e) = self.source.connect(cancel).await {
            self.metrics
                .record_event_error(Component::Source, "connection_error");
            return Err(as_connection_error(Component::Source, e));
        }
        self.metrics
            .record_processing_duration("source_connect", started.elapsed());
        self.set_connected(Component::Source, true).await;
        info!("Source connected");

        let result = self.connect_sink_and_stream(cancel).await;

        if let Err(e) = self.source.close().await {
            warn!(error = %e, "Error closing source");
        }
        self.set_connected(Component::Source, false).await;
        debug!("Source closed");

        result
    }

    async fn connect_sink_and_stream(&self, cancel: &CancellationToken) -> Result<()> {
        let started = Instant::now();
        if let Err(e) = self.sink.connect(cancel).await {
            self.metrics
                .record_event_error(Component::Sink, "connection_error");
            return Err(as_connection_error(Component::Sink, e));
        }
        self.metrics
            .record_processing_duration("sink_connect", started.elapsed());
        self.set_connected(Component::Sink, true).await;
        info!("Sink connected");

        self.stream(cancel).await;

        if let Err(e) = self.sink.close().await {
            warn!(error = %e, "Error closing sink");
        }
        self.set_connected(Component::Sink, false).await;
        debug!("Sink closed");

        Ok(())
    }

    /// Start every worker and wait until all of them have returned.
    async fn stream(&self, cancel: &CancellationToken) {
        let (events, source_errors) = self.source.read(cancel.clone());
        let (transformed_tx, transformed_rx) = handoff_channel();

        let stage = TransformStage {
            transformer: self.transformer.clone(),
            metrics: Arc::clone(&self.metrics),
            status: Some(Arc::clone(&self.status)),
            force_operation: None,
        };
        let mut transform = tokio::spawn(
            run_transform(stage, events, transformed_tx, cancel.clone())
                .instrument(Span::current()),
        );

        let sink_errors = self.sink.write(cancel.clone(), transformed_rx);

        let source_drain = tokio::spawn(
            drain_errors(Component::Source, source_errors, Arc::clone(&self.metrics))
                .instrument(Span::current()),
        );
        let sink_drain = tokio::spawn(
            drain_errors(Component::Sink, sink_errors, Arc::clone(&self.metrics))
                .instrument(Span::current()),
        );

        self.set_state(PipelineState::Running);
        info!("Pipeline running");

        let finished = tokio::select! {
            res = &mut transform => Some(res),
            _ = cancel.cancelled() => {
                info!("Cancellation requested, draining");
                None
            }
        };
        self.set_state(PipelineState::Draining);

        let transform_result = match finished {
            Some(res) => res,
            None => transform.await,
        };
        match transform_result {
            Ok(stats) => info!(
                forwarded = stats.forwarded,
                dropped = stats.dropped,
                "Transform stage finished"
            ),
            Err(e) => error!(error = %e, "Transform worker panicked"),
        }

        let drains = [(Component::Source, source_drain), (Component::Sink, sink_drain)];
        for (component, drain) in drains {
            match drain.await {
                Ok(0) => {}
                Ok(errors) => warn!(component = %component, errors, "Stream finished with errors"),
                Err(e) => error!(component = %component, error = %e, "Error drain panicked"),
            }
        }
    }

    async fn set_connected(&self, component: Component, connected: bool) {
        let mut status = self.status.lock().await;
        match component {
            Component::Source => {
                status.source_connected = connected;
                self.metrics.set_source_connected(connected);
            }
            Component::Sink => {
                status.sink_connected = connected;
                self.metrics.set_sink_connected(connected);
            }
            Component::Transformer => {}
        }
    }
}

/// Attribute a connect failure to `component` unless the adapter already did.
pub(crate) fn as_connection_error(component: Component, err: PipeError) -> PipeError {
    match err {
        PipeError::Connection { .. } => err,
        other => PipeError::connection(component, other.to_string()),
    }
}
