//! Workers shared by live capture and backfill.
//!
//! - [`run_transform`]: pulls events, applies the transformer, forwards
//!   survivors. A transform error drops that one event.
//! - [`drain_errors`]: logs and counts everything on an error stream until
//!   its producer closes it.
//!
//! Both hand events over through bounded queues, so a stalled consumer
//! stalls the producer instead of buffering.

use super::types::PipelineStatus;
use crate::connector::{ErrorStream, EventStream};
use crate::error::Component;
use crate::event::{Event, Operation};
use crate::metrics::MetricsRecorder;
use crate::transform::Transformer;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Counters reported by the transform worker when it returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Events handed to the sink.
    pub forwarded: usize,
    /// Events dropped because the transformer rejected them.
    pub dropped: usize,
}

/// Everything the transform worker needs besides its queues.
pub(crate) struct TransformStage {
    pub transformer: Option<Arc<dyn Transformer>>,
    pub metrics: Arc<dyn MetricsRecorder>,
    /// Updated with the receive time of each event (live capture only).
    pub status: Option<Arc<Mutex<PipelineStatus>>>,
    /// Overwrite each event's operation before transforming (backfill).
    pub force_operation: Option<Operation>,
}

/// Run the transform stage until the input closes, the output is dropped,
/// or `cancel` fires.
pub(crate) async fn run_transform(
    stage: TransformStage,
    mut events: EventStream,
    out: mpsc::Sender<Event>,
    cancel: CancellationToken,
) -> TransformStats {
    let mut stats = TransformStats::default();

    loop {
        let mut event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Transform stage cancelled");
                break;
            }
            next = events.recv() => match next {
                Some(event) => event,
                None => {
                    debug!("Event stream closed");
                    break;
                }
            },
        };

        let received = Instant::now();
        if let Some(status) = &stage.status {
            status.lock().await.last_event_time = Some(Utc::now());
        }

        if let Some(operation) = stage.force_operation {
            event.operation = operation;
        }

        if let Some(transformer) = &stage.transformer {
            if let Err(e) = transformer.transform(&mut event) {
                warn!(event_id = %event.id, error = %e, "Error transforming event, dropping it");
                stage.metrics.record_event_error(Component::Transformer, e.kind());
                stats.dropped += 1;
                continue;
            }
            stage
                .metrics
                .record_processing_duration("transform", received.elapsed());
        }

        let operation = event.operation;
        trace!(event_id = %event.id, %operation, "Forwarding event");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Transform stage cancelled while handing off");
                break;
            }
            sent = out.send(event) => {
                if sent.is_err() {
                    debug!("Sink stopped consuming");
                    break;
                }
                stage.metrics.record_event_processed(operation);
                stats.forwarded += 1;
            }
        }
    }

    stats
}

/// Log and count errors until the stream closes. Returns the count.
pub(crate) async fn drain_errors(
    component: Component,
    mut errors: ErrorStream,
    metrics: Arc<dyn MetricsRecorder>,
) -> usize {
    let mut count = 0;
    while let Some(err) = errors.recv().await {
        count += 1;
        warn!(component = %component, error = %err, "Stream error");
        metrics.record_event_error(component, err.kind());
    }
    count
}
