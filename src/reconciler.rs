// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Initial sync (backfill) followed by live capture.
//!
//! The reconciler decides how much existing data to copy before the
//! pipeline starts tailing changes:
//!
//! | Condition (checked in order) | Strategy |
//! |------------------------------|----------|
//! | sync disabled | `Skip` |
//! | `force` set | `Full` |
//! | no cursor field | `Full` |
//! | sink empty | `Full` |
//! | sink has a cursor value | `Incremental` (`field >= cursor`, ascending) |
//! | cursor lookup failed | `Full` (logged) |
//! | sink has no cursor value | `Full` |
//!
//! A failing emptiness check aborts the run: without it there is no safe
//! way to choose between full and incremental.
//!
//! Backfill and live capture run strictly in sequence. Records written
//! between the end of the backfill and the start of live capture may be
//! missed or delivered twice; sinks are expected to upsert.

use crate::config::SyncConfig;
use crate::connector::{handoff_channel, BackfillSink, BackfillSource, InitialSyncRequest};
use crate::error::{Component, PipeError, Result};
use crate::event::{Operation, Value};
use crate::pipeline::{
    as_connection_error, drain_errors, run_transform, Pipeline, TransformStage,
};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// How much existing data to copy before live capture.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStrategy {
    /// Backfill disabled.
    Skip,
    /// Copy everything.
    Full,
    /// Copy records with `field >= cursor`.
    Incremental { field: String, cursor: Value },
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStrategy::Skip => write!(f, "skip"),
            SyncStrategy::Full => write!(f, "full"),
            SyncStrategy::Incremental { field, cursor } => {
                write!(f, "incremental ({field} >= {cursor})")
            }
        }
    }
}

/// Outcome of a backfill that finished without errors.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillReport {
    pub strategy: SyncStrategy,
    /// Records handed to the sink.
    pub forwarded: usize,
    /// Records the transformer rejected.
    pub dropped: usize,
    pub read_errors: usize,
    pub write_errors: usize,
}

impl BackfillReport {
    fn skipped() -> Self {
        Self {
            strategy: SyncStrategy::Skip,
            forwarded: 0,
            dropped: 0,
            read_errors: 0,
            write_errors: 0,
        }
    }
}

/// Runs the backfill, then the live pipeline, over the same adapters.
pub struct Reconciler<Src = dyn BackfillSource, Snk = dyn BackfillSink>
where
    Src: BackfillSource + ?Sized,
    Snk: BackfillSink + ?Sized,
{
    pipeline: Pipeline<Src, Snk>,
    sync: SyncConfig,
}

impl<Src, Snk> Reconciler<Src, Snk>
where
    Src: BackfillSource + ?Sized,
    Snk: BackfillSink + ?Sized,
{
    pub fn new(pipeline: Pipeline<Src, Snk>, sync: SyncConfig) -> Self {
        Self { pipeline, sync }
    }

    /// The live pipeline started by [`run()`](Self::run).
    pub fn pipeline(&self) -> &Pipeline<Src, Snk> {
        &self.pipeline
    }

    pub fn sync_config(&self) -> &SyncConfig {
        &self.sync
    }

    /// Choose a strategy. The sink must already be connected.
    pub async fn decide(&self) -> Result<SyncStrategy> {
        if !self.sync.enabled {
            return Ok(SyncStrategy::Skip);
        }

        if self.sync.force {
            info!("Forced initial sync, copying everything");
            return Ok(SyncStrategy::Full);
        }

        let Some(field) = self.sync.cursor_field() else {
            info!("No cursor field configured, copying everything");
            return Ok(SyncStrategy::Full);
        };

        let sink = self.pipeline.sink();
        let empty = sink.is_empty().await.map_err(|e| {
            error!(error = %e, "Failed to check whether sink is empty");
            e
        })?;
        if empty {
            info!("Sink is empty, copying everything");
            return Ok(SyncStrategy::Full);
        }

        match sink.latest_cursor(field).await {
            Ok(Some(cursor)) => {
                info!(field, cursor = %cursor, "Resuming from sink cursor");
                Ok(SyncStrategy::Incremental {
                    field: field.to_string(),
                    cursor,
                })
            }
            Ok(None) => {
                info!(field, "Sink has no cursor value, copying everything");
                Ok(SyncStrategy::Full)
            }
            Err(e) => {
                warn!(field, error = %e, "Failed to read sink cursor, copying everything");
                Ok(SyncStrategy::Full)
            }
        }
    }

    /// Copy existing records into the sink.
    ///
    /// Connects both adapters for the duration of the backfill and closes
    /// them before returning. Any read or write error fails the backfill
    /// with [`PipeError::Backfill`]; a cancelled backfill returns
    /// [`PipeError::Shutdown`].
    pub async fn backfill(&self, cancel: CancellationToken) -> Result<BackfillReport> {
        if !self.sync.enabled {
            debug!("Initial sync disabled");
            return Ok(BackfillReport::skipped());
        }

        let span = info_span!("backfill", pipeline = %self.pipeline.name());
        async {
            let source = self.pipeline.source();
            source
                .connect(&cancel)
                .await
                .map_err(|e| as_connection_error(Component::Source, e))?;

            let result = self.backfill_with_source(&cancel).await;

            if let Err(e) = source.close().await {
                warn!(error = %e, "Error closing source after backfill");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn backfill_with_source(&self, cancel: &CancellationToken) -> Result<BackfillReport> {
        let sink = self.pipeline.sink();
        sink.connect(cancel)
            .await
            .map_err(|e| as_connection_error(Component::Sink, e))?;

        let result = match self.decide().await {
            Ok(strategy) => self.copy(strategy, cancel).await,
            Err(e) => Err(e),
        };

        if let Err(e) = sink.close().await {
            warn!(error = %e, "Error closing sink after backfill");
        }
        result
    }

    async fn copy(
        &self,
        strategy: SyncStrategy,
        cancel: &CancellationToken,
    ) -> Result<BackfillReport> {
        let batch_size = self.sync.effective_batch_size();
        let request = match &strategy {
            SyncStrategy::Skip => return Ok(BackfillReport::skipped()),
            SyncStrategy::Full => {
                InitialSyncRequest::full(self.sync.cursor_field().map(str::to_string), batch_size)
            }
            SyncStrategy::Incremental { field, cursor } => {
                InitialSyncRequest::incremental(field.clone(), cursor.clone(), batch_size)
            }
        };

        let source = self.pipeline.source();
        if let Some(field) = request.cursor_field.as_deref() {
            match source.latest_cursor(field).await {
                Ok(Some(cursor)) => info!(field, source_cursor = %cursor, "Source cursor"),
                Ok(None) => debug!(field, "Source has no cursor value"),
                Err(e) => debug!(field, error = %e, "Could not read source cursor"),
            }
        }

        info!(strategy = %strategy, batch_size, "Starting initial sync");
        let metrics = Arc::clone(self.pipeline.metrics());

        let (events, read_errors) = source.perform_initial_sync(cancel.clone(), request);
        let (tx, rx) = handoff_channel();
        let stage = TransformStage {
            transformer: self.pipeline.transformer().cloned(),
            metrics: Arc::clone(&metrics),
            status: None,
            force_operation: Some(Operation::Insert),
        };
        let transform = tokio::spawn(
            run_transform(stage, events, tx, cancel.clone()).instrument(Span::current()),
        );
        let write_errors = self.pipeline.sink().write(cancel.clone(), rx);

        let read_drain = tokio::spawn(
            drain_errors(Component::Source, read_errors, Arc::clone(&metrics))
                .instrument(Span::current()),
        );
        let write_drain = tokio::spawn(
            drain_errors(Component::Sink, write_errors, metrics).instrument(Span::current()),
        );

        let stats = transform
            .await
            .map_err(|e| PipeError::Internal(format!("backfill transform worker failed: {e}")))?;
        let read_errors = read_drain
            .await
            .map_err(|e| PipeError::Internal(format!("backfill read drain failed: {e}")))?;
        let write_errors = write_drain
            .await
            .map_err(|e| PipeError::Internal(format!("backfill write drain failed: {e}")))?;

        if cancel.is_cancelled() {
            warn!(forwarded = stats.forwarded, "Initial sync cancelled");
            return Err(PipeError::Shutdown);
        }

        if read_errors > 0 || write_errors > 0 {
            error!(read_errors, write_errors, "Initial sync failed");
            return Err(PipeError::Backfill {
                read_errors,
                write_errors,
            });
        }

        info!(
            forwarded = stats.forwarded,
            dropped = stats.dropped,
            "Initial sync complete"
        );
        Ok(BackfillReport {
            strategy,
            forwarded: stats.forwarded,
            dropped: stats.dropped,
            read_errors,
            write_errors,
        })
    }

    /// Backfill (unless disabled), then run live capture until the source
    /// is exhausted or `cancel` fires. Live capture never starts after a
    /// failed or cancelled backfill.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        self.backfill(cancel.clone()).await?;
        if cancel.is_cancelled() {
            return Err(PipeError::Shutdown);
        }
        self.pipeline.run(cancel).await
    }
}
