// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Source and sink capability traits.
//!
//! The engine only depends on the minimal [`Source`] and [`Sink`] contracts.
//! The [`Reconciler`](crate::reconciler::Reconciler) additionally needs the
//! extended [`BackfillSource`] and [`BackfillSink`] capabilities (batched
//! cursor reads, emptiness check, cursor lookup).
//!
//! Streams are tokio channels created with [`handoff_channel()`], so every
//! stage hands events over one at a time and a slow consumer stalls its
//! producer.
//!
//! # Example
//!
//! ```rust,no_run
//! use data_pipe::connector::{handoff_channel, BoxFuture, ErrorStream, EventStream, Sink};
//! use data_pipe::PipeError;
//! use tokio_util::sync::CancellationToken;
//!
//! struct StdoutSink;
//!
//! impl Sink for StdoutSink {
//!     fn connect<'a>(&'a self, _cancel: &'a CancellationToken) -> BoxFuture<'a, ()> {
//!         Box::pin(async { Ok(()) })
//!     }
//!
//!     fn write(&self, _cancel: CancellationToken, mut events: EventStream) -> ErrorStream {
//!         let (err_tx, err_rx) = handoff_channel::<PipeError>();
//!         tokio::spawn(async move {
//!             let _err_tx = err_tx;
//!             while let Some(event) = events.recv().await {
//!                 println!("{} {}", event.operation, event.id);
//!             }
//!         });
//!         err_rx
//!     }
//!
//!     fn close(&self) -> BoxFuture<'_, ()> {
//!         Box::pin(async { Ok(()) })
//!     }
//! }
//! ```

use crate::error::{PipeError, Result};
use crate::event::{Event, Value};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of every inter-stage queue.
///
/// tokio has no rendezvous channel; a single slot is the closest bound and
/// keeps in-flight events per stage constant.
pub const HANDOFF_CAPACITY: usize = 1;

/// Type alias for boxed async results (keeps the traits object-safe).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Stream of events between stages. Closed by its producer.
pub type EventStream = mpsc::Receiver<Event>;

/// Side stream of non-fatal errors. Closed by its producer.
pub type ErrorStream = mpsc::Receiver<PipeError>;

/// Create a bounded hand-off queue.
pub fn handoff_channel<T>() -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(HANDOFF_CAPACITY)
}

/// Minimal source contract.
pub trait Source: Send + Sync + 'static {
    /// Establish the connection. Failure is fatal to the run.
    fn connect<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, ()>;

    /// Start reading changes.
    ///
    /// Implementations spawn their read loop, observe `cancel`, and close
    /// both returned streams when they stop.
    fn read(&self, cancel: CancellationToken) -> (EventStream, ErrorStream);

    /// Release the connection.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// Minimal sink contract.
pub trait Sink: Send + Sync + 'static {
    /// Establish the connection. Failure is fatal to the run.
    fn connect<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, ()>;

    /// Consume `events` until it closes, reporting failures on the
    /// returned stream. The error stream must close once `events` is
    /// exhausted and pending writes are done.
    fn write(&self, cancel: CancellationToken, events: EventStream) -> ErrorStream;

    /// Release the connection.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// Parameters for a batched backfill read.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialSyncRequest {
    /// Field to filter and order by. `None` reads in natural order.
    pub cursor_field: Option<String>,
    /// Lower bound (inclusive): only records with `cursor_field >= from_cursor`.
    pub from_cursor: Option<Value>,
    pub batch_size: usize,
}

impl InitialSyncRequest {
    /// Read everything.
    pub fn full(cursor_field: Option<String>, batch_size: usize) -> Self {
        Self {
            cursor_field,
            from_cursor: None,
            batch_size,
        }
    }

    /// Read records with `field >= cursor`, ascending by `field`.
    pub fn incremental(field: impl Into<String>, cursor: Value, batch_size: usize) -> Self {
        Self {
            cursor_field: Some(field.into()),
            from_cursor: Some(cursor),
            batch_size,
        }
    }

    pub fn is_incremental(&self) -> bool {
        self.from_cursor.is_some()
    }
}

/// Source with backfill support.
pub trait BackfillSource: Source {
    /// Read existing records in batches, ordered ascending by the cursor
    /// field when one is given. Each record is emitted as an insert event.
    fn perform_initial_sync(
        &self,
        cancel: CancellationToken,
        request: InitialSyncRequest,
    ) -> (EventStream, ErrorStream);

    /// Highest value of `field` in the source, `None` when empty.
    ///
    /// Informational only: the reconciler logs it next to the sink's cursor
    /// before a backfill, but never bases the strategy on it.
    fn latest_cursor<'a>(&'a self, field: &'a str) -> BoxFuture<'a, Option<Value>>;
}

/// Sink with the state queries the reconciler needs.
pub trait BackfillSink: Sink {
    /// Whether the destination holds no records.
    fn is_empty(&self) -> BoxFuture<'_, bool>;

    /// Highest value of `field` already written, `None` when unknown.
    fn latest_cursor<'a>(&'a self, field: &'a str) -> BoxFuture<'a, Option<Value>>;
}
