//! Recording mock connectors.
//!
//! `MockSource` replays canned events (live and backfill) and records every
//! call; `MockSink` collects what it is given and answers the reconciler's
//! state queries with configured responses. Both can be made to fail their
//! connect, report stream errors, or stall.

use data_pipe::connector::{
    handoff_channel, BackfillSink, BackfillSource, BoxFuture, ErrorStream, EventStream,
    InitialSyncRequest, Sink, Source,
};
use data_pipe::{Component, PipeError, Event, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

// =============================================================================
// MockSource
// =============================================================================

/// Mock source that records calls.
///
/// # Example
/// ```rust,ignore
/// let source = Arc::new(MockSource::new().with_events(events(3)).tailing());
/// // run a pipeline...
/// assert_eq!(source.close_count(), 1);
/// ```
pub struct MockSource {
    /// Live events emitted by read()
    events: Vec<Event>,
    /// Existing records emitted by perform_initial_sync()
    backfill: Vec<Event>,
    /// Errors reported on the read() error stream
    read_errors: Vec<String>,
    /// Errors reported on the perform_initial_sync() error stream
    backfill_errors: Vec<String>,
    /// Keep read() streams open until cancelled
    tailing: bool,
    fail_connect: bool,
    cursor: Option<Value>,

    connects: AtomicUsize,
    closes: AtomicUsize,
    reads: AtomicUsize,
    /// Events the read loop managed to hand off
    emitted: Arc<AtomicUsize>,
    sync_requests: RwLock<Vec<InitialSyncRequest>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            backfill: Vec::new(),
            read_errors: Vec::new(),
            backfill_errors: Vec::new(),
            tailing: false,
            fail_connect: false,
            cursor: None,
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            emitted: Arc::new(AtomicUsize::new(0)),
            sync_requests: RwLock::new(Vec::new()),
        }
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    pub fn with_backfill(mut self, records: Vec<Event>) -> Self {
        self.backfill = records;
        self
    }

    pub fn with_read_errors(mut self, errors: &[&str]) -> Self {
        self.read_errors = errors.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_backfill_errors(mut self, errors: &[&str]) -> Self {
        self.backfill_errors = errors.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_cursor(mut self, cursor: Value) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// After replaying its events, wait for cancellation like a change stream.
    pub fn tailing(mut self) -> Self {
        self.tailing = true;
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    pub async fn sync_requests(&self) -> Vec<InitialSyncRequest> {
        self.sync_requests.read().await.clone()
    }

    fn replay(
        &self,
        cancel: CancellationToken,
        events: Vec<Event>,
        errors: Vec<String>,
        tailing: bool,
    ) -> (EventStream, ErrorStream) {
        let (tx, rx) = handoff_channel();
        let (err_tx, err_rx) = handoff_channel();
        let emitted = Arc::clone(&self.emitted);

        tokio::spawn(async move {
            for message in errors {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    sent = err_tx.send(PipeError::Read(message)) => if sent.is_err() { return },
                }
            }
            for event in events {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    sent = tx.send(event) => {
                        if sent.is_err() {
                            return;
                        }
                        emitted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            if tailing {
                cancel.cancelled().await;
            }
        });

        (rx, err_rx)
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for MockSource {
    fn connect<'a>(&'a self, _cancel: &'a CancellationToken) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(PipeError::connection(Component::Source, "connection refused"));
            }
            Ok(())
        })
    }

    fn read(&self, cancel: CancellationToken) -> (EventStream, ErrorStream) {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.replay(cancel, self.events.clone(), self.read_errors.clone(), self.tailing)
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

impl BackfillSource for MockSource {
    fn perform_initial_sync(
        &self,
        cancel: CancellationToken,
        request: InitialSyncRequest,
    ) -> (EventStream, ErrorStream) {
        let mut records: Vec<Event> = self.backfill.clone();
        if let (Some(field), Some(Value::Int(from))) =
            (request.cursor_field.as_deref(), request.from_cursor.as_ref())
        {
            records.retain(|e| matches!(e.data.get(field), Some(Value::Int(v)) if v >= from));
        }
        if let Some(field) = request.cursor_field.as_deref() {
            records.sort_by_key(|e| match e.data.get(field) {
                Some(Value::Int(v)) => *v,
                _ => i64::MIN,
            });
        }

        if let Ok(mut requests) = self.sync_requests.try_write() {
            requests.push(request);
        }
        self.replay(cancel, records, self.backfill_errors.clone(), false)
    }

    fn latest_cursor<'a>(&'a self, _field: &'a str) -> BoxFuture<'a, Option<Value>> {
        Box::pin(async move { Ok(self.cursor.clone()) })
    }
}

// =============================================================================
// MockSink
// =============================================================================

/// Mock sink that collects written events.
pub struct MockSink {
    written: Arc<RwLock<Vec<Event>>>,
    /// Event ids whose write is reported as failed
    failing_ids: HashSet<String>,
    /// Never consume events; wait for cancellation instead
    stalled: bool,
    fail_connect: bool,
    empty: std::result::Result<bool, String>,
    cursor: std::result::Result<Option<Value>, String>,

    connects: AtomicUsize,
    closes: AtomicUsize,
}

impl MockSink {
    /// An empty, healthy sink.
    pub fn new() -> Self {
        Self {
            written: Arc::new(RwLock::new(Vec::new())),
            failing_ids: HashSet::new(),
            stalled: false,
            fail_connect: false,
            empty: Ok(true),
            cursor: Ok(None),
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    /// A sink that already holds data, with `cursor` as its highest value.
    pub fn holding(cursor: Option<Value>) -> Self {
        Self {
            empty: Ok(false),
            cursor: Ok(cursor),
            ..Self::new()
        }
    }

    pub fn failing_cursor_lookup(mut self) -> Self {
        self.cursor = Err("cursor query timed out".to_string());
        self
    }

    pub fn failing_emptiness_check(mut self) -> Self {
        self.empty = Err("collection stats unavailable".to_string());
        self
    }

    pub fn failing_writes(mut self, ids: &[&str]) -> Self {
        self.failing_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub async fn written(&self) -> Vec<Event> {
        self.written.read().await.clone()
    }

    pub async fn written_ids(&self) -> Vec<String> {
        self.written.read().await.iter().map(|e| e.id.clone()).collect()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MockSink {
    fn connect<'a>(&'a self, _cancel: &'a CancellationToken) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(PipeError::connection(Component::Sink, "authentication failed"));
            }
            Ok(())
        })
    }

    fn write(&self, cancel: CancellationToken, mut events: EventStream) -> ErrorStream {
        let (err_tx, err_rx) = handoff_channel();
        let written = Arc::clone(&self.written);
        let failing_ids = self.failing_ids.clone();
        let stalled = self.stalled;

        tokio::spawn(async move {
            if stalled {
                cancel.cancelled().await;
                return;
            }
            while let Some(event) = events.recv().await {
                if failing_ids.contains(&event.id) {
                    let err = PipeError::Write(format!("rejected {}", event.id));
                    if err_tx.send(err).await.is_err() {
                        return;
                    }
                    continue;
                }
                written.write().await.push(event);
            }
        });

        err_rx
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

impl BackfillSink for MockSink {
    fn is_empty(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            self.empty
                .clone()
                .map_err(|e| PipeError::query("is_empty", e))
        })
    }

    fn latest_cursor<'a>(&'a self, _field: &'a str) -> BoxFuture<'a, Option<Value>> {
        Box::pin(async move {
            self.cursor
                .clone()
                .map_err(|e| PipeError::query("latest_cursor", e))
        })
    }
}
