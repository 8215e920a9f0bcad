//! # data-pipe
//!
//! A change-data-capture pipeline: reads change events from a source,
//! reshapes them, and writes them to a sink, optionally after copying the
//! data that already exists.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                               Reconciler                                  │
//! │                                                                           │
//! │  1. decide: skip / full / incremental (sink emptiness + cursor)           │
//! │  2. backfill: BackfillSource::perform_initial_sync ──► Sink::write        │
//! │  3. live capture:                                                         │
//! │                                                                           │
//! │  ┌──────────────┐    ┌──────────────────┐    ┌──────────────┐             │
//! │  │ Source::read │───►│ Transformer      │───►│ Sink::write  │             │
//! │  │ (adapter)    │    │ (FieldMapper, …) │    │ (adapter)    │             │
//! │  └──────────────┘    └──────────────────┘    └──────────────┘             │
//! │         │ errors                                     │ errors             │
//! │         ▼                                            ▼                    │
//! │  ┌─────────────────────────────────────────────────────────────────────┐  │
//! │  │ error drains: log + count (never fatal)                             │  │
//! │  └─────────────────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stages hand events over through single-slot queues, so memory stays
//! bounded no matter how far the sink falls behind.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use data_pipe::{build_reconciler, Config, ConnectorRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! let config: Config = serde_json::from_str(&std::fs::read_to_string("pipe.json")?)?;
//! let reconciler = build_reconciler(&config, &sources, &sinks)?;
//!
//! let cancel = CancellationToken::new();
//! reconciler.run(cancel.clone()).await?;
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod reconciler;
pub mod registry;
pub mod transform;

// Re-exports for convenience
pub use config::{Config, ConnectorConfig, FieldFormat, FieldMapperConfig, FieldMapping, SyncConfig};
pub use connector::{BackfillSink, BackfillSource, InitialSyncRequest, Sink, Source};
pub use error::{Component, MappingError, PipeError, Result};
pub use event::{Event, Operation, Record, Value};
pub use metrics::{MetricsRecorder, NoOpMetrics, PipelineMetrics};
pub use pipeline::{HealthStatus, Pipeline, PipelineState, PipelineStatus};
pub use reconciler::{BackfillReport, Reconciler, SyncStrategy};
pub use registry::{build_reconciler, ConnectorRegistry};
pub use transform::{build_transformer, FieldMapper, PassThrough, Transformer};
