// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the data pipeline.
//!
//! Errors are categorized by the stage that produced them (connect, read,
//! transform, write, backfill, configuration) and carry enough context to
//! be logged without further decoration.
//!
//! # Error Categories
//!
//! | Error Type | Fatal | Description |
//! |------------|-------|-------------|
//! | `Connection` | Yes | Source or sink could not connect; `run()` aborts |
//! | `Read` | No | Mid-stream source error, logged and counted |
//! | `Write` | No | Mid-stream sink error, logged and counted |
//! | `Query` | No | Emptiness or cursor lookup against an adapter failed |
//! | `Mapping` | No | Field mapper rejected an event in strict mode (event dropped) |
//! | `Transform` | No | Any other transformer rejection (event dropped) |
//! | `Backfill` | Yes | Backfill saw errors; live capture must not start |
//! | `Config` | Yes | Invalid configuration, raised at construction only |
//! | `InvalidState` | Yes | Lifecycle misuse (e.g. running a pipeline twice) |
//! | `Shutdown` | Yes | Cancelled before startup finished |
//! | `Internal` | Yes | Unexpected internal error |
//!
//! Use [`PipeError::is_fatal()`] to decide whether an error ends the run
//! or only the event it was raised for.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipeError>;

/// The pipeline stage an error or metric is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Source,
    Transformer,
    Sink,
}

impl Component {
    /// Lowercase label used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Source => "source",
            Component::Transformer => "transformer",
            Component::Sink => "sink",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the field mapper rejected an event.
///
/// Only surfaced as an error under strict mode; otherwise the same
/// conditions are recorded as non-fatal issues and the rule is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("required field '{field}' is missing")]
    MissingRequired { field: String },

    #[error("extraction pattern failed for field '{field}'")]
    ExtractionFailed { field: String },

    #[error("formatting error for field '{field}': {message}")]
    Format { field: String, message: String },
}

/// Errors that can occur while running a pipeline.
#[derive(Error, Debug)]
pub enum PipeError {
    /// Source or sink connect failure. Never retried by the engine.
    #[error("failed to connect {component}: {message}")]
    Connection { component: Component, message: String },

    /// Source error delivered on the source's error stream.
    #[error("read error: {0}")]
    Read(String),

    /// Sink error delivered on the sink's error stream.
    #[error("write error: {0}")]
    Write(String),

    /// An extended adapter call (emptiness check, cursor lookup) failed.
    #[error("query error ({operation}): {message}")]
    Query { operation: String, message: String },

    /// Field mapper rejection under strict mode.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Rejection from any other transformer.
    #[error("transform error: {0}")]
    Transform(String),

    /// Backfill finished with errors. Live capture must not be started.
    #[error("backfill failed: {read_errors} read error(s), {write_errors} write error(s)")]
    Backfill { read_errors: usize, write_errors: usize },

    /// Invalid or contradictory configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation attempted in the wrong lifecycle state.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Startup was cancelled.
    #[error("shutdown in progress")]
    Shutdown,

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipeError {
    /// Connection failure attributed to a component.
    pub fn connection(component: Component, message: impl Into<String>) -> Self {
        Self::Connection {
            component,
            message: message.into(),
        }
    }

    /// Failed extended query (e.g. `is_empty`, `latest_cursor`).
    pub fn query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Check if this error ends the run rather than a single event.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Read(_) => false,
            Self::Write(_) => false,
            Self::Query { .. } => false,
            Self::Mapping(_) => false,
            Self::Transform(_) => false,
            Self::Backfill { .. } => true,
            Self::Config(_) => true,
            Self::InvalidState { .. } => true,
            Self::Shutdown => true,
            Self::Internal(_) => true,
        }
    }

    /// Short label for the `error_type` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection_error",
            Self::Read(_) => "read_error",
            Self::Write(_) => "write_error",
            Self::Query { .. } => "query_error",
            Self::Mapping(_) | Self::Transform(_) => "transform_error",
            Self::Backfill { .. } => "backfill_error",
            Self::Config(_) => "config_error",
            Self::InvalidState { .. } => "invalid_state",
            Self::Shutdown => "shutdown",
            Self::Internal(_) => "internal_error",
        }
    }
}
