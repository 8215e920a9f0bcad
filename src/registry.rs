// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Connector registry.
//!
//! Maps the `type` tag of a [`ConnectorConfig`] to a constructor. A
//! registry is a plain value: build it once at the composition root,
//! register the adapters the binary ships with, and pass it by reference.
//!
//! ```rust,ignore
//! let mut sources: ConnectorRegistry<dyn BackfillSource> = ConnectorRegistry::new();
//! sources.register("mongodb", |cfg| Ok(Arc::new(MongoSource::new(cfg)?) as Arc<dyn BackfillSource>));
//!
//! let mut sinks: ConnectorRegistry<dyn BackfillSink> = ConnectorRegistry::new();
//! sinks.register("postgres", |cfg| Ok(Arc::new(PgSink::new(cfg)?) as Arc<dyn BackfillSink>));
//!
//! let reconciler = build_reconciler(&config, &sources, &sinks)?;
//! reconciler.run(cancel).await?;
//! ```

use crate::config::{Config, ConnectorConfig};
use crate::connector::{BackfillSink, BackfillSource, Sink, Source};
use crate::error::{PipeError, Result};
use crate::metrics::PipelineMetrics;
use crate::pipeline::Pipeline;
use crate::reconciler::Reconciler;
use crate::transform::build_transformer;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds an adapter from its config block.
pub type Constructor<T> = Box<dyn Fn(&ConnectorConfig) -> Result<Arc<T>> + Send + Sync>;

/// Registry of minimal sources.
pub type SourceRegistry = ConnectorRegistry<dyn Source>;

/// Registry of minimal sinks.
pub type SinkRegistry = ConnectorRegistry<dyn Sink>;

/// Type tag to constructor map for one kind of adapter.
pub struct ConnectorRegistry<T: ?Sized> {
    kind: &'static str,
    constructors: HashMap<String, Constructor<T>>,
}

impl<T: ?Sized> ConnectorRegistry<T> {
    /// Create an empty registry. Unknown types are reported as "connector".
    pub fn new() -> Self {
        Self::named("connector")
    }

    /// Create an empty registry whose errors name `kind` ("source", "sink").
    pub fn named(kind: &'static str) -> Self {
        Self {
            kind,
            constructors: HashMap::new(),
        }
    }

    /// Register a constructor for `connector_type`.
    ///
    /// Returns `true` if an earlier constructor for the same type was replaced.
    pub fn register<F>(&mut self, connector_type: impl Into<String>, constructor: F) -> bool
    where
        F: Fn(&ConnectorConfig) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        let connector_type = connector_type.into();
        debug!(kind = self.kind, connector_type = %connector_type, "Registering connector");
        self.constructors
            .insert(connector_type, Box::new(constructor))
            .is_some()
    }

    /// Check if a type tag is registered.
    pub fn contains(&self, connector_type: &str) -> bool {
        self.constructors.contains_key(connector_type)
    }

    /// Registered type tags, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Build the adapter named by `config.connector_type`.
    pub fn create(&self, config: &ConnectorConfig) -> Result<Arc<T>> {
        let constructor = self.constructors.get(&config.connector_type).ok_or_else(|| {
            PipeError::Config(format!(
                "unsupported {} type: {}",
                self.kind, config.connector_type
            ))
        })?;
        constructor(config)
    }
}

impl<T: ?Sized> Default for ConnectorRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble a reconciler (backfill plus live pipeline) from a config.
///
/// Resolves both adapters through their registries, builds the configured
/// transformer, and labels metrics with the pipeline name.
pub fn build_reconciler<Src, Snk>(
    config: &Config,
    sources: &ConnectorRegistry<Src>,
    sinks: &ConnectorRegistry<Snk>,
) -> Result<Reconciler<Src, Snk>>
where
    Src: BackfillSource + ?Sized,
    Snk: BackfillSink + ?Sized,
{
    let name = config.pipeline.name.as_str();
    let source = sources.create(&config.source)?;
    let sink = sinks.create(&config.sink)?;
    let transformer = build_transformer(config.transformer.as_ref())?;

    info!(
        pipeline = %name,
        source = %config.source.connector_type,
        sink = %config.sink.connector_type,
        "Assembled pipeline"
    );

    let pipeline = Pipeline::new(name, source, sink)
        .with_transformer(transformer)
        .with_metrics(Arc::new(PipelineMetrics::new(name)));
    Ok(Reconciler::new(pipeline, config.pipeline.sync.clone()))
}
