// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Event transformation.
//!
//! A [`Transformer`] reshapes one event at a time between source and sink.
//! The pipeline uses [`PassThrough`] when none is configured; the
//! declarative [`FieldMapper`] covers renaming, extraction and formatting.

mod field_mapper;
pub mod format;

pub use field_mapper::FieldMapper;

use crate::config::{FieldMapperConfig, TransformerConfig};
use crate::error::{PipeError, Result};
use crate::event::Event;
use std::sync::Arc;

/// Per-event transformation.
pub trait Transformer: Send + Sync + 'static {
    /// Transform `event` in place.
    ///
    /// On `Err` the event must be left exactly as it was passed in; the
    /// caller drops it.
    fn transform(&self, event: &mut Event) -> Result<()>;
}

/// Transformer that leaves events unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Transformer for PassThrough {
    fn transform(&self, _event: &mut Event) -> Result<()> {
        Ok(())
    }
}

/// Build the transformer named by a config block. `None` means passthrough.
pub fn build_transformer(config: Option<&TransformerConfig>) -> Result<Arc<dyn Transformer>> {
    let Some(config) = config else {
        return Ok(Arc::new(PassThrough));
    };

    match config.transformer_type.as_str() {
        "" | "passthrough" => Ok(Arc::new(PassThrough)),
        "fieldmapper" => {
            if !config.settings.contains_key("mappings") {
                return Err(PipeError::Config(
                    "fieldmapper transformer requires 'mappings' configuration".to_string(),
                ));
            }
            let settings = serde_json::Value::Object(config.settings.clone());
            let mapper_config: FieldMapperConfig = serde_json::from_value(settings)
                .map_err(|e| PipeError::Config(format!("invalid fieldmapper configuration: {e}")))?;
            Ok(Arc::new(FieldMapper::new(mapper_config)?))
        }
        other => Err(PipeError::Config(format!("unsupported transformer type: {other}"))),
    }
}
