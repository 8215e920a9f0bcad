//! Configuration for the data pipeline.
//!
//! These types are produced by an external loader (JSON file, CLI flags,
//! environment) and consumed by the core. They can be constructed
//! programmatically or deserialized with serde.
//!
//! # Quick Start
//!
//! ```rust
//! use data_pipe::config::{FieldMapperConfig, FieldMapping, FieldFormat, SyncConfig};
//!
//! let sync = SyncConfig {
//!     enabled: true,
//!     cursor_field: Some("updated_at".into()),
//!     ..Default::default()
//! };
//! assert_eq!(sync.effective_batch_size(), 1000);
//!
//! let mapper = FieldMapperConfig {
//!     mappings: vec![FieldMapping::new("email").with_format(FieldFormat::Lowercase)],
//!     include_all: true,
//!     ..Default::default()
//! };
//! assert_eq!(mapper.mappings.len(), 1);
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! Config
//! ├── pipeline: PipelineConfig
//! │   ├── name: String
//! │   └── sync: SyncConfig          # backfill before live capture
//! ├── source: ConnectorConfig       # type tag + adapter settings
//! ├── sink: ConnectorConfig
//! └── transformer: Option<TransformerConfig>
//! ```
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "pipeline": {
//!     "name": "users-to-pg",
//!     "sync": { "enabled": true, "cursor_field": "updated_at", "batch_size": 500 }
//!   },
//!   "source": { "type": "mongodb", "settings": { "database": "app", "collection": "users" } },
//!   "sink":   { "type": "postgresql", "settings": { "table": "users" } },
//!   "transformer": {
//!     "type": "fieldmapper",
//!     "settings": {
//!       "mappings": [ { "source": "email", "format": "lowercase", "required": true } ],
//!       "include_all": true,
//!       "exclude_fields": ["password"]
//!     }
//!   }
//! }
//! ```

use crate::error::PipeError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Adapter-specific settings, opaque to the core.
pub type Settings = serde_json::Map<String, serde_json::Value>;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything needed to assemble one pipeline at the composition root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub source: ConnectorConfig,
    pub sink: ConnectorConfig,
    /// Absent means passthrough.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<TransformerConfig>,
}

impl Config {
    /// Create a minimal config for testing: backfill off, no transformer.
    pub fn for_testing(name: &str, source_type: &str, sink_type: &str) -> Self {
        Self {
            pipeline: PipelineConfig::new(name),
            source: ConnectorConfig::new(source_type),
            sink: ConnectorConfig::new(sink_type),
            transformer: None,
        }
    }
}

/// Pipeline-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Used in logs and as the `pipeline` metric label.
    pub name: String,

    #[serde(default)]
    pub sync: SyncConfig,
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sync: SyncConfig::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SyncConfig: backfill behaviour
// ═══════════════════════════════════════════════════════════════════════════════

/// Batch size used when none (or a non-positive one) is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Initial sync (backfill) settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Run a backfill before live capture.
    #[serde(default, alias = "initial_sync")]
    pub enabled: bool,

    /// Backfill everything even if the sink already holds data.
    #[serde(default, alias = "force_initial_sync")]
    pub force: bool,

    /// Monotonic field used to resume an incremental backfill.
    #[serde(default, alias = "timestamp_field", skip_serializing_if = "Option::is_none")]
    pub cursor_field: Option<String>,

    /// Records per backfill batch. `<= 0` means [`DEFAULT_BATCH_SIZE`].
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

fn default_batch_size() -> i64 {
    DEFAULT_BATCH_SIZE as i64
}

impl SyncConfig {
    /// Create a config for testing: backfill enabled with small batches.
    pub fn for_testing(cursor_field: Option<&str>) -> Self {
        Self {
            enabled: true,
            force: false,
            cursor_field: cursor_field.map(str::to_string),
            batch_size: 2,
        }
    }

    /// Batch size with the non-positive fallback applied.
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size <= 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.batch_size as usize
        }
    }

    /// Cursor field, treating an empty string as unset.
    pub fn cursor_field(&self) -> Option<&str> {
        self.cursor_field.as_deref().filter(|f| !f.is_empty())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Connector and transformer blocks
// ═══════════════════════════════════════════════════════════════════════════════

/// A source or sink block: a type tag resolved through a
/// [`ConnectorRegistry`](crate::registry::ConnectorRegistry) plus settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(rename = "type")]
    pub connector_type: String,

    #[serde(default)]
    pub settings: Settings,
}

impl ConnectorConfig {
    pub fn new(connector_type: impl Into<String>) -> Self {
        Self {
            connector_type: connector_type.into(),
            settings: Settings::new(),
        }
    }

    /// String setting, empty when missing or not a string.
    pub fn get_string(&self, key: &str) -> String {
        self.settings
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Bool setting, `false` when missing or not a bool.
    pub fn get_bool(&self, key: &str) -> bool {
        self.settings
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Transformer block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformerConfig {
    /// `passthrough` or `fieldmapper`.
    #[serde(rename = "type")]
    pub transformer_type: String,

    #[serde(default)]
    pub settings: Settings,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Field mapper
// ═══════════════════════════════════════════════════════════════════════════════

/// How a mapped value is converted before it is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldFormat {
    #[default]
    Identity,
    String,
    Int,
    Float,
    Bool,
    Date,
    Uppercase,
    Lowercase,
    Trim,
    Titlecase,
}

impl FieldFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldFormat::Identity => "identity",
            FieldFormat::String => "string",
            FieldFormat::Int => "int",
            FieldFormat::Float => "float",
            FieldFormat::Bool => "bool",
            FieldFormat::Date => "date",
            FieldFormat::Uppercase => "uppercase",
            FieldFormat::Lowercase => "lowercase",
            FieldFormat::Trim => "trim",
            FieldFormat::Titlecase => "titlecase",
        }
    }
}

impl fmt::Display for FieldFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldFormat {
    type Err = PipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "" | "identity" => FieldFormat::Identity,
            "string" | "tostring" => FieldFormat::String,
            "int" | "toint" => FieldFormat::Int,
            "float" | "tofloat" => FieldFormat::Float,
            "bool" | "boolean" | "tobool" => FieldFormat::Bool,
            "date" | "datetime" | "todate" => FieldFormat::Date,
            "uppercase" => FieldFormat::Uppercase,
            "lowercase" => FieldFormat::Lowercase,
            "trim" => FieldFormat::Trim,
            "titlecase" => FieldFormat::Titlecase,
            other => {
                return Err(PipeError::Config(format!("unknown field format: {other}")));
            }
        };
        Ok(format)
    }
}

impl TryFrom<String> for FieldFormat {
    type Error = PipeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldFormat> for String {
    fn from(format: FieldFormat) -> Self {
        format.as_str().to_string()
    }
}

/// One declarative mapping rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Source field name. Also the output name when `destination` is unset.
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    #[serde(default)]
    pub format: FieldFormat,

    /// Used when the source value is missing or null. Empty means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default)]
    pub required: bool,

    /// Regex applied to the string form of the value. Group 1 wins if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<String>,

    /// Dot-separated path into nested maps (e.g. `address.city`).
    #[serde(default, alias = "nestedPath", skip_serializing_if = "Option::is_none")]
    pub nested_path: Option<String>,
}

impl FieldMapping {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn to(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_extract(mut self, pattern: impl Into<String>) -> Self {
        self.extract = Some(pattern.into());
        self
    }

    pub fn with_nested_path(mut self, path: impl Into<String>) -> Self {
        self.nested_path = Some(path.into());
        self
    }

    /// Output key: `destination`, falling back to `source`.
    pub fn destination(&self) -> &str {
        match self.destination.as_deref() {
            Some(dest) if !dest.is_empty() => dest,
            _ => &self.source,
        }
    }

    /// Default value, treating an empty string as unset.
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref().filter(|d| !d.is_empty())
    }
}

/// Field mapper settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapperConfig {
    /// Rules, applied in order.
    #[serde(default)]
    pub mappings: Vec<FieldMapping>,

    /// Copy unmapped fields through unchanged.
    #[serde(default)]
    pub include_all: bool,

    /// Fields never copied by `include_all`.
    #[serde(default)]
    pub exclude_fields: HashSet<String>,

    /// Abort the whole transform on the first rule failure.
    #[serde(default)]
    pub strict_mode: bool,
}

impl FieldMapperConfig {
    /// Config that leaves every event's data unchanged.
    pub fn identity() -> Self {
        Self {
            include_all: true,
            ..Default::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
