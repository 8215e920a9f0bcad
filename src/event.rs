// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Canonical change events.
//!
//! Every source adapter converts its native change records (or backfilled
//! rows) into an [`Event`]. Transformers replace `data` wholesale; sinks
//! consume the event and drop it. No event outlives one pass through the
//! pipeline.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Field name to value mapping carried by an event.
pub type Record = HashMap<String, Value>;

/// Change operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Replace,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Replace => "replace",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Ok(Operation::Insert),
            "update" => Ok(Operation::Update),
            "replace" => Ok(Operation::Replace),
            "delete" => Ok(Operation::Delete),
            other => Err(format!("unknown operation: {other}")),
        }
    }
}

/// A dynamically typed field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<FixedOffset>),
    List(Vec<Value>),
    Map(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Record> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

/// The "string form" of a value: what extraction patterns and string
/// formats operate on.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
            Value::List(_) | Value::Map(_) => match serde_json::to_string(self) {
                Ok(json) => f.write_str(&json),
                Err(_) => f.write_str("null"),
            },
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Record> for Value {
    fn from(m: Record) -> Self {
        Value::Map(m)
    }
}

/// A change data capture event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Source-assigned identifier (document key, row key).
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    /// Tag naming the adapter that produced the event (e.g. "mongodb").
    pub source: String,
    pub database: String,
    pub collection: String,
    pub data: Record,
    /// Prior state, only for updates when the source provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Record>,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(id: impl Into<String>, operation: Operation, data: Record) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            operation,
            source: String::new(),
            database: String::new(),
            collection: String::new(),
            data,
            before: None,
        }
    }

    /// A synthetic insert, as produced for every backfilled record.
    pub fn insert(id: impl Into<String>, data: Record) -> Self {
        Self::new(id, Operation::Insert, data)
    }

    /// Set source tag, database and collection.
    pub fn with_origin(
        mut self,
        source: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        self.source = source.into();
        self.database = database.into();
        self.collection = collection.into();
        self
    }

    pub fn with_before(mut self, before: Record) -> Self {
        self.before = Some(before);
        self
    }
}

/// Build a [`Record`] from `key => value` pairs.
///
/// ```rust
/// use data_pipe::record;
/// let data = record! { "name" => "Ada", "age" => 36i64 };
/// assert_eq!(data.len(), 2);
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::event::Record::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::event::Record::new();
        $( map.insert(::std::string::String::from($key), $crate::event::Value::from($value)); )+
        map
    }};
}
