// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Value formatting for field mapping rules.
//!
//! Every format except `Identity` works from either the typed value (where
//! a lossless conversion exists) or the value's string form.
//!
//! | Format | Output | Fails on |
//! |--------|--------|----------|
//! | `string` | `String` | never |
//! | `int` | `Int` | non-numeric text, trailing garbage, overflow |
//! | `float` | `Float` | non-numeric text, NaN/infinity |
//! | `bool` | `Bool` | anything outside true/t/yes/y/1, false/f/no/n/0 |
//! | `date` | `Timestamp` | no layout matches |
//! | `uppercase`/`lowercase`/`trim`/`titlecase` | `String` | never |

use crate::config::FieldFormat;
use crate::event::Value;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// Layouts tried in order after RFC3339.
const OFFSET_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
const DATETIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_LAYOUT: &str = "%Y-%m-%d";

/// Apply `format` to `value`. The error is a human-readable reason.
pub fn apply(format: FieldFormat, value: Value) -> Result<Value, String> {
    match format {
        FieldFormat::Identity => Ok(value),
        FieldFormat::String => Ok(Value::String(value.to_string())),
        FieldFormat::Int => to_int(&value).map(Value::Int),
        FieldFormat::Float => to_float(&value).map(Value::Float),
        FieldFormat::Bool => to_bool(&value).map(Value::Bool),
        FieldFormat::Date => to_date(&value).map(Value::Timestamp),
        FieldFormat::Uppercase => Ok(Value::String(value.to_string().to_uppercase())),
        FieldFormat::Lowercase => Ok(Value::String(value.to_string().to_lowercase())),
        FieldFormat::Trim => Ok(Value::String(value.to_string().trim().to_string())),
        FieldFormat::Titlecase => Ok(Value::String(titlecase(&value.to_string()))),
    }
}

fn to_int(value: &Value) -> Result<i64, String> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Float(x) => truncate(*x).ok_or_else(|| format!("cannot convert to int: {x}")),
        other => {
            let text = other.to_string();
            let trimmed = text.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(i);
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(truncate)
                .ok_or_else(|| format!("cannot convert to int: {text}"))
        }
    }
}

/// Truncate toward zero when the result fits in an i64.
fn truncate(x: f64) -> Option<i64> {
    if !x.is_finite() {
        return None;
    }
    let t = x.trunc();
    // i64::MAX is not representable as f64; 2^63 is the first value out of range.
    if t >= -9_223_372_036_854_775_808.0 && t < 9_223_372_036_854_775_808.0 {
        Some(t as i64)
    } else {
        None
    }
}

fn to_float(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Float(x) => Some(*x),
        Value::Int(i) => Some(*i as f64),
        other => other.to_string().trim().parse::<f64>().ok(),
    };
    match parsed {
        Some(x) if x.is_finite() => Ok(x),
        _ => Err(format!("cannot convert to float: {value}")),
    }
}

fn to_bool(value: &Value) -> Result<bool, String> {
    if let Value::Bool(b) = value {
        return Ok(*b);
    }
    let text = value.to_string();
    match text.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err(format!("cannot convert to bool: {text}")),
    }
}

fn to_date(value: &Value) -> Result<DateTime<FixedOffset>, String> {
    if let Value::Timestamp(ts) = value {
        return Ok(*ts);
    }
    let text = value.to_string();
    let utc = FixedOffset::east_opt(0).ok_or("invalid UTC offset")?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(&text) {
        return Ok(ts);
    }
    if let Ok(ts) = DateTime::parse_from_str(&text, OFFSET_LAYOUT) {
        return Ok(ts);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&text, DATETIME_LAYOUT) {
        return Ok(naive.and_utc().with_timezone(&utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&text, DATE_LAYOUT) {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().with_timezone(&utc));
        }
    }
    Err(format!("cannot parse date: {text}"))
}

/// Capitalize the first character of each whitespace-delimited token and
/// lowercase the rest. Tokens are re-joined with single spaces.
pub fn titlecase(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
