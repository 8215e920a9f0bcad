// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Declarative field mapping.
//!
//! Reshapes an event's `data` according to an ordered list of
//! [`FieldMapping`] rules plus an include/exclude policy for unmapped fields.
//!
//! # Per-rule steps
//!
//! ```text
//! resolve (source or nested_path) ──► missing? ──► required+strict: abort
//!                                        │         default set: use it
//!                                        │         otherwise: skip rule
//!                                        ▼
//!                                  extract (regex) ──► no match: skip (abort if required+strict)
//!                                        ▼
//!                                  format ──► error: skip (abort if strict)
//!                                        ▼
//!                             output[destination] = value
//! ```
//!
//! Rules always read from the event's original data, never from the output
//! being built. Patterns are compiled once at construction so a bad regex
//! fails before the first event.

use super::{format, Transformer};
use crate::config::{FieldMapperConfig, FieldMapping};
use crate::error::{MappingError, PipeError, Result};
use crate::event::{Event, Record, Value};
use regex::Regex;
use std::collections::HashSet;
use tracing::warn;

/// Mapped record plus the non-fatal issues, or the first strict-mode failure.
pub type MapResult = std::result::Result<(Record, Vec<MappingError>), MappingError>;

/// A rule with its extraction pattern compiled.
#[derive(Debug)]
struct CompiledRule {
    mapping: FieldMapping,
    extractor: Option<Regex>,
    path: Option<Vec<String>>,
}

/// Outcome of applying one rule.
enum RuleOutcome {
    Write(Value),
    Skip,
}

/// Transformer driven by [`FieldMapperConfig`].
#[derive(Debug)]
pub struct FieldMapper {
    rules: Vec<CompiledRule>,
    mapped_sources: HashSet<String>,
    exclude_fields: HashSet<String>,
    include_all: bool,
    strict_mode: bool,
}

impl FieldMapper {
    /// Validate `config` and compile every extraction pattern.
    ///
    /// Fails with [`PipeError::Config`] on an invalid regex, an empty
    /// `source`, or a `nested_path` with an empty segment.
    pub fn new(config: FieldMapperConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.mappings.len());

        for (index, mapping) in config.mappings.into_iter().enumerate() {
            if mapping.source.is_empty() {
                return Err(PipeError::Config(format!(
                    "mapping #{index} has an empty source field"
                )));
            }

            let extractor = match mapping.extract.as_deref().filter(|p| !p.is_empty()) {
                Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                    PipeError::Config(format!(
                        "invalid extract pattern for field {}: {e}",
                        mapping.source
                    ))
                })?),
                None => None,
            };

            let path = match mapping.nested_path.as_deref().filter(|p| !p.is_empty()) {
                Some(path) => {
                    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
                    if segments.iter().any(String::is_empty) {
                        return Err(PipeError::Config(format!(
                            "invalid nested path for field {}: {path}",
                            mapping.source
                        )));
                    }
                    Some(segments)
                }
                None => None,
            };

            rules.push(CompiledRule {
                mapping,
                extractor,
                path,
            });
        }

        let mapped_sources = rules.iter().map(|r| r.mapping.source.clone()).collect();

        Ok(Self {
            rules,
            mapped_sources,
            exclude_fields: config.exclude_fields,
            include_all: config.include_all,
            strict_mode: config.strict_mode,
        })
    }

    /// Build the new data mapping from `data`.
    ///
    /// Returns the output plus the non-fatal issues recorded along the way.
    /// Only returns `Err` in strict mode.
    pub fn map_record(&self, data: &Record) -> MapResult {
        let mut output = Record::with_capacity(self.rules.len());
        let mut issues = Vec::new();

        for rule in &self.rules {
            match self.apply_rule(rule, data, &mut issues)? {
                RuleOutcome::Write(value) => {
                    output.insert(rule.mapping.destination().to_string(), value);
                }
                RuleOutcome::Skip => {}
            }
        }

        if self.include_all {
            for (key, value) in data {
                if self.mapped_sources.contains(key) || self.exclude_fields.contains(key) {
                    continue;
                }
                output.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        Ok((output, issues))
    }

    fn apply_rule(
        &self,
        rule: &CompiledRule,
        data: &Record,
        issues: &mut Vec<MappingError>,
    ) -> std::result::Result<RuleOutcome, MappingError> {
        let mapping = &rule.mapping;
        let field = || mapping.source.clone();

        let value = match resolve(data, &mapping.source, rule.path.as_deref()) {
            Some(value) => value.clone(),
            None => {
                if mapping.required {
                    let issue = MappingError::MissingRequired { field: field() };
                    if self.strict_mode {
                        return Err(issue);
                    }
                    issues.push(issue);
                }
                match mapping.default_value() {
                    Some(default) => Value::String(default.to_string()),
                    None => return Ok(RuleOutcome::Skip),
                }
            }
        };

        let value = match &rule.extractor {
            Some(extractor) => {
                let text = value.to_string();
                // With a group, a non-participating group 1 extracts "".
                let group = usize::from(extractor.captures_len() > 1);
                let matched = extractor
                    .captures(&text)
                    .map(|caps| caps.get(group).map_or("", |m| m.as_str()).to_string());
                match matched {
                    Some(m) => Value::String(m),
                    None if mapping.required && self.strict_mode => {
                        return Err(MappingError::ExtractionFailed { field: field() });
                    }
                    None => return Ok(RuleOutcome::Skip),
                }
            }
            None => value,
        };

        match format::apply(mapping.format, value) {
            Ok(formatted) => Ok(RuleOutcome::Write(formatted)),
            Err(message) => {
                let issue = MappingError::Format {
                    field: field(),
                    message,
                };
                if self.strict_mode {
                    return Err(issue);
                }
                issues.push(issue);
                Ok(RuleOutcome::Skip)
            }
        }
    }
}

impl Transformer for FieldMapper {
    fn transform(&self, event: &mut Event) -> Result<()> {
        let (output, issues) = self.map_record(&event.data)?;

        for issue in &issues {
            warn!(event_id = %event.id, issue = %issue, "Non-fatal field mapping issue");
        }

        event.data = output;
        Ok(())
    }
}

/// Look up a field. A present null counts as missing.
///
/// With a path, every segment but the last must resolve to a map;
/// anything else is "not found", never an error.
fn resolve<'a>(data: &'a Record, source: &str, path: Option<&[String]>) -> Option<&'a Value> {
    let found = match path {
        None => data.get(source),
        Some(segments) => {
            let (last, parents) = segments.split_last()?;
            let mut current = data;
            for segment in parents {
                current = current.get(segment)?.as_map()?;
            }
            current.get(last)
        }
    };
    found.filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldFormat;
    use crate::record;

    fn mapper(mappings: Vec<FieldMapping>) -> FieldMapper {
        FieldMapper::new(FieldMapperConfig {
            mappings,
            ..Default::default()
        })
        .unwrap()
    }

    fn strict(mappings: Vec<FieldMapping>) -> FieldMapper {
        FieldMapper::new(FieldMapperConfig {
            mappings,
            strict_mode: true,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_basic_rename_drops_unmapped() {
        let fm = mapper(vec![
            FieldMapping::new("firstName").to("first_name"),
            FieldMapping::new("lastName").to("last_name"),
        ]);
        let mut event = Event::insert(
            "1",
            record! { "firstName" => "John", "lastName" => "Doe", "age" => 30i64 },
        );
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data["first_name"], Value::from("John"));
        assert_eq!(event.data["last_name"], Value::from("Doe"));
        assert!(!event.data.contains_key("age"));
        assert!(!event.data.contains_key("firstName"));
    }

    #[test]
    fn test_identity_config() {
        let fm = FieldMapper::new(FieldMapperConfig::identity()).unwrap();
        let data = record! { "a" => 1i64, "b" => "two", "c" => Value::Null };
        let mut event = Event::insert("1", data.clone());
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data, data);
    }

    #[test]
    fn test_lowercase_email() {
        let fm = mapper(vec![FieldMapping::new("email").with_format(FieldFormat::Lowercase)]);
        let mut event = Event::insert("1", record! { "email" => "JOHN@X.COM" });
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data, record! { "email" => "john@x.com" });
    }

    #[test]
    fn test_two_extractors_on_same_source() {
        let fm = mapper(vec![
            FieldMapping::new("email").to("username").with_extract("^([^@]+)@"),
            FieldMapping::new("email").to("domain").with_extract("@(.+)$"),
        ]);
        let mut event = Event::insert("1", record! { "email" => "john.doe@example.com" });
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data["username"], Value::from("john.doe"));
        assert_eq!(event.data["domain"], Value::from("example.com"));
    }

    #[test]
    fn test_extract_without_group_uses_whole_match() {
        let fm = mapper(vec![FieldMapping::new("code").with_extract("[0-9]+")]);
        let mut event = Event::insert("1", record! { "code" => "ORD-12345-X" });
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data["code"], Value::from("12345"));
    }

    #[test]
    fn test_extract_unmatched_group_yields_empty() {
        let fm = mapper(vec![FieldMapping::new("code").with_extract("^([0-9]+)?[a-z]+$")]);
        let mut event = Event::insert("1", record! { "code" => "abc" });
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data["code"], Value::from(""));
    }

    #[test]
    fn test_extract_no_match_skips_without_default() {
        let fm = mapper(vec![FieldMapping::new("code")
            .with_extract("[0-9]+")
            .with_default("0")]);
        let mut event = Event::insert("1", record! { "code" => "none" });
        fm.transform(&mut event).unwrap();
        assert!(!event.data.contains_key("code"));
    }

    #[test]
    fn test_extract_no_match_strict_required_aborts() {
        let fm = strict(vec![FieldMapping::new("code").with_extract("[0-9]+").required()]);
        let mut event = Event::insert("1", record! { "code" => "none" });
        let err = fm.transform(&mut event).unwrap_err();
        assert!(matches!(err, PipeError::Mapping(MappingError::ExtractionFailed { .. })));
        assert_eq!(event.data, record! { "code" => "none" });
    }

    #[test]
    fn test_extract_no_match_strict_optional_skips() {
        let fm = strict(vec![FieldMapping::new("code").with_extract("[0-9]+")]);
        let mut event = Event::insert("1", record! { "code" => "none" });
        fm.transform(&mut event).unwrap();
        assert!(event.data.is_empty());
    }

    #[test]
    fn test_required_missing_strict_errors_and_leaves_data() {
        let fm = strict(vec![FieldMapping::new("email").required()]);
        let original = record! { "name" => "John" };
        let mut event = Event::insert("1", original.clone());
        let err = fm.transform(&mut event).unwrap_err();
        assert!(matches!(
            err,
            PipeError::Mapping(MappingError::MissingRequired { ref field }) if field == "email"
        ));
        assert_eq!(event.data, original);
    }

    #[test]
    fn test_required_missing_lenient_omits_key() {
        let fm = mapper(vec![FieldMapping::new("email").required()]);
        let mut event = Event::insert("1", record! { "name" => "John" });
        fm.transform(&mut event).unwrap();
        assert!(!event.data.contains_key("email"));
    }

    #[test]
    fn test_required_missing_lenient_uses_default() {
        let fm = mapper(vec![FieldMapping::new("status").required().with_default("pending")]);
        let (output, issues) = fm.map_record(&record! {}).unwrap();
        assert_eq!(output["status"], Value::from("pending"));
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_null_treated_as_missing() {
        let fm = mapper(vec![FieldMapping::new("status").with_default("active")]);
        let mut event = Event::insert("1", record! { "status" => Value::Null });
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data["status"], Value::from("active"));
    }

    #[test]
    fn test_empty_string_and_zero_not_replaced_by_default() {
        let fm = mapper(vec![
            FieldMapping::new("note").with_default("n/a"),
            FieldMapping::new("count").with_default("10"),
        ]);
        let mut event = Event::insert("1", record! { "note" => "", "count" => 0i64 });
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data["note"], Value::from(""));
        assert_eq!(event.data["count"], Value::Int(0));
    }

    #[test]
    fn test_default_is_formatted() {
        let fm = mapper(vec![FieldMapping::new("count")
            .with_default("10")
            .with_format(FieldFormat::Int)]);
        let mut event = Event::insert("1", record! {});
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data["count"], Value::Int(10));
    }

    #[test]
    fn test_nested_path_resolves_leaf() {
        let fm = mapper(vec![FieldMapping::new("user")
            .to("email")
            .with_nested_path("user.profile.contact.email")]);
        let data = record! {
            "user" => record! {
                "profile" => record! {
                    "contact" => record! { "email" => "deep@example.com" }
                }
            }
        };
        let mut event = Event::insert("1", data);
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data["email"], Value::from("deep@example.com"));
    }

    #[test]
    fn test_nested_path_missing_intermediate() {
        let fm = mapper(vec![FieldMapping::new("user")
            .to("email")
            .with_nested_path("user.profile.contact.email")
            .with_default("unknown")]);
        let mut event = Event::insert("1", record! { "user" => record! { "name" => "x" } });
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data["email"], Value::from("unknown"));
    }

    #[test]
    fn test_nested_path_through_non_map() {
        let fm = mapper(vec![FieldMapping::new("user")
            .to("city")
            .with_nested_path("user.address.city")]);
        let mut event = Event::insert(
            "1",
            record! { "user" => record! { "address" => "12 Main St" } },
        );
        fm.transform(&mut event).unwrap();
        assert!(!event.data.contains_key("city"));
    }

    #[test]
    fn test_format_error_lenient_skips() {
        let fm = mapper(vec![
            FieldMapping::new("age").with_format(FieldFormat::Int).with_default("0"),
            FieldMapping::new("name"),
        ]);
        let (output, issues) = fm.map_record(&record! { "age" => "old", "name" => "Ada" }).unwrap();
        assert!(!output.contains_key("age"));
        assert_eq!(output["name"], Value::from("Ada"));
        assert!(matches!(issues[0], MappingError::Format { .. }));
    }

    #[test]
    fn test_format_error_strict_aborts() {
        let fm = strict(vec![FieldMapping::new("active").with_format(FieldFormat::Bool)]);
        let mut event = Event::insert("1", record! { "active" => "maybe" });
        let err = fm.transform(&mut event).unwrap_err();
        assert!(matches!(err, PipeError::Mapping(MappingError::Format { .. })));
        assert_eq!(event.data["active"], Value::from("maybe"));
    }

    #[test]
    fn test_include_all_with_exclusions() {
        let fm = FieldMapper::new(FieldMapperConfig {
            mappings: vec![FieldMapping::new("name").to("full_name")],
            include_all: true,
            exclude_fields: ["password".to_string()].into_iter().collect(),
            strict_mode: false,
        })
        .unwrap();
        let mut event = Event::insert("1", record! {
            "name" => "John Doe",
            "age" => 30i64,
            "password" => "hunter2",
        });
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data["full_name"], Value::from("John Doe"));
        assert_eq!(event.data["age"], Value::Int(30));
        assert!(!event.data.contains_key("name"));
        assert!(!event.data.contains_key("password"));
    }

    #[test]
    fn test_include_all_never_overwrites_rule_output() {
        let fm = FieldMapper::new(FieldMapperConfig {
            mappings: vec![FieldMapping::new("nickname").to("name")],
            include_all: true,
            ..Default::default()
        })
        .unwrap();
        let mut event = Event::insert("1", record! { "nickname" => "Ace", "name" => "Alice" });
        fm.transform(&mut event).unwrap();
        assert_eq!(event.data["name"], Value::from("Ace"));
        assert_eq!(event.data.len(), 1);
    }

    #[test]
    fn test_later_rule_wins_on_collision() {
        let fm = mapper(vec![
            FieldMapping::new("a").to("out"),
            FieldMapping::new("b").to("out"),
        ]);
        let (output, _) = fm.map_record(&record! { "a" => "first", "b" => "second" }).unwrap();
        assert_eq!(output["out"], Value::from("second"));
    }

    #[test]
    fn test_rules_read_original_data() {
        // The first rule writes "b"; the second must still see the original "b".
        let fm = mapper(vec![
            FieldMapping::new("a").to("b"),
            FieldMapping::new("b").to("c"),
        ]);
        let (output, _) = fm.map_record(&record! { "a" => "from-a", "b" => "from-b" }).unwrap();
        assert_eq!(output["b"], Value::from("from-a"));
        assert_eq!(output["c"], Value::from("from-b"));
    }

    #[test]
    fn test_invalid_regex_fails_construction() {
        let err = FieldMapper::new(FieldMapperConfig {
            mappings: vec![FieldMapping::new("x").with_extract("([unclosed")],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            PipeError::Config(ref msg) if msg.contains("invalid extract pattern")
        ));
    }

    #[test]
    fn test_empty_source_fails_construction() {
        let result = FieldMapper::new(FieldMapperConfig {
            mappings: vec![FieldMapping::new("")],
            ..Default::default()
        });
        assert!(matches!(result, Err(PipeError::Config(_))));
    }

    #[test]
    fn test_empty_path_segment_fails_construction() {
        let result = FieldMapper::new(FieldMapperConfig {
            mappings: vec![FieldMapping::new("user").with_nested_path("user..email")],
            ..Default::default()
        });
        assert!(matches!(result, Err(PipeError::Config(_))));
    }

    #[test]
    fn test_metadata_untouched() {
        let fm = mapper(vec![FieldMapping::new("a")]);
        let mut event =
            Event::insert("id-9", record! { "a" => 1i64 }).with_origin("mongodb", "db", "coll");
        fm.transform(&mut event).unwrap();
        assert_eq!(event.id, "id-9");
        assert_eq!(event.collection, "coll");
    }
}
