//! Fuzz target for value formatting.
//!
//! Every format must either convert or return an error, never panic, for
//! any text input. Successful int/bool conversions are checked for sanity.

#![no_main]

use data_pipe::config::FieldFormat;
use data_pipe::transform::format::{apply, titlecase};
use data_pipe::Value;
use libfuzzer_sys::fuzz_target;

const FORMATS: [FieldFormat; 10] = [
    FieldFormat::Identity,
    FieldFormat::String,
    FieldFormat::Int,
    FieldFormat::Float,
    FieldFormat::Bool,
    FieldFormat::Date,
    FieldFormat::Uppercase,
    FieldFormat::Lowercase,
    FieldFormat::Trim,
    FieldFormat::Titlecase,
];

fuzz_target!(|text: &str| {
    for format in FORMATS {
        match apply(format, Value::from(text)) {
            Ok(Value::Float(x)) => assert!(x.is_finite()),
            Ok(Value::Int(i)) if format == FieldFormat::Int => {
                // Plain decimal text must come back unchanged.
                if let Ok(exact) = text.trim().parse::<i64>() {
                    assert_eq!(i, exact);
                }
            }
            Ok(Value::Bool(b)) if format == FieldFormat::Bool => {
                let word = text.trim().to_ascii_lowercase();
                let truthy = matches!(word.as_str(), "true" | "t" | "yes" | "y" | "1");
                let falsy = matches!(word.as_str(), "false" | "f" | "no" | "n" | "0");
                assert!(if b { truthy } else { falsy });
            }
            Ok(_) | Err(_) => {}
        }
    }

    // Titlecase output never carries doubled or edge whitespace.
    let titled = titlecase(text);
    assert!(!titled.starts_with(' ') && !titled.ends_with(' '));
});
