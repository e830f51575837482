//! Deterministic JSON output.
//!
//! Object keys are sorted at every level and arrays keep their order, so two
//! records with the same content always serialize to the same bytes.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// Recursively sort object keys.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize into a key-sorted [`Value`].
pub fn to_canonical_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(canonicalize(serde_json::to_value(value)?))
}

/// Two-space indented, key-sorted JSON followed by a newline.
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut text = serde_json::to_string_pretty(&to_canonical_value(value)?)?;
    text.push('\n');
    Ok(text)
}
