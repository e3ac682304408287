//! Recursive merge of JSON values.
//!
//! Objects and arrays are unioned key by key (index by index for arrays),
//! everything else overwrites. When the shapes disagree the destination is
//! smashed to the shape of the source before merging.

use serde_json::{Map, Value};

/// Merges `source` into `destination` in place. `source` is never modified.
pub fn deep_extend(destination: &mut Value, source: &Value) {
    match source {
        Value::Object(src) => {
            if !destination.is_object() {
                *destination = Value::Object(Map::new());
            }
            if let Value::Object(dst) = destination {
                extend_map(dst, src);
            }
        }
        Value::Array(src) => {
            if !destination.is_array() {
                *destination = Value::Array(Vec::with_capacity(src.len()));
            }
            if let Value::Array(dst) = destination {
                for (index, item) in src.iter().enumerate() {
                    if let Some(slot) = dst.get_mut(index) {
                        deep_extend(slot, item);
                    } else {
                        let mut slot = Value::Null;
                        deep_extend(&mut slot, item);
                        dst.push(slot);
                    }
                }
            }
        }
        scalar => *destination = scalar.clone(),
    }
}

/// Merges every key of `source` into `destination`.
pub fn extend_map(destination: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        let slot = destination.entry(key.clone()).or_insert(Value::Null);
        deep_extend(slot, value);
    }
}

/// Returns a fresh value holding `base` merged with `overrides`.
#[must_use]
pub fn merged(base: &Value, overrides: &Value) -> Value {
    let mut result = base.clone();
    deep_extend(&mut result, overrides);
    result
}
