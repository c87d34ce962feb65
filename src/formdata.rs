// src/formdata.rs
//
// Multipart form submissions arrive as a flat key/value map with nesting
// encoded in the key names (`supplierIdentification[legalBusinessName]`).
// This module rebuilds the nested object graph and normalizes string-encoded
// booleans, so downstream handlers only ever see real structure.
use crate::errors::StockwiseError;
use crate::models::{FlatFormMap, NestedFormObject};
use log::warn;
use serde_json::{Map, Value};

/// Expand bracket-notated keys into nested objects and normalize booleans.
///
/// `a[b]` nests one level, `a[b][c]` nests two, and so on to any depth.
/// Plain keys copy through at the top level. Keys with broken bracket syntax
/// (unbalanced brackets, an empty `[]` segment, trailing text after a closing
/// bracket) are dropped with a warning; one bad field never fails the
/// request. Every string equal to "true"/"false" in any letter case, at any
/// depth, comes out as a boolean.
pub fn reconstruct(flat: FlatFormMap) -> NestedFormObject {
    let mut result = Map::new();

    for (key, value) in flat {
        if key.contains('[') {
            match parse_key_path(&key) {
                Some(path) => insert_path(&mut result, &path, value),
                None => warn!("dropping form field with malformed key: {}", key),
            }
        } else {
            result.insert(key, value);
        }
    }

    normalize_booleans(&mut result);
    result
}

/// Decode text fields that were submitted as JSON strings (option lists,
/// duty rosters). A value that looks like JSON but does not parse is a
/// client error, not something to pass through verbatim.
pub fn decode_json_fields(flat: &mut FlatFormMap) -> Result<(), StockwiseError> {
    for (_, value) in flat.iter_mut() {
        let Some(text) = value.as_str() else { continue };
        let trimmed = text.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            let parsed: Value = serde_json::from_str(trimmed)
                .map_err(|_| StockwiseError::InvalidInput("Invalid JSON format".to_string()))?;
            *value = parsed;
        }
    }
    Ok(())
}

/// Split a bracketed key into its segments: `a[b][c]` -> ["a", "b", "c"].
/// Returns None when the key does not follow the bracket grammar.
fn parse_key_path(key: &str) -> Option<Vec<&str>> {
    let head_end = key.find('[').unwrap_or(key.len());
    if head_end == 0 {
        return None;
    }

    let mut segments = vec![&key[..head_end]];
    let mut rest = &key[head_end..];

    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return None;
        }
        let close = rest.find(']')?;
        let segment = &rest[1..close];
        if segment.is_empty() || segment.contains('[') {
            return None;
        }
        segments.push(segment);
        rest = &rest[close + 1..];
    }

    Some(segments)
}

fn insert_path(target: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((head, tail)) = path.split_first() else {
        return;
    };

    if tail.is_empty() {
        target.insert((*head).to_string(), value);
        return;
    }

    let entry = target
        .entry((*head).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    // A scalar that previously landed under this key gives way to the object.
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(inner) = entry {
        insert_path(inner, tail, value);
    }
}

fn normalize_booleans(map: &mut Map<String, Value>) {
    for value in map.values_mut() {
        normalize_value(value);
    }
}

fn normalize_value(value: &mut Value) {
    match value {
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => *value = Value::Bool(true),
            "false" => *value = Value::Bool(false),
            _ => {}
        },
        Value::Object(map) => normalize_booleans(map),
        Value::Array(items) => {
            for item in items.iter_mut() {
                normalize_value(item);
            }
        }
        _ => {}
    }
}
