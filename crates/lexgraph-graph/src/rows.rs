//! Typed accessors over untyped result rows.
//!
//! Optional matches legitimately produce nulls, so every accessor is lenient:
//! a missing or null column reads as `None` / empty rather than an error.

use lexgraph_core::{Party, Row};
use serde_json::Value;

/// Read a column as text. Numbers and booleans are rendered.
pub fn get_str(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read a column as an integer. Integral text is accepted.
pub fn get_i64(row: &Row, key: &str) -> Option<i64> {
    match row.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn get_f64(row: &Row, key: &str) -> Option<f64> {
    row.get(key).and_then(Value::as_f64)
}

/// Read a list column, skipping nulls and non-text entries.
pub fn get_str_list(row: &Row, key: &str) -> Vec<String> {
    match row.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode a `collect({name, role, country, state})` column into parties.
///
/// Entries produced by an unmatched optional pattern (null name) are dropped.
pub fn get_parties(row: &Row, key: &str) -> Vec<Party> {
    let Some(Value::Array(items)) = row.get(key) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let name = obj.get("name")?.as_str()?.to_string();
            let text = |k: &str| obj.get(k).and_then(Value::as_str).map(str::to_string);
            Some(Party {
                name,
                role: text("role"),
                incorporation_country: text("country"),
                incorporation_state: text("state"),
            })
        })
        .collect()
}
