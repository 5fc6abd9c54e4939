//! Filter construction helpers for vector store queries.
//!
//! Two filter shapes reach the client: a flat equality map (AND of exact matches)
//! produced by [`equality_filter`], and vendor-native filter objects the MCP
//! handlers assemble from the condition helpers below and pass through unchanged.

use serde_json::{Map, Value, json};

/// Exact-match condition on a payload field.
pub fn field_match(key: &str, value: Value) -> Value {
    json!({ "key": key, "match": { "value": value } })
}

/// Contains-any condition on an array payload field.
pub fn field_any(key: &str, values: Vec<Value>) -> Value {
    json!({ "key": key, "match": { "any": values } })
}

/// Range condition with optional inclusive bounds.
pub fn field_range(key: &str, gte: Option<Value>, lte: Option<Value>) -> Value {
    let mut bounds = Map::new();
    if let Some(gte) = gte {
        bounds.insert("gte".into(), gte);
    }
    if let Some(lte) = lte {
        bounds.insert("lte".into(), lte);
    }
    json!({ "key": key, "range": Value::Object(bounds) })
}

/// AND the given conditions into a filter object; `None` when empty.
pub fn and_filter(conditions: Vec<Value>) -> Option<Value> {
    if conditions.is_empty() {
        None
    } else {
        Some(json!({ "must": conditions }))
    }
}

/// Build a filter from a flat map of exact-match constraints.
pub fn equality_filter(constraints: &Map<String, Value>) -> Option<Value> {
    and_filter(
        constraints
            .iter()
            .map(|(key, value)| field_match(key, value.clone()))
            .collect(),
    )
}
