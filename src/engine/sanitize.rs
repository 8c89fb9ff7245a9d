use serde_json::Value;

/// Flatten any JSON value into display text. Models occasionally return
/// ingredient or instruction entries as objects or nested lists despite the
/// prompt; every such shape must still become a flat string, never a panic
/// or a stringified blob leaking into the UI.
///
/// Strings pass through, lists join their flattened elements with spaces,
/// objects prefer a "text" then "name" field, scalars use their display
/// form. Null becomes empty (and empty entries are dropped by the caller).
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(coerce_to_string)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("name"))
            .map(coerce_to_string)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
    }
}

/// Flatten a JSON list into clean strings, dropping entries that end up
/// empty.
pub fn coerce_list(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(coerce_to_string)
        .filter(|s| !s.is_empty())
        .collect()
}
