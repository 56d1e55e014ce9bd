//! Id prefix normalization: external callers may supply ids
//! with or without the `"entity:"` / `"episode:"` / `"procedure:"`
//! prefix; the adapter strips it for lookup and always re-emits the
//! fully-qualified form in responses.

use serde::Serialize;
use serde_json::Value;

use crate::error::ToolError;

/// Strips a leading `"{table}:"` prefix, if present, leaving any further
/// colons (e.g. a composite id's own `context:` prefix) untouched.
#[must_use]
pub fn strip_prefix(table: &str, id: &str) -> String {
    let prefix = format!("{table}:");
    id.strip_prefix(prefix.as_str()).unwrap_or(id).to_string()
}

/// Re-attaches the table prefix for the fully-qualified id every
/// response carries.
#[must_use]
pub fn qualify(table: &str, raw_id: &str) -> String {
    format!("{table}:{raw_id}")
}

/// Serializes `record` and overwrites its `id` field with the
/// fully-qualified form, so every response row names its id the same way
/// regardless of what the caller supplied on input.
pub fn record_json(table: &str, raw_id: &str, record: &impl Serialize) -> Result<Value, ToolError> {
    let mut value = serde_json::to_value(record)
        .map_err(|err| ToolError::internal(format!("failed to serialize {table} record: {err}")))?;
    if let Value::Object(ref mut map) = value {
        map.insert("id".to_string(), Value::String(qualify(table, raw_id)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_the_table_prefix() {
        assert_eq!(strip_prefix("entity", "entity:proj-a:alpha"), "proj-a:alpha");
        assert_eq!(strip_prefix("entity", "proj-a:alpha"), "proj-a:alpha");
    }

    #[test]
    fn qualifies_raw_id() {
        assert_eq!(qualify("episode", "abc-123"), "episode:abc-123");
    }
}
