//! The `Entity` record: an atomic knowledge unit.
//!
//! Built on [`stored_object!`] plus a handful of free-form fields:
//! labels, confidence, provenance, decay and importance.

use serde::{Deserialize, Serialize};

use crate::stored_object;

/// Provenance of an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntitySource {
    Manual,
    Ingest,
    Extracted,
    Ai,
}

stored_object!(Entity, "entity", {
    #[serde(rename = "type")]
    entity_type: String,
    name: String,
    content: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    confidence: f32,
    source: EntitySource,
    source_path: Option<String>,
    content_hash: Option<String>,
    #[serde(default)]
    metadata: serde_json::Value,
    embedding: Option<Vec<f32>>,
    accessed: chrono::DateTime<chrono::Utc>,
    access_count: i64,
    decay_weight: f32,
    importance: f32,
    user_importance: Option<f32>,
    context: Option<String>,
});

/// Floor  mandates for `decay_weight`: it never drops below this
/// regardless of how many times `ApplyDecay` runs.
pub const DECAY_FLOOR: f32 = 0.1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_source_round_trips_through_json() {
        let value = serde_json::to_value(EntitySource::Extracted).unwrap();
        assert_eq!(value, serde_json::json!("extracted"));
        let back: EntitySource = serde_json::from_value(value).unwrap();
        assert_eq!(back, EntitySource::Extracted);
    }
}
