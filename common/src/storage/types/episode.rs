//! The `Episode` record: a full recorded interaction, e.g. a
//! conversation transcript. Structurally close to [`super::entity::Entity`]
//! but timestamped and without labels/decay/importance.

use crate::stored_object;

stored_object!(Episode, "episode", {
    content: String,
    summary: Option<String>,
    embedding: Vec<f32>,
    timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    metadata: serde_json::Value,
    context: Option<String>,
    accessed: chrono::DateTime<chrono::Utc>,
    access_count: i64,
});
