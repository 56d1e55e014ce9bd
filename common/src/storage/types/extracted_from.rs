//! The `ExtractedFrom` edge: provenance of an entity within the
//! episode it was extracted from, ordered by `position` with a
//! `confidence` score. Hand-rolled for the same reason as [`super::relation`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::types::deserialize_flexible_id;

pub const TABLE: &str = "extracted_from";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedFrom {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    #[serde(rename = "in", deserialize_with = "deserialize_flexible_id")]
    pub entity: String,
    #[serde(rename = "out", deserialize_with = "deserialize_flexible_id")]
    pub episode: String,
    pub position: i64,
    pub confidence: f32,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}
