//! The `Relation` edge: a directed-but-deduplicated-as-unordered
//! typed edge between two entities.
//!
//! Hand-rolled rather than built on [`stored_object!`]: edge records
//! carry `in`/`out` record references that the macro's flat field list
//! has no slot for, so both structs deserialize those fields directly
//! with [`deserialize_flexible_id`] instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::types::deserialize_flexible_id;

pub const TABLE: &str = "relates";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    #[serde(rename = "in", deserialize_with = "deserialize_flexible_id")]
    pub in_: String,
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub out: String,
    pub rel_type: String,
    pub weight: f32,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}
