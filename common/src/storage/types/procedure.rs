//! The `Procedure` record: an ordered named workflow.

use serde::{Deserialize, Serialize};

use crate::stored_object;

/// One step of a procedure. Preserved verbatim by the query layer; `order`
/// must be >= 1, strictly increasing and contiguous from 1 within a
/// procedure (enforced by the service layer at construction time, not by
/// the schema, since `steps` is stored as a flexible array).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub order: i64,
    pub content: String,
    #[serde(default)]
    pub optional: bool,
}

stored_object!(Procedure, "procedure", {
    name: String,
    description: String,
    steps: Vec<Step>,
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    labels: Vec<String>,
    context: Option<String>,
    accessed: chrono::DateTime<chrono::Utc>,
    access_count: i64,
});
