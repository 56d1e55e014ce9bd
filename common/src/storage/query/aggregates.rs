//! Bulk aggregation helpers: `ListLabels`, `ListTypes`,
//! `GetExistingHashes`.

use serde::Deserialize;

use crate::error::MemoryError;
use crate::storage::connection::ConnectionManager;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

/// `ListLabels(context?) → [{label, count}]`.
pub async fn list_labels(
    db: &ConnectionManager,
    context: Option<&str>,
) -> Result<Vec<LabelCount>, MemoryError> {
    let mut response = db
        .client()
        .await
        .query(
            "SELECT label, count() AS count FROM (
                SELECT labels.* AS label FROM entity
                WHERE $context IS NONE OR context = $context
            ) GROUP BY label ORDER BY count DESC;",
        )
        .bind(("context", context.map(str::to_string)))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    response.take(0).map_err(MemoryError::from)
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub count: i64,
}

/// `ListTypes(context?) → [{type, count}]`.
pub async fn list_types(
    db: &ConnectionManager,
    context: Option<&str>,
) -> Result<Vec<TypeCount>, MemoryError> {
    let mut response = db
        .client()
        .await
        .query(
            "SELECT type, count() AS count FROM entity
                WHERE $context IS NONE OR context = $context
                GROUP BY type ORDER BY count DESC;",
        )
        .bind(("context", context.map(str::to_string)))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    response.take(0).map_err(MemoryError::from)
}

/// `GetExistingHashes(hashes[]) → hashes[]`: used by the
/// Service Layer's ingestion path to skip re-embedding unchanged content.
pub async fn get_existing_hashes(
    db: &ConnectionManager,
    hashes: &[String],
) -> Result<Vec<String>, MemoryError> {
    if hashes.is_empty() {
        return Ok(Vec::new());
    }

    let mut response = db
        .client()
        .await
        .query("SELECT VALUE content_hash FROM entity WHERE content_hash IN $hashes;")
        .bind(("hashes", hashes.to_vec()))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    response.take(0).map_err(MemoryError::from)
}
