//! Entity operations: `UpsertEntity`, `GetEntity`,
//! `DeleteEntity`, `UpdateAccess`.
//!
//! Upsert runs as `UPSERT ... RETURN AFTER` with additive label merging
//! and field preservation on update, rather than an unconditional
//! overwrite.

use serde::Deserialize;

use crate::error::MemoryError;
use crate::storage::connection::ConnectionManager;
use crate::storage::query::validate_embedding_dimension;
use crate::storage::types::entity::{Entity, EntitySource};

/// Input to [`upsert`]. Every field the caller supplies is written
/// unconditionally except `labels` (additively merged) and
/// `access_count`/`importance`, which are preserved from the existing row.
#[derive(Debug, Clone)]
pub struct UpsertEntityInput {
    pub id: String,
    pub entity_type: String,
    pub name: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub labels: Vec<String>,
    pub confidence: f32,
    pub source: EntitySource,
    pub source_path: Option<String>,
    pub content_hash: Option<String>,
    pub metadata: serde_json::Value,
    pub embedding: Option<Vec<f32>>,
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExistsRow {
    count: i64,
}

const UPSERT_STATEMENT: &str = r#"
    SELECT count() FROM ONLY entity WHERE id = type::thing('entity', $id) GROUP ALL;
    UPSERT type::thing('entity', $id) SET
        type = $type,
        name = $name,
        content = $content,
        summary = $summary,
        labels = array::union(IF labels != NONE THEN labels ELSE [] END, $labels),
        confidence = $confidence,
        source = $source,
        source_path = $source_path,
        content_hash = $content_hash,
        metadata = $metadata,
        embedding = $embedding,
        context = $context,
        created = IF created != NONE THEN created ELSE time::now() END,
        updated = time::now(),
        accessed = IF accessed != NONE THEN accessed ELSE time::now() END,
        access_count = IF access_count != NONE THEN access_count ELSE 0 END,
        decay_weight = IF decay_weight != NONE THEN decay_weight ELSE 1.0 END,
        importance = IF importance != NONE THEN importance ELSE 0.5 END
    RETURN AFTER;
"#;

/// `UpsertEntity(id, type, labels, content, embedding, confidence, source,
/// context) → (entity, wasCreated)`.
pub async fn upsert(
    db: &ConnectionManager,
    input: UpsertEntityInput,
    dim: u32,
) -> Result<(Entity, bool), MemoryError> {
    if input.id.trim().is_empty() {
        return Err(MemoryError::InvalidInput(
            "entity id must not be empty".into(),
        ));
    }
    if input.name.trim().is_empty() {
        return Err(MemoryError::InvalidInput(
            "entity name must not be empty".into(),
        ));
    }
    if let Some(embedding) = &input.embedding {
        validate_embedding_dimension(embedding, dim)?;
    }

    let mut response = db
        .client()
        .await
        .query(UPSERT_STATEMENT)
        .bind(("id", input.id.clone()))
        .bind(("type", input.entity_type))
        .bind(("name", input.name))
        .bind(("content", input.content))
        .bind(("summary", input.summary))
        .bind(("labels", input.labels))
        .bind(("confidence", input.confidence))
        .bind(("source", input.source))
        .bind(("source_path", input.source_path))
        .bind(("content_hash", input.content_hash))
        .bind(("metadata", input.metadata))
        .bind(("embedding", input.embedding))
        .bind(("context", input.context))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let existed: Vec<ExistsRow> = response.take(0).map_err(MemoryError::from)?;
    let was_created = existed.first().map_or(true, |row| row.count == 0);

    let rows: Vec<Entity> = response.take(1).map_err(MemoryError::from)?;
    let entity = rows.into_iter().next().ok_or_else(|| {
        MemoryError::Internal(format!("upsert of entity {} returned no row", input.id))
    })?;

    Ok((entity, was_created))
}

/// `GetEntity(id) → entity|nil`. Absence is not an error.
pub async fn get(db: &ConnectionManager, id: &str) -> Result<Option<Entity>, MemoryError> {
    db.client()
        .await
        .select(("entity", id))
        .await
        .map_err(MemoryError::from)
}

/// `DeleteEntity(ids…) → int`. Idempotent: a missing id
/// contributes 0 and is not an error. Deletion itself triggers the schema
/// installer's cascade event for chunks/relations/extracted_from edges.
pub async fn delete(db: &ConnectionManager, ids: &[String]) -> Result<u64, MemoryError> {
    let client = db.client().await;
    let mut deleted = 0u64;
    for id in ids {
        let existing: Option<Entity> = client
            .delete(("entity", id.as_str()))
            .await
            .map_err(MemoryError::from)?;
        if existing.is_some() {
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// `UpdateAccess(entity_id)`: increments `access_count`, sets
/// `accessed = now()`, and resets `decay_weight` to 1.0. No-op for a
/// missing id; failures here are always best-effort.
pub async fn update_access(db: &ConnectionManager, id: &str) -> Result<(), MemoryError> {
    db.client()
        .await
        .query(
            "UPDATE type::thing('entity', $id) SET
                accessed = time::now(),
                access_count = IF access_count != NONE THEN access_count + 1 ELSE 1 END,
                decay_weight = 1.0;",
        )
        .bind(("id", id.to_string()))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthScope;
    use crate::storage::connection::ConnectionSettings;
    use crate::storage::schema::Schema;
    use uuid::Uuid;

    async fn memory_db() -> std::sync::Arc<ConnectionManager> {
        let settings = ConnectionSettings {
            address: "mem://".to_string(),
            namespace: "test_ns".to_string(),
            database: Uuid::new_v4().to_string(),
            username: String::new(),
            password: String::new(),
            auth_scope: AuthScope::Root,
        };
        let db = ConnectionManager::connect(settings)
            .await
            .expect("in-memory connection");
        Schema::install(&db, 3).await.expect("schema install");
        db
    }

    fn sample_input(id: &str, labels: Vec<String>) -> UpsertEntityInput {
        UpsertEntityInput {
            id: id.to_string(),
            entity_type: "document".to_string(),
            name: "Alpha".to_string(),
            content: Some("a programming language".to_string()),
            summary: None,
            labels,
            confidence: 0.9,
            source: EntitySource::Manual,
            source_path: None,
            content_hash: None,
            metadata: serde_json::json!({}),
            embedding: Some(vec![0.1, 0.2, 0.3]),
            context: Some("proj-a".to_string()),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_merges_labels() {
        let db = memory_db().await;

        let (first, created) = upsert(&db, sample_input("alpha", vec!["lang".into()]), 3)
            .await
            .expect("first upsert");
        assert!(created);
        assert_eq!(first.labels, vec!["lang".to_string()]);

        let (second, created) = upsert(&db, sample_input("alpha", vec!["web".into()]), 3)
            .await
            .expect("second upsert");
        assert!(!created);
        let mut labels = second.labels.clone();
        labels.sort();
        assert_eq!(labels, vec!["lang".to_string(), "web".to_string()]);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension_embedding() {
        let db = memory_db().await;
        let mut input = sample_input("beta", vec![]);
        input.embedding = Some(vec![0.1, 0.2]);
        let err = upsert(&db, input, 3).await.unwrap_err();
        assert!(matches!(err, MemoryError::Embedding(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let db = memory_db().await;
        upsert(&db, sample_input("gamma", vec![]), 3)
            .await
            .expect("upsert");

        let deleted = delete(&db, &["gamma".to_string()]).await.expect("delete");
        assert_eq!(deleted, 1);

        let deleted_again = delete(&db, &["gamma".to_string()])
            .await
            .expect("delete again");
        assert_eq!(deleted_again, 0);
    }

    #[tokio::test]
    async fn get_returns_none_for_missing_id() {
        let db = memory_db().await;
        let found = get(&db, "does-not-exist").await.expect("get");
        assert!(found.is_none());
    }
}
