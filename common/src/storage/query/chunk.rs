//! Chunk operations: chunks have no standalone tool-level
//! identity — they are written and replaced wholesale by the Service
//! Layer whenever an entity's content crosses the chunking threshold,
//! in one transactional chunk-plus-embedding write.

use serde::Serialize;

use crate::error::MemoryError;
use crate::storage::connection::ConnectionManager;
use crate::storage::query::validate_embedding_dimension;
use crate::storage::types::chunk::Chunk;

#[derive(Debug, Clone, Serialize)]
pub struct NewChunk {
    pub id: String,
    pub content: String,
    pub position: i64,
    pub heading_path: Option<String>,
    pub labels: Vec<String>,
    pub embedding: Vec<f32>,
}

const REPLACE_STATEMENT: &str = "
    DELETE chunk WHERE entity = $entity_id;
    FOR $chunk IN $chunks {
        CREATE type::thing('chunk', $chunk.id) CONTENT {
            entity: $entity_id,
            content: $chunk.content,
            position: $chunk.position,
            heading_path: $chunk.heading_path,
            labels: $chunk.labels,
            embedding: $chunk.embedding,
            context: $context,
            created: time::now()
        };
    };
    SELECT * FROM chunk WHERE entity = $entity_id ORDER BY position ASC;
";

/// Replaces every chunk belonging to `entity_id` with `chunks` inside a
/// single transaction: delete-then-insert via a `FOR ... IN` block, so a
/// crash mid-write never leaves a stale chunk alongside fresh ones.
pub async fn replace_for_entity(
    db: &ConnectionManager,
    entity_id: &str,
    context: Option<&str>,
    chunks: Vec<NewChunk>,
    dim: u32,
) -> Result<Vec<Chunk>, MemoryError> {
    for chunk in &chunks {
        validate_embedding_dimension(&chunk.embedding, dim)?;
    }

    let mut response = db
        .client()
        .await
        .query(REPLACE_STATEMENT)
        .bind(("entity_id", entity_id.to_string()))
        .bind(("chunks", chunks))
        .bind(("context", context.map(str::to_string)))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    response.take(2).map_err(MemoryError::from)
}

pub async fn delete_for_entity(db: &ConnectionManager, entity_id: &str) -> Result<(), MemoryError> {
    db.client()
        .await
        .query("DELETE chunk WHERE entity = $entity_id;")
        .bind(("entity_id", entity_id.to_string()))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;
    Ok(())
}

pub async fn list_for_entity(db: &ConnectionManager, entity_id: &str) -> Result<Vec<Chunk>, MemoryError> {
    let mut response = db
        .client()
        .await
        .query("SELECT * FROM chunk WHERE entity = $entity_id ORDER BY position ASC;")
        .bind(("entity_id", entity_id.to_string()))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;
    response.take(0).map_err(MemoryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthScope;
    use crate::storage::connection::ConnectionSettings;
    use crate::storage::query::entity::{upsert, UpsertEntityInput};
    use crate::storage::schema::Schema;
    use crate::storage::types::entity::EntitySource;
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

    #[tokio::test]
    async fn replace_is_delete_then_insert() {
        let db = memory_db().await;
        upsert(
            &db,
            UpsertEntityInput {
                id: "doc".to_string(),
                entity_type: "document".to_string(),
                name: "Doc".to_string(),
                content: Some("long content".to_string()),
                summary: None,
                labels: vec![],
                confidence: 0.9,
                source: EntitySource::Manual,
                source_path: None,
                content_hash: None,
                metadata: serde_json::json!({}),
                embedding: None,
                context: None,
            },
            3,
        )
        .await
        .expect("upsert entity");

        let first_pass = vec![NewChunk {
            id: "doc-0".to_string(),
            content: "first".to_string(),
            position: 0,
            heading_path: None,
            labels: vec![],
            embedding: vec![0.1, 0.2, 0.3],
        }];
        replace_for_entity(&db, "doc", None, first_pass, 3)
            .await
            .expect("first replace");
        assert_eq!(list_for_entity(&db, "doc").await.expect("list").len(), 1);

        let second_pass = vec![
            NewChunk {
                id: "doc-0".to_string(),
                content: "first-v2".to_string(),
                position: 0,
                heading_path: None,
                labels: vec![],
                embedding: vec![0.1, 0.2, 0.3],
            },
            NewChunk {
                id: "doc-1".to_string(),
                content: "second".to_string(),
                position: 1,
                heading_path: None,
                labels: vec![],
                embedding: vec![0.4, 0.5, 0.6],
            },
        ];
        replace_for_entity(&db, "doc", None, second_pass, 3)
            .await
            .expect("second replace");
        let chunks = list_for_entity(&db, "doc").await.expect("list after replace");
        assert_eq!(chunks.len(), 2);
    }
}
