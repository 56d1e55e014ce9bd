//! Episode operations: `CreateEpisode`, `GetEpisode`,
//! `DeleteEpisode`, `SearchEpisodes`, `UpdateEpisodeAccess`.
//!
//! Episodes behave analogously to entities but add time-range filtering
//! and have no label/decay/importance machinery.

use chrono::{DateTime, Utc};

use crate::error::MemoryError;
use crate::storage::connection::ConnectionManager;
use crate::storage::query::validate_embedding_dimension;
use crate::storage::types::episode::Episode;

#[derive(Debug, Clone)]
pub struct CreateEpisodeInput {
    pub id: String,
    pub content: String,
    pub summary: Option<String>,
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
    pub context: Option<String>,
}

/// `CreateEpisode`: episodes are append-only — `timestamp` is
/// set once at creation and never revisited, unlike an entity's `updated`.
pub async fn create(
    db: &ConnectionManager,
    input: CreateEpisodeInput,
    dim: u32,
) -> Result<Episode, MemoryError> {
    if input.content.trim().is_empty() {
        return Err(MemoryError::InvalidInput(
            "episode content must not be empty".into(),
        ));
    }
    validate_embedding_dimension(&input.embedding, dim)?;

    let mut response = db
        .client()
        .await
        .query(
            "CREATE type::thing('episode', $id) CONTENT {
                content: $content,
                summary: $summary,
                embedding: $embedding,
                timestamp: time::now(),
                metadata: $metadata,
                context: $context,
                created: time::now(),
                accessed: time::now(),
                access_count: 0
            } RETURN AFTER;",
        )
        .bind(("id", input.id.clone()))
        .bind(("content", input.content))
        .bind(("summary", input.summary))
        .bind(("embedding", input.embedding))
        .bind(("metadata", input.metadata))
        .bind(("context", input.context))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<Episode> = response.take(0).map_err(MemoryError::from)?;
    rows.into_iter()
        .next()
        .ok_or_else(|| MemoryError::Internal(format!("create of episode {} returned no row", input.id)))
}

pub async fn get(db: &ConnectionManager, id: &str) -> Result<Option<Episode>, MemoryError> {
    db.client()
        .await
        .select(("episode", id))
        .await
        .map_err(MemoryError::from)
}

pub async fn delete(db: &ConnectionManager, id: &str) -> Result<bool, MemoryError> {
    let existing: Option<Episode> = db
        .client()
        .await
        .delete(("episode", id))
        .await
        .map_err(MemoryError::from)?;
    Ok(existing.is_some())
}

pub async fn update_access(db: &ConnectionManager, id: &str) -> Result<(), MemoryError> {
    db.client()
        .await
        .query(
            "UPDATE type::thing('episode', $id) SET
                accessed = time::now(),
                access_count = IF access_count != NONE THEN access_count + 1 ELSE 1 END;",
        )
        .bind(("id", id.to_string()))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;
    Ok(())
}

/// `SearchEpisodes(query, embedding, time_start?, time_end?, context?,
/// limit)`: BM25-only text search scoped by time range and
/// context. Unlike entity search this has no vector branch in the query
/// layer — vector recall for episodes is handled by the Retrieval Engine's
/// hybrid fusion, which issues its own HNSW probe directly.
pub async fn search(
    db: &ConnectionManager,
    query_text: &str,
    time_start: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
    context: Option<&str>,
    limit: u32,
) -> Result<Vec<Episode>, MemoryError> {
    let mut response = db
        .client()
        .await
        .query(
            "SELECT * FROM episode
                WHERE content @0@ $query
                AND ($time_start IS NONE OR timestamp >= $time_start)
                AND ($time_end IS NONE OR timestamp <= $time_end)
                AND ($context IS NONE OR context = $context)
                ORDER BY search::score(0) DESC
                LIMIT $limit;",
        )
        .bind(("query", query_text.to_string()))
        .bind(("time_start", time_start))
        .bind(("time_end", time_end))
        .bind(("context", context.map(str::to_string)))
        .bind(("limit", limit))
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

    fn sample_input(id: &str) -> CreateEpisodeInput {
        CreateEpisodeInput {
            id: id.to_string(),
            content: "a recorded conversation".to_string(),
            summary: None,
            embedding: vec![0.1, 0.2, 0.3],
            metadata: serde_json::json!({}),
            context: Some("proj-a".to_string()),
        }
    }

    #[tokio::test]
    async fn create_rejects_empty_content() {
        let db = memory_db().await;
        let mut input = sample_input("ep1");
        input.content = "   ".to_string();
        let err = create(&db, input, 3).await.unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn create_rejects_wrong_dimension_embedding() {
        let db = memory_db().await;
        let mut input = sample_input("ep1");
        input.embedding = vec![0.1, 0.2];
        let err = create(&db, input, 3).await.unwrap_err();
        assert!(matches!(err, MemoryError::Embedding(_)));
    }

    #[tokio::test]
    async fn get_delete_round_trip() {
        let db = memory_db().await;
        let created = create(&db, sample_input("ep1"), 3).await.expect("create");
        assert_eq!(created.access_count, 0);

        let fetched = get(&db, "ep1").await.expect("get").expect("present");
        assert_eq!(fetched.content, "a recorded conversation");

        let deleted = delete(&db, "ep1").await.expect("delete");
        assert!(deleted);
        let deleted_again = delete(&db, "ep1").await.expect("delete again");
        assert!(!deleted_again);
        assert!(get(&db, "ep1").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn update_access_increments_count() {
        let db = memory_db().await;
        create(&db, sample_input("ep1"), 3).await.expect("create");
        update_access(&db, "ep1").await.expect("update access");
        let fetched = get(&db, "ep1").await.expect("get").expect("present");
        assert_eq!(fetched.access_count, 1);
    }

    #[tokio::test]
    async fn search_finds_by_text_and_respects_context() {
        let db = memory_db().await;
        create(&db, sample_input("ep1"), 3).await.expect("create proj-a");
        let mut other = sample_input("ep2");
        other.context = Some("proj-b".to_string());
        create(&db, other, 3).await.expect("create proj-b");

        let found = search(&db, "conversation", None, None, Some("proj-a"), 10)
            .await
            .expect("search");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "ep1");
    }
}
