//! Relation operations: `CreateRelation` and the
//! `LinkEntityToEpisode` provenance edge. Both sit atop a RELATE-then-
//! patch-on-conflict pattern, since a bare `RELATE` errors on the unique
//! index's `AlreadyExists` rather than updating in place.

use serde::Deserialize;

use crate::error::MemoryError;
use crate::storage::connection::ConnectionManager;
use crate::storage::types::entity::Entity;
use crate::storage::types::extracted_from::ExtractedFrom;
use crate::storage::types::relation::Relation;

/// `CreateRelation(from, rel_type, to, weight) → ()`. Verifies
/// both endpoints exist, then RELATEs them; re-issuing the same
/// `(from, rel_type, to)` updates `weight` instead of erroring, matching
/// the unique index's "one edge per unordered pair per rel_type" contract.
pub async fn create(
    db: &ConnectionManager,
    from: &str,
    rel_type: &str,
    to: &str,
    weight: f32,
) -> Result<Relation, MemoryError> {
    if rel_type.trim().is_empty() {
        return Err(MemoryError::InvalidInput("rel_type must not be empty".into()));
    }

    let client = db.client().await;

    let from_exists: Option<serde_json::Value> = client
        .select(("entity", from))
        .await
        .map_err(MemoryError::from)?;
    if from_exists.is_none() {
        return Err(MemoryError::NotFound(format!("entity {from} not found")));
    }
    let to_exists: Option<serde_json::Value> = client
        .select(("entity", to))
        .await
        .map_err(MemoryError::from)?;
    if to_exists.is_none() {
        return Err(MemoryError::NotFound(format!("entity {to} not found")));
    }

    let relate = client
        .query(
            "RELATE (type::thing('entity', $from))->relates->(type::thing('entity', $to))
                SET rel_type = $rel_type, weight = $weight
                RETURN AFTER;",
        )
        .bind(("from", from.to_string()))
        .bind(("to", to.to_string()))
        .bind(("rel_type", rel_type.to_string()))
        .bind(("weight", weight))
        .await
        .map_err(MemoryError::from)
        .and_then(|response| response.check().map_err(MemoryError::from));

    match relate {
        Ok(mut response) => {
            let rows: Vec<Relation> = response.take(0).map_err(MemoryError::from)?;
            rows.into_iter()
                .next()
                .ok_or_else(|| MemoryError::Internal("RELATE returned no row".into()))
        }
        Err(MemoryError::AlreadyExists(_)) => update_existing_weight(&client, from, to, rel_type, weight).await,
        Err(other) => Err(other),
    }
}

async fn update_existing_weight(
    client: &surrealdb::Surreal<surrealdb::engine::any::Any>,
    from: &str,
    to: &str,
    rel_type: &str,
    weight: f32,
) -> Result<Relation, MemoryError> {
    let mut response = client
        .query(
            "UPDATE relates SET weight = $weight
                WHERE unique_key = string::join(\"|\", array::sort([<string> $from, <string> $to]), $rel_type)
                RETURN AFTER;",
        )
        .bind(("from", format!("entity:{from}")))
        .bind(("to", format!("entity:{to}")))
        .bind(("rel_type", rel_type.to_string()))
        .bind(("weight", weight))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<Relation> = response.take(0).map_err(MemoryError::from)?;
    rows.into_iter()
        .next()
        .ok_or_else(|| MemoryError::Internal("duplicate relation update returned no row".into()))
}

#[derive(Debug, Deserialize)]
struct ExistsRow {
    count: i64,
}

/// `LinkEntityToEpisode(entity_id, episode_id, position, confidence)`
///: idempotent upsert on the `extracted_from` edge.
pub async fn link_entity_to_episode(
    db: &ConnectionManager,
    entity_id: &str,
    episode_id: &str,
    position: i64,
    confidence: f32,
) -> Result<ExtractedFrom, MemoryError> {
    let client = db.client().await;

    let existing = client
        .query(
            "SELECT count() FROM ONLY extracted_from
                WHERE in = type::thing('entity', $entity_id) AND out = type::thing('episode', $episode_id)
                GROUP ALL;",
        )
        .bind(("entity_id", entity_id.to_string()))
        .bind(("episode_id", episode_id.to_string()))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?
        .take::<Vec<ExistsRow>>(0)
        .map_err(MemoryError::from)?;

    if existing.first().map(|row| row.count).unwrap_or(0) > 0 {
        let mut response = client
            .query(
                "UPDATE extracted_from SET position = $position, confidence = $confidence
                    WHERE in = type::thing('entity', $entity_id) AND out = type::thing('episode', $episode_id)
                    RETURN AFTER;",
            )
            .bind(("entity_id", entity_id.to_string()))
            .bind(("episode_id", episode_id.to_string()))
            .bind(("position", position))
            .bind(("confidence", confidence))
            .await
            .map_err(MemoryError::from)?
            .check()
            .map_err(MemoryError::from)?;
        let rows: Vec<ExtractedFrom> = response.take(0).map_err(MemoryError::from)?;
        return rows
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Internal("extracted_from update returned no row".into()));
    }

    let mut response = client
        .query(
            "RELATE (type::thing('entity', $entity_id))->extracted_from->(type::thing('episode', $episode_id))
                SET position = $position, confidence = $confidence
                RETURN AFTER;",
        )
        .bind(("entity_id", entity_id.to_string()))
        .bind(("episode_id", episode_id.to_string()))
        .bind(("position", position))
        .bind(("confidence", confidence))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<ExtractedFrom> = response.take(0).map_err(MemoryError::from)?;
    rows.into_iter()
        .next()
        .ok_or_else(|| MemoryError::Internal("RELATE extracted_from returned no row".into()))
}

/// Entities extracted from `episode_id`, ordered by the `position` they
/// appeared in ('s `get_episode(include_entities=true)`).
pub async fn entities_for_episode(
    db: &ConnectionManager,
    episode_id: &str,
) -> Result<Vec<Entity>, MemoryError> {
    let mut response = db
        .client()
        .await
        .query(
            "SELECT in.* FROM extracted_from
                WHERE out = type::thing('episode', $episode_id)
                ORDER BY position ASC;",
        )
        .bind(("episode_id", episode_id.to_string()))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<serde_json::Value> = response.take(0).map_err(MemoryError::from)?;
    rows.into_iter()
        .map(|value| {
            let entity_value = value.get("in").cloned().unwrap_or(value);
            serde_json::from_value(entity_value)
        })
        .collect::<Result<Vec<Entity>, _>>()
        .map_err(|err| MemoryError::Internal(format!("decoding extracted_from entities: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthScope;
    use crate::storage::connection::ConnectionSettings;
    use crate::storage::query::entity::{self as entity_query, UpsertEntityInput};
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

    async fn seed_entity(db: &ConnectionManager, id: &str) {
        entity_query::upsert(
            db,
            UpsertEntityInput {
                id: id.to_string(),
                entity_type: "node".to_string(),
                name: id.to_string(),
                content: None,
                summary: None,
                labels: vec![],
                confidence: 1.0,
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
        .expect("seed entity");
    }

    #[tokio::test]
    async fn create_fails_when_an_endpoint_is_missing() {
        let db = memory_db().await;
        seed_entity(&db, "a").await;

        let err = create(&db, "a", "uses", "missing", 1.0).await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn reissuing_the_same_relate_updates_weight_not_errors() {
        let db = memory_db().await;
        seed_entity(&db, "a").await;
        seed_entity(&db, "b").await;

        let first = create(&db, "a", "uses", "b", 1.0).await.expect("first relate");
        assert!((first.weight - 1.0).abs() < f32::EPSILON);

        let second = create(&db, "a", "uses", "b", 2.5).await.expect("second relate updates weight");
        assert!((second.weight - 2.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn relate_is_undirected_for_uniqueness_regardless_of_order() {
        let db = memory_db().await;
        seed_entity(&db, "a").await;
        seed_entity(&db, "b").await;

        create(&db, "a", "uses", "b", 1.0).await.expect("a -> b");
        // Reversing the endpoints for the same rel_type must not create a
        // second edge: the unique key is computed over the sorted pair.
        let reversed = create(&db, "b", "uses", "a", 9.0).await.expect("b -> a updates the same edge");
        assert!((reversed.weight - 9.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn link_entity_to_episode_is_idempotent() {
        let db = memory_db().await;
        seed_entity(&db, "alpha").await;

        let episode = crate::storage::query::episode::create(
            &db,
            crate::storage::query::episode::CreateEpisodeInput {
                id: "ep1".to_string(),
                content: "a conversation".to_string(),
                summary: None,
                embedding: vec![0.1, 0.2, 0.3],
                metadata: serde_json::json!({}),
                context: None,
            },
            3,
        )
        .await
        .expect("create episode");

        link_entity_to_episode(&db, "alpha", &episode.id, 0, 0.9)
            .await
            .expect("first link");
        let second = link_entity_to_episode(&db, "alpha", &episode.id, 1, 0.5)
            .await
            .expect("second link updates in place");
        assert_eq!(second.position, 1);

        let entities = entities_for_episode(&db, &episode.id).await.expect("entities_for_episode");
        assert_eq!(entities.len(), 1);
    }
}
