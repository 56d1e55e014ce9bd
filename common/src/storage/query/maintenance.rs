//! Maintenance operations: `ApplyDecay`,
//! `FindSimilarPairs`, `RecomputeImportance`.
//!
//! Each follows the same fetch/compute/single-transaction-write shape:
//! pull the in-scope rows, compute new values in memory, then write them
//! back in one batched statement. The similar-pairs probe instead builds
//! its candidate set by manual HNSW probing per entity.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::MemoryError;
use crate::storage::connection::ConnectionManager;
use crate::storage::types::entity::{Entity, DECAY_FLOOR};

#[derive(Debug, Deserialize)]
struct DecayCandidate {
    #[serde(flatten)]
    entity: Entity,
    new_decay_weight: f32,
}

const DECAY_PROJECTION: &str = "math::max(
    decay_weight * math::pow(0.5, <float> duration::days(time::now() - accessed) / <float> $days),
    0.1
)";

/// `ApplyDecay(days, context, global, dryRun)`: halves
/// `decay_weight` every `days`-sized window an entity has gone
/// unaccessed, floored at [`DECAY_FLOOR`].
pub async fn apply_decay(
    db: &ConnectionManager,
    days: i64,
    context: Option<&str>,
    global: bool,
    dry_run: bool,
) -> Result<Vec<Entity>, MemoryError> {
    if days <= 0 {
        return Err(MemoryError::InvalidInput(
            "decay window must be positive".into(),
        ));
    }
    let cutoff: DateTime<Utc> = Utc::now() - chrono::Duration::days(days);

    if dry_run {
        let statement = format!(
            "SELECT *, {DECAY_PROJECTION} AS new_decay_weight FROM entity
                WHERE accessed < $cutoff AND ($global OR context = $context);"
        );
        let mut response = db
            .client()
            .await
            .query(statement)
            .bind(("cutoff", cutoff))
            .bind(("days", days))
            .bind(("global", global))
            .bind(("context", context.map(str::to_string)))
            .await
            .map_err(MemoryError::from)?
            .check()
            .map_err(MemoryError::from)?;

        let candidates: Vec<DecayCandidate> = response.take(0).map_err(MemoryError::from)?;
        return Ok(candidates
            .into_iter()
            .map(|candidate| Entity {
                decay_weight: candidate.new_decay_weight.max(DECAY_FLOOR),
                ..candidate.entity
            })
            .collect());
    }

    let statement = format!(
        "UPDATE entity SET decay_weight = {DECAY_PROJECTION}
            WHERE accessed < $cutoff AND ($global OR context = $context)
            RETURN AFTER;"
    );
    let mut response = db
        .client()
        .await
        .query(statement)
        .bind(("cutoff", cutoff))
        .bind(("days", days))
        .bind(("global", global))
        .bind(("context", context.map(str::to_string)))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    response.take(0).map_err(MemoryError::from)
}

/// A discovered similar pair. `(a, b)` is canonically ordered
/// so `(A,B)` and `(B,A)` are never both reported.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarPair {
    pub a: String,
    pub b: String,
    pub similarity: f32,
}

#[derive(Debug, Deserialize)]
struct ScopedId {
    id: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    id: String,
    score: f32,
}

/// `FindSimilarPairs(threshold∈(0,1], limit, context, global)`. For each
/// in-scope entity, runs an HNSW probe against its own embedding, keeps
/// candidates at or above `threshold`, and deduplicates unordered pairs.
/// Identification-only: never merges.
pub async fn find_similar_pairs(
    db: &ConnectionManager,
    threshold: f32,
    limit: u32,
    context: Option<&str>,
    global: bool,
) -> Result<Vec<SimilarPair>, MemoryError> {
    if !(0.0..=1.0).contains(&threshold) || threshold <= 0.0 {
        return Err(MemoryError::InvalidInput(
            "similarity threshold must be in (0, 1]".into(),
        ));
    }

    let client = db.client().await;

    let mut scope_response = client
        .query(
            "SELECT id, embedding FROM entity
                WHERE embedding != NONE AND ($global OR context = $context);",
        )
        .bind(("global", global))
        .bind(("context", context.map(str::to_string)))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;
    let scoped: Vec<ScopedId> = scope_response.take(0).map_err(MemoryError::from)?;

    let mut seen_pairs: HashSet<(String, String)> = HashSet::new();
    let mut pairs = Vec::new();

    'outer: for anchor in &scoped {
        let mut probe = client
            .query(
                "SELECT id, vector::similarity::cosine(embedding, $emb) AS score FROM entity
                    WHERE id != type::thing('entity', $self_id)
                    AND ($global OR context = $context)
                    AND embedding <|8,40|> $emb
                    ORDER BY score DESC;",
            )
            .bind(("emb", anchor.embedding.clone()))
            .bind(("self_id", anchor.id.clone()))
            .bind(("global", global))
            .bind(("context", context.map(str::to_string)))
            .await
            .map_err(MemoryError::from)?
            .check()
            .map_err(MemoryError::from)?;
        let candidates: Vec<Candidate> = probe.take(0).map_err(MemoryError::from)?;

        for candidate in candidates {
            if candidate.score < threshold {
                continue;
            }
            let key = if anchor.id < candidate.id {
                (anchor.id.clone(), candidate.id.clone())
            } else {
                (candidate.id.clone(), anchor.id.clone())
            };
            if key.0 == key.1 || !seen_pairs.insert(key.clone()) {
                continue;
            }
            pairs.push(SimilarPair {
                a: key.0,
                b: key.1,
                similarity: candidate.score,
            });
            if pairs.len() as u32 >= limit {
                break 'outer;
            }
        }
    }

    Ok(pairs)
}

/// `RecomputeImportance`, triggered by `reflect
/// (recalculate_importance=true)`:
/// `importance = 0.3·connectivity + 0.3·access + 0.4·user_importance_or_0.5`.
pub async fn recompute_importance(
    db: &ConnectionManager,
    context: Option<&str>,
) -> Result<Vec<Entity>, MemoryError> {
    let statement = "
        UPDATE entity SET importance =
            0.3 * math::min(1, <float> (array::len(->relates) + array::len(<-relates)) / 10)
            + 0.3 * math::min(1, math::log(<float> access_count + 1, 10) / 3)
            + 0.4 * (IF user_importance != NONE THEN user_importance ELSE 0.5 END)
        WHERE $context IS NONE OR context = $context
        RETURN AFTER;
    ";

    let mut response = db
        .client()
        .await
        .query(statement)
        .bind(("context", context.map(str::to_string)))
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
    use crate::storage::query::entity::{self as entity_query, UpsertEntityInput};
    use crate::storage::query::relation;
    use crate::storage::schema::Schema;
    use crate::storage::types::entity::EntitySource;
    use uuid::Uuid;

    #[test]
    fn similar_pair_key_is_canonical() {
        let mut seen = HashSet::new();
        seen.insert(("a".to_string(), "b".to_string()));
        assert!(seen.contains(&("a".to_string(), "b".to_string())));
        assert!(!seen.contains(&("b".to_string(), "a".to_string())));
    }

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
    async fn connectivity_reflects_incident_relations_on_either_side() {
        let db = memory_db().await;
        seed_entity(&db, "a").await;
        seed_entity(&db, "b").await;
        seed_entity(&db, "isolated").await;
        relation::create(&db, "a", "uses", "b", 1.0).await.expect("create relation");

        let updated = recompute_importance(&db, None).await.expect("recompute_importance");
        let connected: Vec<&Entity> = updated
            .iter()
            .filter(|entity| entity.id == "a" || entity.id == "b")
            .collect();
        let isolated = updated
            .iter()
            .find(|entity| entity.id == "isolated")
            .expect("isolated entity present");

        assert_eq!(connected.len(), 2);
        for entity in connected {
            assert!(
                entity.importance > isolated.importance,
                "connected entity should score higher than an isolated one"
            );
        }
    }
}
