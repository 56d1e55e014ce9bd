//! Retrieval Engine: hybrid search fusing a BM25 branch and an ANN
//! vector branch via literal Reciprocal Rank Fusion (`k=60`) over two
//! rank-ordered branches. The BM25 branch uses SurrealDB's `@0@` /
//! `search::score` idiom; the vector branch uses the `<|k,ef|>` KNN
//! operator idiom.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use common::error::MemoryError;
use common::storage::connection::ConnectionManager;
use common::storage::query::entity as entity_query;
use common::storage::query::episode as episode_query;
use common::storage::types::entity::Entity;
use common::storage::types::episode::Episode;

/// The rank-dampening constant in `score = Σ 1/(k + rank)`.
pub const RRF_K: u32 = 60;
const HNSW_EF: u32 = 40;

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

/// Fuses any number of rank-ordered id lists via Reciprocal Rank Fusion.
/// A document appearing in only one branch still contributes that
/// branch's term. Ties are broken by the order each id was first
/// encountered across the branches (a stable proxy for "the engine's own
/// internal ordering", since branch order already reflects each engine's
/// native ranking).
pub fn rrf_fuse(branches: &[Vec<String>], k: u32, limit: usize) -> Vec<String> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for branch in branches {
        for (index, id) in branch.iter().enumerate() {
            let rank = index as f32 + 1.0;
            let score = scores.entry(id.clone()).or_insert_with(|| {
                order.push(id.clone());
                0.0
            });
            *score += 1.0 / (k as f32 + rank);
        }
    }

    order.sort_by(|a, b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(limit);
    order
}

async fn entity_vector_branch(
    db: &ConnectionManager,
    embedding: &[f32],
    labels: Option<&[String]>,
    context: Option<&str>,
    k: u32,
) -> Result<Vec<String>, MemoryError> {
    let statement = format!(
        "SELECT id FROM entity
            WHERE ($labels IS NONE OR labels CONTAINSANY $labels)
            AND ($context IS NONE OR context = $context)
            AND embedding <|{k},{HNSW_EF}|> $emb;"
    );
    let mut response = db
        .client()
        .await
        .query(statement)
        .bind(("emb", embedding.to_vec()))
        .bind(("labels", labels.map(<[String]>::to_vec)))
        .bind(("context", context.map(str::to_string)))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<IdRow> = response.take(0).map_err(MemoryError::from)?;
    Ok(rows.into_iter().map(|row| row.id).collect())
}

async fn entity_bm25_branch(
    db: &ConnectionManager,
    query_text: &str,
    labels: Option<&[String]>,
    context: Option<&str>,
    k: u32,
) -> Result<Vec<String>, MemoryError> {
    let mut response = db
        .client()
        .await
        .query(
            "SELECT id FROM entity
                WHERE content @0@ $query
                AND ($labels IS NONE OR labels CONTAINSANY $labels)
                AND ($context IS NONE OR context = $context)
                ORDER BY search::score(0) DESC
                LIMIT $k;",
        )
        .bind(("query", query_text.to_string()))
        .bind(("labels", labels.map(<[String]>::to_vec)))
        .bind(("context", context.map(str::to_string)))
        .bind(("k", k))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<IdRow> = response.take(0).map_err(MemoryError::from)?;
    Ok(rows.into_iter().map(|row| row.id).collect())
}

/// Hybrid search over entities: fuses a BM25 branch and a vector branch.
/// Both branches fetch `2 × limit` candidates; the fused,
/// RRF-ranked list is truncated to `limit`.
pub async fn search_entities(
    db: &ConnectionManager,
    query_text: &str,
    embedding: &[f32],
    labels: Option<&[String]>,
    limit: u32,
    context: Option<&str>,
) -> Result<Vec<Entity>, MemoryError> {
    if !(1..=100).contains(&limit) {
        return Err(MemoryError::InvalidInput(
            "limit must be between 1 and 100".into(),
        ));
    }

    let branch_k = limit * 2;
    let vector_ids = entity_vector_branch(db, embedding, labels, context, branch_k).await?;
    let bm25_ids = entity_bm25_branch(db, query_text, labels, context, branch_k).await?;
    let fused = rrf_fuse(&[vector_ids, bm25_ids], RRF_K, limit as usize);

    let mut entities = Vec::with_capacity(fused.len());
    for id in fused {
        if let Some(entity) = entity_query::get(db, &id).await? {
            entities.push(entity);
        }
    }
    Ok(entities)
}

async fn episode_vector_branch(
    db: &ConnectionManager,
    embedding: &[f32],
    time_start: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
    context: Option<&str>,
    k: u32,
) -> Result<Vec<String>, MemoryError> {
    let statement = format!(
        "SELECT id FROM episode
            WHERE ($time_start IS NONE OR timestamp >= $time_start)
            AND ($time_end IS NONE OR timestamp <= $time_end)
            AND ($context IS NONE OR context = $context)
            AND embedding <|{k},{HNSW_EF}|> $emb;"
    );
    let mut response = db
        .client()
        .await
        .query(statement)
        .bind(("emb", embedding.to_vec()))
        .bind(("time_start", time_start))
        .bind(("time_end", time_end))
        .bind(("context", context.map(str::to_string)))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<IdRow> = response.take(0).map_err(MemoryError::from)?;
    Ok(rows.into_iter().map(|row| row.id).collect())
}

async fn episode_bm25_branch(
    db: &ConnectionManager,
    query_text: &str,
    time_start: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
    context: Option<&str>,
    k: u32,
) -> Result<Vec<String>, MemoryError> {
    let mut response = db
        .client()
        .await
        .query(
            "SELECT id FROM episode
                WHERE content @0@ $query
                AND ($time_start IS NONE OR timestamp >= $time_start)
                AND ($time_end IS NONE OR timestamp <= $time_end)
                AND ($context IS NONE OR context = $context)
                ORDER BY search::score(0) DESC
                LIMIT $k;",
        )
        .bind(("query", query_text.to_string()))
        .bind(("time_start", time_start))
        .bind(("time_end", time_end))
        .bind(("context", context.map(str::to_string)))
        .bind(("k", k))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<IdRow> = response.take(0).map_err(MemoryError::from)?;
    Ok(rows.into_iter().map(|row| row.id).collect())
}

/// `SearchEpisodes(query, embedding, time_start?, time_end?, context?,
/// limit)`, fused the same way as [`search_entities`].
#[allow(clippy::too_many_arguments)]
pub async fn search_episodes(
    db: &ConnectionManager,
    query_text: &str,
    embedding: &[f32],
    time_start: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
    context: Option<&str>,
    limit: u32,
) -> Result<Vec<Episode>, MemoryError> {
    if !(1..=50).contains(&limit) {
        return Err(MemoryError::InvalidInput(
            "limit must be between 1 and 50".into(),
        ));
    }

    let branch_k = limit * 2;
    let vector_ids =
        episode_vector_branch(db, embedding, time_start, time_end, context, branch_k).await?;
    let bm25_ids =
        episode_bm25_branch(db, query_text, time_start, time_end, context, branch_k).await?;
    let fused = rrf_fuse(&[vector_ids, bm25_ids], RRF_K, limit as usize);

    let mut episodes = Vec::with_capacity(fused.len());
    for id in fused {
        if let Some(episode) = episode_query::get(db, &id).await? {
            episodes.push(episode);
        }
    }
    Ok(episodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rrf_favors_documents_ranked_well_in_both_branches() {
        let vector = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let bm25 = vec!["b".to_string(), "a".to_string(), "d".to_string()];
        let fused = rrf_fuse(&[vector, bm25], RRF_K, 10);
        assert_eq!(fused[0], "a");
        assert_eq!(fused[1], "b");
    }

    #[test]
    fn rrf_keeps_single_branch_documents() {
        let vector = vec!["only-vector".to_string()];
        let bm25 = vec!["only-bm25".to_string()];
        let fused = rrf_fuse(&[vector, bm25], RRF_K, 10);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn rrf_monotonicity_dominant_document_never_ranks_lower() {
        let vector = vec!["dominant".to_string(), "x".to_string(), "y".to_string()];
        let bm25 = vec!["dominant".to_string(), "z".to_string(), "w".to_string()];
        let fused = rrf_fuse(&[vector, bm25], RRF_K, 10);
        assert_eq!(fused[0], "dominant");
    }

    #[test]
    fn rejects_limit_out_of_range() {
        // search_entities validates before issuing any query; exercised
        // indirectly via the limit bound check used there.
        assert!(!(1..=100).contains(&0u32));
        assert!(!(1..=100).contains(&101u32));
    }
}
