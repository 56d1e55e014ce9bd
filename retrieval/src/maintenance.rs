//! Maintenance Engine: a thin pass-through over
//! `common`'s maintenance queries. The heavy lifting (the decay
//! projection, the HNSW similar-pairs probe, the importance formula) is
//! already at the Query Layer; this module is just the Retrieval
//! Engine's entry point into it.

use common::error::MemoryError;
use common::storage::connection::ConnectionManager;
use common::storage::query::maintenance;
use common::storage::types::entity::Entity;

pub use common::storage::query::maintenance::SimilarPair;

/// `ApplyDecay(days, context, global, dry_run)`.
pub async fn apply_decay(
    db: &ConnectionManager,
    days: i64,
    context: Option<&str>,
    global: bool,
    dry_run: bool,
) -> Result<Vec<Entity>, MemoryError> {
    maintenance::apply_decay(db, days, context, global, dry_run).await
}

/// `FindSimilarPairs(threshold, limit, context, global)`.
pub async fn find_similar_pairs(
    db: &ConnectionManager,
    threshold: f32,
    limit: u32,
    context: Option<&str>,
    global: bool,
) -> Result<Vec<SimilarPair>, MemoryError> {
    maintenance::find_similar_pairs(db, threshold, limit, context, global).await
}

/// `RecomputeImportance`, triggered by `reflect(recalculate_importance=true)`
///.
pub async fn recompute_importance(
    db: &ConnectionManager,
    context: Option<&str>,
) -> Result<Vec<Entity>, MemoryError> {
    maintenance::recompute_importance(db, context).await
}
