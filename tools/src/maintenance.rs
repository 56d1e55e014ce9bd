//! `reflect`, `check_contradictions`.
//!
//! `reflect` dispatches on `action ∈ {decay, similar}`, plus an
//! independent optional `recalculate_importance` flag layered on top:
//! any `reflect` call may also request an importance recompute,
//! regardless of which `action` ran (see the project's design notes).
//!
//! `check_contradictions` is `FindSimilarPairs` run at a caller-tunable
//! high similarity threshold, surfacing near-duplicate entities as
//! candidate contradictions for the agent to adjudicate.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use retrieval::maintenance as maintenance_query;

use crate::error::{ToolError, ToolResult};
use crate::ids::qualify;
use crate::validate::{range_u32, similarity};
use crate::ToolDeps;

fn default_decay_days() -> i64 {
    30
}

fn default_similarity_threshold() -> f32 {
    0.85
}

fn default_reflect_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReflectArgs {
    pub action: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub global: bool,
    #[serde(default = "default_decay_days")]
    pub decay_days: i64,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_reflect_limit")]
    pub limit: u32,
    #[serde(default)]
    pub recalculate_importance: bool,
}

fn similar_pair_json(pair: &maintenance_query::SimilarPair) -> serde_json::Value {
    json!({
        "a": qualify("entity", &pair.a),
        "b": qualify("entity", &pair.b),
        "similarity": pair.similarity,
    })
}

/// `reflect(action, dry_run?, context?, global?, decay_days?,
/// similarity_threshold?, limit?) → {action, decay?, similar?, importance?}`.
pub async fn reflect(deps: &ToolDeps<'_>, args: ReflectArgs) -> ToolResult {
    let context = deps.resolve_context(args.context.as_deref());
    let limit = range_u32("limit", args.limit, 1, 1000)?;

    let mut response = json!({ "action": args.action });

    match args.action.as_str() {
        "decay" => {
            let entities = maintenance_query::apply_decay(
                deps.db,
                args.decay_days,
                context.as_deref(),
                args.global,
                args.dry_run,
            )
            .await?;
            let payload: Vec<_> = entities
                .iter()
                .map(|entity| json!({ "id": qualify("entity", &entity.id), "decay_weight": entity.decay_weight }))
                .collect();
            response["decay"] = json!({ "affected": payload, "count": payload.len(), "dry_run": args.dry_run });
        }
        "similar" => {
            let threshold = similarity("similarity_threshold", args.similarity_threshold)?;
            let pairs = maintenance_query::find_similar_pairs(
                deps.db,
                threshold,
                limit,
                context.as_deref(),
                args.global,
            )
            .await?;
            let payload: Vec<_> = pairs.iter().map(similar_pair_json).collect();
            response["similar"] = json!({ "pairs": payload, "count": payload.len() });
        }
        other => {
            return Err(ToolError::invalid_input(format!(
                "unknown reflect action '{other}', expected 'decay' or 'similar'"
            )));
        }
    }

    if args.recalculate_importance {
        let entities = maintenance_query::recompute_importance(deps.db, context.as_deref()).await?;
        let payload: Vec<_> = entities
            .iter()
            .map(|entity| json!({ "id": qualify("entity", &entity.id), "importance": entity.importance }))
            .collect();
        response["importance"] = json!({ "affected": payload, "count": payload.len() });
    }

    Ok(response)
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CheckContradictionsArgs {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub global: bool,
    #[serde(default = "default_contradiction_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_reflect_limit")]
    pub limit: u32,
}

fn default_contradiction_threshold() -> f32 {
    0.95
}

/// `check_contradictions(context?, global?, similarity_threshold?, limit?)
/// → {contradictions:[{a,b,similarity}], count}`.
pub async fn check_contradictions(deps: &ToolDeps<'_>, args: CheckContradictionsArgs) -> ToolResult {
    let threshold = similarity("similarity_threshold", args.similarity_threshold)?;
    let limit = range_u32("limit", args.limit, 1, 1000)?;
    let context = deps.resolve_context(args.context.as_deref());

    let pairs =
        maintenance_query::find_similar_pairs(deps.db, threshold, limit, context.as_deref(), args.global).await?;
    let payload: Vec<_> = pairs.iter().map(similar_pair_json).collect();

    Ok(json!({ "contradictions": payload, "count": payload.len() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use common::storage::query::entity as entity_query;
    use common::storage::types::entity::{EntitySource, DECAY_FLOOR};

    use crate::test_support::{memory_db, permissive_context, FakeEmbedder, TEST_DIM};

    #[tokio::test]
    async fn decay_reduces_weight_of_stale_entities_but_never_below_floor() {
        let db = memory_db().await;
        let embedder = FakeEmbedder { dimension: TEST_DIM };
        let ctx = permissive_context();
        let deps = ToolDeps {
            db: &db,
            embedder: &embedder,
            context_config: &ctx,
        };

        entity_query::upsert(
            &db,
            entity_query::UpsertEntityInput {
                id: "stale".to_string(),
                entity_type: "node".to_string(),
                name: "stale".to_string(),
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
            TEST_DIM,
        )
        .await
        .expect("seed entity");

        let stale_accessed = Utc::now() - Duration::days(60);
        db.client()
            .await
            .query("UPDATE entity:stale SET accessed = $accessed, decay_weight = 1.0;")
            .bind(("accessed", stale_accessed))
            .await
            .expect("backdate accessed");

        let result = reflect(
            &deps,
            ReflectArgs {
                action: "decay".to_string(),
                dry_run: false,
                context: None,
                global: true,
                decay_days: 30,
                similarity_threshold: 0.85,
                limit: 10,
                recalculate_importance: false,
            },
        )
        .await
        .expect("reflect decay");

        let affected = result["decay"]["affected"].as_array().expect("affected array");
        assert_eq!(affected.len(), 1);
        let weight = affected[0]["decay_weight"].as_f64().expect("decay_weight");
        assert!(weight < 1.0);
        assert!(weight as f32 >= DECAY_FLOOR);
    }

    #[tokio::test]
    async fn reflect_rejects_unknown_action() {
        let db = memory_db().await;
        let embedder = FakeEmbedder { dimension: TEST_DIM };
        let ctx = permissive_context();
        let deps = ToolDeps {
            db: &db,
            embedder: &embedder,
            context_config: &ctx,
        };

        let err = reflect(
            &deps,
            ReflectArgs {
                action: "bogus".to_string(),
                dry_run: false,
                context: None,
                global: true,
                decay_days: 30,
                similarity_threshold: 0.85,
                limit: 10,
                recalculate_importance: false,
            },
        )
        .await
        .expect_err("unknown action should be rejected");
        assert_eq!(err.kind, "invalid_input");
    }
}
