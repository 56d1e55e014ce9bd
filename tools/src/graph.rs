//! `traverse`, `find_path`.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use common::storage::query::graph;

use crate::entities::fire_access_update;
use crate::error::{ToolError, ToolResult};
use crate::ids::{record_json, strip_prefix};
use crate::validate::{non_empty, range_u32};
use crate::ToolDeps;

fn default_depth() -> u32 {
    2
}

fn default_max_depth() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TraverseArgs {
    pub start: String,
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default)]
    pub relation_types: Option<Vec<String>>,
}

/// `traverse(start, depth, relation_types?) → start entity + connected[]`.
pub async fn traverse(deps: &ToolDeps<'_>, args: TraverseArgs) -> ToolResult {
    let start = strip_prefix("entity", non_empty("start", &args.start)?);
    let depth = range_u32("depth", args.depth, 1, 10)?;

    let result = graph::traverse(deps.db, &start, depth, args.relation_types.as_deref())
        .await?
        .ok_or_else(|| ToolError::not_found(format!("entity entity:{start} not found")))?;

    fire_access_update(deps, &result.start.id).await;
    for entity in &result.connected {
        fire_access_update(deps, &entity.id).await;
    }

    let start_json = record_json("entity", &result.start.id, &result.start)?;
    let mut connected = Vec::with_capacity(result.connected.len());
    for entity in &result.connected {
        connected.push(record_json("entity", &entity.id, entity)?);
    }

    Ok(json!({ "start": start_json, "connected": connected }))
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindPathArgs {
    pub from: String,
    pub to: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

/// `find_path(from, to, max_depth) → {path_found, path[]?, length?, message?}`.
pub async fn find_path(deps: &ToolDeps<'_>, args: FindPathArgs) -> ToolResult {
    let from = strip_prefix("entity", non_empty("from", &args.from)?);
    let to = strip_prefix("entity", non_empty("to", &args.to)?);
    let max_depth = range_u32("max_depth", args.max_depth, 1, 20)?;

    match graph::find_path(deps.db, &from, &to, max_depth).await? {
        Some(entities) => {
            for entity in &entities {
                fire_access_update(deps, &entity.id).await;
            }
            let mut path = Vec::with_capacity(entities.len());
            for entity in &entities {
                path.push(record_json("entity", &entity.id, entity)?);
            }
            Ok(json!({
                "path_found": true,
                "path": path,
                "length": entities.len(),
            }))
        }
        None => Ok(json!({
            "path_found": false,
            "message": format!("no path found between entity:{from} and entity:{to} within {max_depth} hops"),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::query::entity as entity_query;
    use common::storage::query::relation;
    use common::storage::types::entity::EntitySource;
    use service::context::ContextConfig;

    use crate::test_support::{memory_db, FakeEmbedder, TEST_DIM};

    async fn seed_entity(db: &common::storage::connection::ConnectionManager, id: &str) {
        entity_query::upsert(
            db,
            entity_query::UpsertEntityInput {
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
            TEST_DIM,
        )
        .await
        .expect("seed entity");
    }

    fn deps<'a>(db: &'a common::storage::connection::ConnectionManager, embedder: &'a FakeEmbedder, ctx: &'a ContextConfig) -> ToolDeps<'a> {
        ToolDeps {
            db,
            embedder,
            context_config: ctx,
        }
    }

    #[tokio::test]
    async fn relation_cascade_removes_edges_on_entity_delete() {
        let db = memory_db().await;
        seed_entity(&db, "a").await;
        seed_entity(&db, "b").await;
        relation::create(&db, "a", "uses", "b", 1.0).await.expect("create relation");

        entity_query::delete(&db, &["a".to_string()]).await.expect("delete a");

        let result = graph::traverse(&db, "b", 2, None).await.expect("traverse");
        let connected_empty = result.map_or(true, |r| r.connected.is_empty());
        assert!(connected_empty);
    }

    #[tokio::test]
    async fn find_path_respects_max_depth() {
        let db = memory_db().await;
        let embedder = FakeEmbedder { dimension: TEST_DIM };
        let ctx = ContextConfig {
            default_context: None,
            auto_detect: false,
        };
        let d = deps(&db, &embedder, &ctx);

        seed_entity(&db, "x").await;
        seed_entity(&db, "y").await;
        seed_entity(&db, "z").await;
        relation::create(&db, "x", "links", "y", 1.0).await.expect("x-y");
        relation::create(&db, "y", "links", "z", 1.0).await.expect("y-z");

        let too_short = find_path(
            &d,
            FindPathArgs {
                from: "x".to_string(),
                to: "z".to_string(),
                max_depth: 1,
            },
        )
        .await
        .expect("find_path depth 1");
        assert_eq!(too_short["path_found"], false);

        let long_enough = find_path(
            &d,
            FindPathArgs {
                from: "x".to_string(),
                to: "z".to_string(),
                max_depth: 2,
            },
        )
        .await
        .expect("find_path depth 2");
        assert_eq!(long_enough["path_found"], true);
        assert_eq!(long_enough["length"], 3);
    }
}
