//! `search`, `get_entity`, `list_labels`, `list_types`, `remember`,
//! `forget`.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use common::storage::query::{aggregates, entity as entity_query};
use common::storage::types::entity::EntitySource;
use retrieval::hybrid;
use service::memory::{self, RememberEntityInput};

use crate::error::{ToolError, ToolResult};
use crate::ids::{qualify, record_json, strip_prefix};
use crate::validate::{non_empty, non_empty_list, range_u32};
use crate::ToolDeps;

fn default_search_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    #[serde(default)]
    pub context: Option<String>,
}

/// `search(query, labels?, limit, context?) → {entities, count}`.
pub async fn search(deps: &ToolDeps<'_>, args: SearchArgs) -> ToolResult {
    let query = non_empty("query", &args.query)?.to_string();
    let limit = range_u32("limit", args.limit, 1, 100)?;
    let context = deps.resolve_context(args.context.as_deref());

    let embedding = deps.embedder.embed(&query).await?;
    let entities = hybrid::search_entities(
        deps.db,
        &query,
        &embedding,
        args.labels.as_deref(),
        limit,
        context.as_deref(),
    )
    .await?;

    let mut payload = Vec::with_capacity(entities.len());
    for entity in &entities {
        fire_access_update(deps, &entity.id).await;
        payload.push(record_json("entity", &entity.id, entity)?);
    }

    Ok(json!({ "entities": payload, "count": payload.len() }))
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetEntityArgs {
    pub id: String,
}

/// `get_entity(id) → entity row`.
pub async fn get_entity(deps: &ToolDeps<'_>, args: GetEntityArgs) -> ToolResult {
    let raw_id = strip_prefix("entity", non_empty("id", &args.id)?);
    let entity = entity_query::get(deps.db, &raw_id)
        .await?
        .ok_or_else(|| ToolError::not_found(format!("entity {} not found", qualify("entity", &raw_id))))?;

    fire_access_update(deps, &raw_id).await;
    record_json("entity", &raw_id, &entity)
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListLabelsArgs {
    #[serde(default)]
    pub context: Option<String>,
}

/// `list_labels(context?) → {labels:[{label,count}…], count}`.
pub async fn list_labels(deps: &ToolDeps<'_>, args: ListLabelsArgs) -> ToolResult {
    let context = deps.resolve_context(args.context.as_deref());
    let labels = aggregates::list_labels(deps.db, context.as_deref()).await?;
    let payload: Vec<_> = labels
        .iter()
        .map(|row| json!({ "label": row.label, "count": row.count }))
        .collect();
    Ok(json!({ "labels": payload, "count": payload.len() }))
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTypesArgs {
    #[serde(default)]
    pub context: Option<String>,
}

/// `list_types(context?) → {types:[{type,count}…], count}`.
pub async fn list_types(deps: &ToolDeps<'_>, args: ListTypesArgs) -> ToolResult {
    let context = deps.resolve_context(args.context.as_deref());
    let types = aggregates::list_types(deps.db, context.as_deref()).await?;
    let payload: Vec<_> = types
        .iter()
        .map(|row| json!({ "type": row.entity_type, "count": row.count }))
        .collect();
    Ok(json!({ "types": payload, "count": payload.len() }))
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RememberEntityItem {
    pub id: Option<String>,
    #[serde(rename = "type", default = "default_entity_type")]
    pub entity_type: String,
    pub name: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub source: Option<String>,
    pub source_path: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_entity_type() -> String {
    "entity".to_string()
}

fn default_confidence() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RememberRelationItem {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RememberArgs {
    pub entities: Vec<RememberEntityItem>,
    #[serde(default)]
    pub relations: Vec<RememberRelationItem>,
    #[serde(default)]
    pub context: Option<String>,
}

fn parse_source(source: Option<&str>) -> Result<EntitySource, ToolError> {
    match source.map(str::to_lowercase).as_deref() {
        None | Some("manual") => Ok(EntitySource::Manual),
        Some("ingest") => Ok(EntitySource::Ingest),
        Some("extracted") => Ok(EntitySource::Extracted),
        Some("ai") => Ok(EntitySource::Ai),
        Some(other) => Err(ToolError::invalid_input(format!(
            "unknown source '{other}', expected manual, ingest, extracted or ai"
        ))),
    }
}

/// `remember(entities[], relations?, context?) →
/// {entities:[{id,name,type,labels,content,action}], created, updated}`.
pub async fn remember(deps: &ToolDeps<'_>, args: RememberArgs) -> ToolResult {
    non_empty_list("entities", &args.entities)?;
    let context = deps.resolve_context(args.context.as_deref());

    let mut rows = Vec::with_capacity(args.entities.len());
    let mut created = 0u64;
    let mut updated = 0u64;

    for item in args.entities {
        non_empty("entities[].name", &item.name)?;
        let source = parse_source(item.source.as_deref())?;

        let (entity, was_created) = memory::remember_entity(
            deps.db,
            deps.embedder,
            RememberEntityInput {
                id: item.id.map(|id| strip_prefix("entity", &id)),
                entity_type: item.entity_type,
                name: item.name,
                content: item.content,
                summary: item.summary,
                labels: item.labels,
                confidence: item.confidence,
                source,
                source_path: item.source_path,
                metadata: item.metadata,
                context: context.clone(),
            },
        )
        .await?;

        if was_created {
            created += 1;
        } else {
            updated += 1;
        }

        rows.push(json!({
            "id": qualify("entity", &entity.id),
            "name": entity.name,
            "type": entity.entity_type,
            "labels": entity.labels,
            "content": entity.content,
            "action": if was_created { "created" } else { "updated" },
        }));
    }

    for relation in args.relations {
        let from = strip_prefix("entity", &relation.from);
        let to = strip_prefix("entity", &relation.to);
        common::storage::query::relation::create(deps.db, &from, &relation.rel_type, &to, relation.weight)
            .await?;
    }

    Ok(json!({ "entities": rows, "created": created, "updated": updated }))
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ForgetArgs {
    pub ids: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// `forget(ids[], context?) → {deleted, message}`.
pub async fn forget(deps: &ToolDeps<'_>, args: ForgetArgs) -> ToolResult {
    non_empty_list("ids", &args.ids)?;
    let raw_ids: Vec<String> = args
        .ids
        .iter()
        .map(|id| strip_prefix("entity", id))
        .collect();

    let deleted = entity_query::delete(deps.db, &raw_ids).await?;
    Ok(json!({
        "deleted": deleted,
        "message": format!("{deleted} of {} entities deleted", raw_ids.len()),
    }))
}

/// Best-effort access-update fired on every retrieved item.
/// Failures are logged at WARN and discarded, never propagated.
pub(crate) async fn fire_access_update(deps: &ToolDeps<'_>, entity_id: &str) {
    if let Err(err) = entity_query::update_access(deps.db, entity_id).await {
        tracing::warn!(entity_id, error = %err, "entity access update failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, permissive_context, FakeEmbedder, TEST_DIM};

    fn deps<'a>(db: &'a common::storage::connection::ConnectionManager, embedder: &'a FakeEmbedder, ctx: &'a service::context::ContextConfig) -> ToolDeps<'a> {
        ToolDeps {
            db,
            embedder,
            context_config: ctx,
        }
    }

    fn alpha_args() -> RememberArgs {
        RememberArgs {
            entities: vec![RememberEntityItem {
                id: None,
                entity_type: "language".to_string(),
                name: "Alpha".to_string(),
                content: Some("a programming language".to_string()),
                summary: None,
                labels: vec!["programming".to_string()],
                confidence: 1.0,
                source: None,
                source_path: None,
                metadata: serde_json::json!({}),
            }],
            relations: vec![],
            context: Some("proj-a".to_string()),
        }
    }

    #[tokio::test]
    async fn round_trip_upsert_then_update() {
        let db = memory_db().await;
        let embedder = FakeEmbedder { dimension: TEST_DIM };
        let ctx = permissive_context();
        let d = deps(&db, &embedder, &ctx);

        let first = remember(&d, alpha_args()).await.expect("first remember");
        assert_eq!(first["entities"][0]["action"], "created");
        assert_eq!(first["entities"][0]["id"], "entity:proj-a:alpha");

        let second = remember(&d, alpha_args()).await.expect("second remember");
        assert_eq!(second["entities"][0]["action"], "updated");

        let fetched = get_entity(
            &d,
            GetEntityArgs {
                id: "entity:proj-a:alpha".to_string(),
            },
        )
        .await
        .expect("get_entity");
        let labels: Vec<String> = serde_json::from_value(fetched["labels"].clone()).expect("labels");
        assert_eq!(labels, vec!["programming".to_string()]);
    }

    #[tokio::test]
    async fn additive_labels_merge_across_upserts() {
        let db = memory_db().await;
        let embedder = FakeEmbedder { dimension: TEST_DIM };
        let ctx = permissive_context();
        let d = deps(&db, &embedder, &ctx);

        let mut args = alpha_args();
        args.entities[0].labels = vec!["a".to_string()];
        remember(&d, args).await.expect("first remember");

        let mut args2 = alpha_args();
        args2.entities[0].labels = vec!["b".to_string()];
        remember(&d, args2).await.expect("second remember");

        let fetched = get_entity(
            &d,
            GetEntityArgs {
                id: "proj-a:alpha".to_string(),
            },
        )
        .await
        .expect("get_entity");
        let mut labels: Vec<String> = serde_json::from_value(fetched["labels"].clone()).expect("labels");
        labels.sort();
        assert_eq!(labels, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn search_recall_filters_by_label() {
        let db = memory_db().await;
        let embedder = FakeEmbedder { dimension: TEST_DIM };
        let ctx = permissive_context();
        let d = deps(&db, &embedder, &ctx);

        for (name, label) in [("Go language", "programming"), ("Python language", "web")] {
            let item = RememberEntityItem {
                id: None,
                entity_type: "language".to_string(),
                name: name.to_string(),
                content: Some("a programming language".to_string()),
                summary: None,
                labels: vec![label.to_string()],
                confidence: 1.0,
                source: None,
                source_path: None,
                metadata: serde_json::json!({}),
            };
            remember(
                &d,
                RememberArgs {
                    entities: vec![item],
                    relations: vec![],
                    context: None,
                },
            )
            .await
            .expect("remember");
        }

        let all = search(
            &d,
            SearchArgs {
                query: "programming".to_string(),
                labels: None,
                limit: 10,
                context: None,
            },
        )
        .await
        .expect("search");
        assert_eq!(all["count"], 2);

        let web_only = search(
            &d,
            SearchArgs {
                query: "programming".to_string(),
                labels: Some(vec!["web".to_string()]),
                limit: 10,
                context: None,
            },
        )
        .await
        .expect("search");
        assert_eq!(web_only["count"], 1);
        assert_eq!(web_only["entities"][0]["name"], "Python language");
    }

    #[tokio::test]
    async fn forget_is_idempotent_on_missing_ids() {
        let db = memory_db().await;
        let embedder = FakeEmbedder { dimension: TEST_DIM };
        let ctx = permissive_context();
        let d = deps(&db, &embedder, &ctx);

        let result = forget(
            &d,
            ForgetArgs {
                ids: vec!["entity:does-not-exist".to_string()],
                context: None,
            },
        )
        .await
        .expect("forget");
        assert_eq!(result["deleted"], 0);
    }

    #[tokio::test]
    async fn search_rejects_out_of_range_limit() {
        let db = memory_db().await;
        let embedder = FakeEmbedder { dimension: TEST_DIM };
        let ctx = permissive_context();
        let d = deps(&db, &embedder, &ctx);

        let err = search(
            &d,
            SearchArgs {
                query: "anything".to_string(),
                labels: None,
                limit: 0,
                context: None,
            },
        )
        .await
        .expect_err("limit 0 should be rejected");
        assert_eq!(err.kind, "invalid_input");
    }
}
