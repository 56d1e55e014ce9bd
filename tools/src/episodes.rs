//! `add_episode`, `search_episodes`, `get_episode`, `delete_episode`
//!.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use common::storage::query::{episode as episode_query, relation};
use retrieval::hybrid;
use service::memory::{self, AddEpisodeInput};

use crate::error::{ToolError, ToolResult};
use crate::ids::{qualify, record_json, strip_prefix};
use crate::validate::{non_empty, range_u32};
use crate::ToolDeps;

const PREVIEW_CHARS: usize = 120;

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{truncated}…")
    }
}

fn generate_episode_id(context: Option<&str>) -> String {
    let uuid = Uuid::new_v4();
    match context {
        Some(ctx) => format!("{ctx}:{uuid}"),
        None => uuid.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddEpisodeArgs {
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub entity_ids: Vec<String>,
}

/// `add_episode(content, summary?, metadata?, context?, entity_ids?) →
/// {id, content_preview, timestamp, linked_entities, context?}`.
pub async fn add_episode(deps: &ToolDeps<'_>, args: AddEpisodeArgs) -> ToolResult {
    let content = non_empty("content", &args.content)?.to_string();
    let context = deps.resolve_context(args.context.as_deref());
    let id = generate_episode_id(context.as_deref());
    let entity_ids: Vec<String> = args
        .entity_ids
        .iter()
        .map(|id| strip_prefix("entity", id))
        .collect();

    let (episode, linked) = memory::add_episode(
        deps.db,
        deps.embedder,
        AddEpisodeInput {
            id,
            content,
            summary: args.summary,
            metadata: args.metadata,
            context: context.clone(),
            entity_ids,
        },
    )
    .await?;

    Ok(json!({
        "id": qualify("episode", &episode.id),
        "content_preview": preview(&episode.content),
        "timestamp": episode.timestamp,
        "linked_entities": linked,
        "context": episode.context,
    }))
}

fn default_episode_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchEpisodesArgs {
    pub query: String,
    #[serde(default)]
    pub time_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default = "default_episode_limit")]
    pub limit: u32,
}

/// `search_episodes(query, time_start?, time_end?, context?, limit) →
/// {episodes, count}`.
pub async fn search_episodes(deps: &ToolDeps<'_>, args: SearchEpisodesArgs) -> ToolResult {
    let query = non_empty("query", &args.query)?.to_string();
    let limit = range_u32("limit", args.limit, 1, 50)?;
    let context = deps.resolve_context(args.context.as_deref());

    let embedding = deps.embedder.embed(&query).await?;
    let episodes = hybrid::search_episodes(
        deps.db,
        &query,
        &embedding,
        args.time_start,
        args.time_end,
        context.as_deref(),
        limit,
    )
    .await?;

    let mut payload = Vec::with_capacity(episodes.len());
    for episode in &episodes {
        fire_access_update(deps, &episode.id).await;
        payload.push(record_json("episode", &episode.id, episode)?);
    }

    Ok(json!({ "episodes": payload, "count": payload.len() }))
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetEpisodeArgs {
    pub id: String,
    #[serde(default)]
    pub include_entities: bool,
}

/// `get_episode(id, include_entities?) → {episode, entities?}`.
pub async fn get_episode(deps: &ToolDeps<'_>, args: GetEpisodeArgs) -> ToolResult {
    let raw_id = strip_prefix("episode", non_empty("id", &args.id)?);
    let episode = episode_query::get(deps.db, &raw_id)
        .await?
        .ok_or_else(|| ToolError::not_found(format!("episode {} not found", qualify("episode", &raw_id))))?;

    fire_access_update(deps, &raw_id).await;
    let episode_json = record_json("episode", &raw_id, &episode)?;

    if args.include_entities {
        let entities = relation::entities_for_episode(deps.db, &raw_id).await?;
        let mut payload = Vec::with_capacity(entities.len());
        for entity in &entities {
            payload.push(record_json("entity", &entity.id, entity)?);
        }
        Ok(json!({ "episode": episode_json, "entities": payload }))
    } else {
        Ok(json!({ "episode": episode_json }))
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteEpisodeArgs {
    pub id: String,
}

/// `delete_episode(id) → {deleted, message}`.
pub async fn delete_episode(deps: &ToolDeps<'_>, args: DeleteEpisodeArgs) -> ToolResult {
    let raw_id = strip_prefix("episode", non_empty("id", &args.id)?);
    let deleted = episode_query::delete(deps.db, &raw_id).await?;
    Ok(json!({
        "deleted": deleted,
        "message": if deleted {
            format!("episode {} deleted", qualify("episode", &raw_id))
        } else {
            format!("episode {} not found", qualify("episode", &raw_id))
        },
    }))
}

/// Best-effort access-update for episodes. Mirrors
/// [`crate::entities::fire_access_update`]; kept separate since episodes
/// have their own `UpdateEpisodeAccess` query.
async fn fire_access_update(deps: &ToolDeps<'_>, episode_id: &str) {
    if let Err(err) = episode_query::update_access(deps.db, episode_id).await {
        tracing::warn!(episode_id, error = %err, "episode access update failed");
    }
}
