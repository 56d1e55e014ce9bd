//! The peer-facing HTTP surface: the same Tool Adapter
//! operations the MCP front door exposes, reachable as plain JSON POST
//! routes for callers that don't speak MCP, plus `/live` and `/ready`
//! probes for orchestrators that expect them.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use tools::error::ToolResult;
use tools::{entities, episodes, graph, maintenance, procedures, system};

use crate::dispatch::dispatch_logged;
use crate::state::AppState;

fn status_for_kind(kind: &str) -> StatusCode {
    match kind {
        "invalid_input" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "already_exists" | "transaction_conflict" => StatusCode::CONFLICT,
        "transport_error" => StatusCode::SERVICE_UNAVAILABLE,
        "embedding_error" => StatusCode::BAD_GATEWAY,
        "timeout" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn tool_response(result: ToolResult) -> impl IntoResponse {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)),
        Err(err) => {
            let status = status_for_kind(err.kind);
            (status, Json(err.to_json()))
        }
    }
}

async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.db.healthy().await {
        (StatusCode::OK, Json(json!({ "status": "ok", "checks": { "storage": "ok" } })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "checks": { "storage": "fail" } })),
        )
    }
}

macro_rules! tool_route {
    ($fn_name:ident, $tool_name:literal, $module:ident::$call:ident, $args:ty) => {
        async fn $fn_name(State(state): State<Arc<AppState>>, Json(args): Json<$args>) -> impl IntoResponse {
            let deps = state.tool_deps();
            tool_response(dispatch_logged($tool_name, args, |args| $module::$call(&deps, args)).await)
        }
    };
}

tool_route!(route_search, "search", entities::search, entities::SearchArgs);
tool_route!(route_get_entity, "get_entity", entities::get_entity, entities::GetEntityArgs);
tool_route!(route_list_labels, "list_labels", entities::list_labels, entities::ListLabelsArgs);
tool_route!(route_list_types, "list_types", entities::list_types, entities::ListTypesArgs);
tool_route!(route_remember, "remember", entities::remember, entities::RememberArgs);
tool_route!(route_forget, "forget", entities::forget, entities::ForgetArgs);
tool_route!(route_traverse, "traverse", graph::traverse, graph::TraverseArgs);
tool_route!(route_find_path, "find_path", graph::find_path, graph::FindPathArgs);
tool_route!(route_add_episode, "add_episode", episodes::add_episode, episodes::AddEpisodeArgs);
tool_route!(route_search_episodes, "search_episodes", episodes::search_episodes, episodes::SearchEpisodesArgs);
tool_route!(route_get_episode, "get_episode", episodes::get_episode, episodes::GetEpisodeArgs);
tool_route!(route_delete_episode, "delete_episode", episodes::delete_episode, episodes::DeleteEpisodeArgs);
tool_route!(route_add_procedure, "add_procedure", procedures::add_procedure, procedures::AddProcedureArgs);
tool_route!(route_search_procedures, "search_procedures", procedures::search_procedures, procedures::SearchProceduresArgs);
tool_route!(route_list_procedures, "list_procedures", procedures::list_procedures, procedures::ListProceduresArgs);
tool_route!(route_get_procedure, "get_procedure", procedures::get_procedure, procedures::GetProcedureArgs);
tool_route!(route_delete_procedure, "delete_procedure", procedures::delete_procedure, procedures::DeleteProcedureArgs);
tool_route!(route_reflect, "reflect", maintenance::reflect, maintenance::ReflectArgs);
tool_route!(route_check_contradictions, "check_contradictions", maintenance::check_contradictions, maintenance::CheckContradictionsArgs);
tool_route!(route_ping, "ping", system::ping, system::PingArgs);

/// Builds the peer HTTP router: public liveness/readiness probes plus one
/// POST route per memory tool, all sharing the same [`AppState`].
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/live", get(live))
        .route("/ready", get(ready))
        .route("/tools/search", post(route_search))
        .route("/tools/get_entity", post(route_get_entity))
        .route("/tools/list_labels", post(route_list_labels))
        .route("/tools/list_types", post(route_list_types))
        .route("/tools/remember", post(route_remember))
        .route("/tools/forget", post(route_forget))
        .route("/tools/traverse", post(route_traverse))
        .route("/tools/find_path", post(route_find_path))
        .route("/tools/add_episode", post(route_add_episode))
        .route("/tools/search_episodes", post(route_search_episodes))
        .route("/tools/get_episode", post(route_get_episode))
        .route("/tools/delete_episode", post(route_delete_episode))
        .route("/tools/add_procedure", post(route_add_procedure))
        .route("/tools/search_procedures", post(route_search_procedures))
        .route("/tools/list_procedures", post(route_list_procedures))
        .route("/tools/get_procedure", post(route_get_procedure))
        .route("/tools/delete_procedure", post(route_delete_procedure))
        .route("/tools/reflect", post(route_reflect))
        .route("/tools/check_contradictions", post(route_check_contradictions))
        .route("/tools/ping", post(route_ping))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
