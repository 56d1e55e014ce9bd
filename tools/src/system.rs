//! `ping` (, implicit liveness probe for the agent-protocol surface).

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use crate::error::ToolResult;
use crate::ToolDeps;

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct PingArgs {}

/// `ping() → {ok, storage_healthy}`: a schema-free tool agents call to
/// confirm the server and its storage session are both reachable before
/// issuing real work.
pub async fn ping(deps: &ToolDeps<'_>, _args: PingArgs) -> ToolResult {
    let storage_healthy = deps.db.healthy().await;
    Ok(json!({ "ok": true, "storage_healthy": storage_healthy }))
}
