//! The MCP front door: registers the full Tool Adapter surface
//! as MCP tools over stdio, using the `#[tool_router]` / `#[tool]` /
//! `#[tool_handler]` macro trio to derive the router and dispatch table
//! from plain async methods.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};

use tools::error::ToolResult;
use tools::{entities, episodes, graph, maintenance, procedures, system};

use crate::dispatch::dispatch_logged;
use crate::state::AppState;

/// Renders a finished [`ToolResult`] as the `CallToolResult` the MCP
/// protocol expects: a single JSON text block, `is_error` set on failure.
fn to_call_result(result: ToolResult) -> Result<CallToolResult, McpError> {
    let is_error = result.is_err();
    let value = match result {
        Ok(value) => value,
        Err(err) => err.to_json(),
    };
    let text = serde_json::to_string(&value)
        .map_err(|e| McpError::internal_error(format!("failed to serialize tool result: {e}"), None))?;
    Ok(if is_error {
        CallToolResult::error(vec![Content::text(text)])
    } else {
        CallToolResult::success(vec![Content::text(text)])
    })
}

#[derive(Clone)]
pub struct MemoryMcpServer {
    state: Arc<AppState>,
    tool_router: ToolRouter<Self>,
}

impl MemoryMcpServer {
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl MemoryMcpServer {
    #[tool(name = "search", description = "Hybrid BM25 + vector search over entities, optionally filtered by labels and context.")]
    async fn search(&self, Parameters(args): Parameters<entities::SearchArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("search", args, |args| entities::search(&deps, args)).await)
    }

    #[tool(name = "get_entity", description = "Fetch a single entity by id.")]
    async fn get_entity(&self, Parameters(args): Parameters<entities::GetEntityArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("get_entity", args, |args| entities::get_entity(&deps, args)).await)
    }

    #[tool(name = "list_labels", description = "List distinct entity labels in use, with counts.")]
    async fn list_labels(&self, Parameters(args): Parameters<entities::ListLabelsArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("list_labels", args, |args| entities::list_labels(&deps, args)).await)
    }

    #[tool(name = "list_types", description = "List distinct entity types in use, with counts.")]
    async fn list_types(&self, Parameters(args): Parameters<entities::ListTypesArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("list_types", args, |args| entities::list_types(&deps, args)).await)
    }

    #[tool(name = "remember", description = "Create or update one or more entities, and optionally relate them to each other.")]
    async fn remember(&self, Parameters(args): Parameters<entities::RememberArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("remember", args, |args| entities::remember(&deps, args)).await)
    }

    #[tool(name = "forget", description = "Delete one or more entities and their relations/chunks by id.")]
    async fn forget(&self, Parameters(args): Parameters<entities::ForgetArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("forget", args, |args| entities::forget(&deps, args)).await)
    }

    #[tool(name = "traverse", description = "Walk the relation graph outward from a starting entity up to a given depth.")]
    async fn traverse(&self, Parameters(args): Parameters<graph::TraverseArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("traverse", args, |args| graph::traverse(&deps, args)).await)
    }

    #[tool(name = "find_path", description = "Find the shortest relation path between two entities, if one exists within max_depth hops.")]
    async fn find_path(&self, Parameters(args): Parameters<graph::FindPathArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("find_path", args, |args| graph::find_path(&deps, args)).await)
    }

    #[tool(name = "add_episode", description = "Record a conversational or observational episode, optionally linked to existing entities.")]
    async fn add_episode(&self, Parameters(args): Parameters<episodes::AddEpisodeArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("add_episode", args, |args| episodes::add_episode(&deps, args)).await)
    }

    #[tool(name = "search_episodes", description = "Hybrid search over recorded episodes, optionally bounded by a time range and context.")]
    async fn search_episodes(&self, Parameters(args): Parameters<episodes::SearchEpisodesArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("search_episodes", args, |args| episodes::search_episodes(&deps, args)).await)
    }

    #[tool(name = "get_episode", description = "Fetch a single episode by id, optionally including its linked entities.")]
    async fn get_episode(&self, Parameters(args): Parameters<episodes::GetEpisodeArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("get_episode", args, |args| episodes::get_episode(&deps, args)).await)
    }

    #[tool(name = "delete_episode", description = "Delete an episode by id.")]
    async fn delete_episode(&self, Parameters(args): Parameters<episodes::DeleteEpisodeArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("delete_episode", args, |args| episodes::delete_episode(&deps, args)).await)
    }

    #[tool(name = "add_procedure", description = "Record a named, ordered procedure made up of steps.")]
    async fn add_procedure(&self, Parameters(args): Parameters<procedures::AddProcedureArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("add_procedure", args, |args| procedures::add_procedure(&deps, args)).await)
    }

    #[tool(name = "search_procedures", description = "Hybrid search over recorded procedures.")]
    async fn search_procedures(&self, Parameters(args): Parameters<procedures::SearchProceduresArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("search_procedures", args, |args| procedures::search_procedures(&deps, args)).await)
    }

    #[tool(name = "list_procedures", description = "List recorded procedures, optionally scoped to a context.")]
    async fn list_procedures(&self, Parameters(args): Parameters<procedures::ListProceduresArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("list_procedures", args, |args| procedures::list_procedures(&deps, args)).await)
    }

    #[tool(name = "get_procedure", description = "Fetch a single procedure by id, including its steps.")]
    async fn get_procedure(&self, Parameters(args): Parameters<procedures::GetProcedureArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("get_procedure", args, |args| procedures::get_procedure(&deps, args)).await)
    }

    #[tool(name = "delete_procedure", description = "Delete a procedure by id.")]
    async fn delete_procedure(&self, Parameters(args): Parameters<procedures::DeleteProcedureArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("delete_procedure", args, |args| procedures::delete_procedure(&deps, args)).await)
    }

    #[tool(name = "reflect", description = "Run maintenance over the graph: decay importance over time, or surface near-duplicate entity pairs.")]
    async fn reflect(&self, Parameters(args): Parameters<maintenance::ReflectArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("reflect", args, |args| maintenance::reflect(&deps, args)).await)
    }

    #[tool(name = "check_contradictions", description = "Surface near-duplicate entity pairs above a similarity threshold as candidate contradictions.")]
    async fn check_contradictions(&self, Parameters(args): Parameters<maintenance::CheckContradictionsArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("check_contradictions", args, |args| maintenance::check_contradictions(&deps, args)).await)
    }

    #[tool(name = "ping", description = "Confirm the server and its storage session are reachable.")]
    async fn ping(&self, Parameters(args): Parameters<system::PingArgs>) -> Result<CallToolResult, McpError> {
        let deps = self.state.tool_deps();
        to_call_result(dispatch_logged("ping", args, |args| system::ping(&deps, args)).await)
    }
}

#[tool_handler]
impl ServerHandler for MemoryMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "agent-memory".to_string(),
                title: Some("Agent Memory MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Persistent knowledge-graph memory for agents: remember and search entities, \
                 episodes and procedures, walk relations between them, and run periodic \
                 maintenance with reflect."
                    .to_string(),
            ),
        }
    }
}
