//! Tool Adapter: the boundary every agent-protocol request
//! crosses. Each function here validates input, resolves context,
//! normalizes ids, calls the Service/Retrieval layers, fires best-effort
//! access-update side effects, and never raises — callers collapse the
//! [`error::ToolResult`] with [`error::finish`].

pub mod entities;
pub mod episodes;
pub mod error;
pub mod graph;
pub mod ids;
pub mod maintenance;
pub mod procedures;
pub mod system;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

use common::storage::connection::ConnectionManager;
use service::context::ContextConfig;
use service::embedder::Embedder;

/// Shared dependencies every tool function needs: the storage client, the
/// embedder, and the context-resolution chain's static configuration
///.
pub struct ToolDeps<'a> {
    pub db: &'a ConnectionManager,
    pub embedder: &'a dyn Embedder,
    pub context_config: &'a ContextConfig,
}

impl<'a> ToolDeps<'a> {
    #[must_use]
    pub fn resolve_context(&self, explicit: Option<&str>) -> Option<String> {
        service::context::resolve_context(explicit, self.context_config)
    }
}
