//! Process bootstrap shared by both binaries: load configuration, open the
//! storage session, install the schema, and build the embedder. A single
//! entry point both the MCP front door and the HTTP surface call before
//! serving anything.

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use common::config::{self, AppConfig};
use common::storage::connection::{ConnectionManager, ConnectionSettings};
use common::storage::schema::Schema;
use service::context::ContextConfig;
use service::embedder::{Embedder, OpenAiEmbedder};
use tracing::info;

/// Everything a tool dispatch needs, held for the lifetime of the process.
pub struct AppState {
    pub db: Arc<ConnectionManager>,
    pub embedder: Arc<dyn Embedder>,
    pub context_config: ContextConfig,
    pub config: AppConfig,
}

impl AppState {
    #[must_use]
    pub fn tool_deps(&self) -> tools::ToolDeps<'_> {
        tools::ToolDeps {
            db: &self.db,
            embedder: self.embedder.as_ref(),
            context_config: &self.context_config,
        }
    }
}

/// Loads configuration, connects to storage, installs the schema and wires
/// up the embedding provider. Shared by `server` and `peer-http`: both need
/// an identical session, just different front ends.
///
/// # Errors
///
/// Returns an error if configuration is missing/malformed, the storage
/// session can't be established, or the schema fails to install.
pub async fn bootstrap() -> anyhow::Result<Arc<AppState>> {
    let config = config::get_config()?;

    let db = ConnectionManager::connect(ConnectionSettings {
        address: config.storage_address.clone(),
        namespace: config.storage_namespace.clone(),
        database: config.storage_database.clone(),
        username: config.storage_username.clone(),
        password: config.storage_password.clone(),
        auth_scope: config.storage_auth_scope,
    })
    .await?;

    Schema::install(&db, config.embedding_dimension).await?;
    info!(dimension = config.embedding_dimension, "schema installed");

    let openai_client = async_openai::Client::with_config(OpenAIConfig::new());
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
        openai_client,
        config.embedding_model.clone(),
        config.embedding_dimension,
    ));

    let context_config = ContextConfig {
        default_context: config.default_context.clone(),
        auto_detect: config.context_from_cwd,
    };

    Ok(Arc::new(AppState {
        db,
        embedder,
        context_config,
        config,
    }))
}
