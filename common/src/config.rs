use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Authentication scope used when signing in to the storage engine.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthScope {
    Root,
    Database,
}

impl Default for AuthScope {
    fn default() -> Self {
        AuthScope::Root
    }
}

/// Process-wide configuration: an optional `config.toml` layered under
/// environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    // storage
    pub storage_address: String,
    pub storage_namespace: String,
    pub storage_database: String,
    pub storage_username: String,
    pub storage_password: String,
    #[serde(default)]
    pub storage_auth_scope: AuthScope,

    // memory
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    #[serde(default)]
    pub default_context: Option<String>,
    #[serde(default = "default_true")]
    pub context_from_cwd: bool,
    #[serde(default)]
    pub custom_types_allowed: bool,

    // embedding
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: u32,

    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

const fn default_query_timeout_secs() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_embedding_dimension() -> u32 {
    1536
}

const fn default_http_port() -> u16 {
    8787
}

/// Loads configuration from an optional `config.toml` in the working
/// directory, overridden by environment variables.
pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
