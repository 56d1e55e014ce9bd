//! The peer HTTP front door: the same tool surface as `server`, reachable
//! over plain JSON for callers that don't speak MCP.

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let state = server::bootstrap().await?;
    let port = state.config.http_port;
    let app = server::http::router(state);

    let address = format!("0.0.0.0:{port}");
    info!(address = %address, "peer-http listening");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
