//! The MCP stdio front door: reads JSON-RPC on stdin, writes responses on
//! stdout. Tracing goes to stderr since stdout is reserved for the protocol.

use rmcp::transport::io::stdio;
use rmcp::ServiceExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use server::mcp::MemoryMcpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let state = server::bootstrap().await?;
    let mcp_server = MemoryMcpServer::new(state);

    let service = mcp_server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
