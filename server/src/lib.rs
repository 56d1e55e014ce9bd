//! Agent-Protocol Server: wires the Tool Adapter up to two
//! front ends sharing one bootstrap sequence — `mcp` (stdio, for agent
//! runtimes that speak the Model Context Protocol) and `http` (a plain
//! JSON surface for everything else), both passing through the same
//! [`dispatch::dispatch_logged`] middleware.

pub mod dispatch;
pub mod http;
pub mod mcp;
pub mod state;

pub use state::{bootstrap, AppState};
