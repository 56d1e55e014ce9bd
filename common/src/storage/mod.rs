//! Storage layer: Connection Manager, Schema Installer, and
//! Query Layer, in that dependency order.

pub mod connection;
pub mod query;
pub mod schema;
pub mod types;

pub use connection::{ConnectionManager, ConnectionSettings};
pub use schema::Schema;
