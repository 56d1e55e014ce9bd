//! Data model, storage client, schema installer and query layer for the
//! agent memory core. This crate owns every SurrealQL statement in the
//! system; higher layers (`service`, `retrieval`, `tools`) never talk to
//! `surrealdb` directly.

pub mod config;
pub mod error;
pub mod storage;

pub use error::MemoryError;
