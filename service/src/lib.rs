//! Service Layer: orchestrates the Query Layer with two cross-cutting
//! behaviors the Query Layer deliberately stays ignorant of — embedding
//! generation/chunking and context/id resolution. A direct async API
//! called synchronously by `tools`, per call, rather than via a
//! background worker.

pub mod chunking;
pub mod context;
pub mod embedder;
pub mod ids;
pub mod memory;

pub use embedder::Embedder;
