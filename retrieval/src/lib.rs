//! Retrieval Engine and Maintenance Engine: hybrid
//! BM25+vector search over entities and episodes, and the decay/dedup/
//! importance sweep that keeps the graph from growing stale.

pub mod hybrid;
pub mod maintenance;

pub use hybrid::{rrf_fuse, search_entities, search_episodes, RRF_K};
