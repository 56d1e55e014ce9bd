//! The `Chunk` record: a RAG fragment of a long entity's content.
//!
//! Parent reference, content and embedding, extended with the ordered
//! `position` and `heading_path` breadcrumb the markdown-aware chunker
//! produces.

use crate::stored_object;

stored_object!(Chunk, "chunk", {
    entity: String,
    content: String,
    position: i64,
    heading_path: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    embedding: Vec<f32>,
    context: Option<String>,
});
