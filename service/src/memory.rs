//! Embedding orchestration: the only place in the
//! system that calls the [`Embedder`] and decides whether an entity needs
//! re-chunking. Skips re-embedding unchanged content and rebuilds chunks
//! only when content actually changes.

use sha2::{Digest, Sha256};

use common::error::MemoryError;
use common::storage::connection::ConnectionManager;
use common::storage::query::chunk::{self as chunk_query, NewChunk};
use common::storage::query::entity::{self as entity_query, UpsertEntityInput};
use common::storage::query::episode::{self as episode_query, CreateEpisodeInput};
use common::storage::query::procedure::{self as procedure_query, CreateProcedureInput};
use common::storage::query::relation;
use common::storage::types::entity::{Entity, EntitySource};
use common::storage::types::episode::Episode;
use common::storage::types::procedure::{Procedure, Step};

use crate::chunking::{self, CHUNK_THRESHOLD};
use crate::embedder::Embedder;
use crate::ids::composite_id;

/// Input to [`remember_entity`]. When `id` is `None` the composite id
/// is derived from `name` and `context`.
#[derive(Debug, Clone)]
pub struct RememberEntityInput {
    pub id: Option<String>,
    pub entity_type: String,
    pub name: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub labels: Vec<String>,
    pub confidence: f32,
    pub source: EntitySource,
    pub source_path: Option<String>,
    pub metadata: serde_json::Value,
    pub context: Option<String>,
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `name + " " + summary + " " + content`, falling back through whichever
/// fields are actually present.
fn embeddable_text(name: &str, summary: Option<&str>, content: Option<&str>) -> String {
    let mut parts = vec![name.to_string()];
    for part in [summary, content] {
        if let Some(text) = part {
            if !text.trim().is_empty() {
                parts.push(text.to_string());
            }
        }
    }
    parts.join(" ")
}

/// `remember()`: embeds on create/update, skipping
/// re-embedding when `content_hash` is unchanged from the stored row, and
/// rebuilds chunks whenever the content actually changed.
pub async fn remember_entity(
    db: &ConnectionManager,
    embedder: &dyn Embedder,
    input: RememberEntityInput,
) -> Result<(Entity, bool), MemoryError> {
    if input.name.trim().is_empty() {
        return Err(MemoryError::InvalidInput(
            "entity name must not be empty".into(),
        ));
    }

    let id = input
        .id
        .clone()
        .unwrap_or_else(|| composite_id(&input.name, input.context.as_deref()));
    let content_hash = input.content.as_deref().map(hash_content);

    let existing = entity_query::get(db, &id).await?;
    let content_unchanged = existing
        .as_ref()
        .is_some_and(|entity| content_hash.is_some() && entity.content_hash == content_hash);

    let embedding = if content_unchanged {
        existing.as_ref().and_then(|entity| entity.embedding.clone())
    } else {
        let text = embeddable_text(
            &input.name,
            input.summary.as_deref(),
            input.content.as_deref(),
        );
        Some(embedder.embed(&text).await?)
    };

    let (entity, was_created) = entity_query::upsert(
        db,
        UpsertEntityInput {
            id: id.clone(),
            entity_type: input.entity_type,
            name: input.name,
            content: input.content.clone(),
            summary: input.summary,
            labels: input.labels,
            confidence: input.confidence,
            source: input.source,
            source_path: input.source_path,
            content_hash,
            metadata: input.metadata,
            embedding,
            context: input.context.clone(),
        },
        embedder.dimension(),
    )
    .await?;

    if !content_unchanged {
        rebuild_chunks(
            db,
            embedder,
            &id,
            input.context.as_deref(),
            input.content.as_deref(),
            &entity.labels,
        )
        .await?;
    }

    Ok((entity, was_created))
}

/// Replaces `id`'s chunks wholesale: deletes them if content is now short
/// enough (or absent) to live inline, otherwise re-chunks and re-embeds
/// every fragment.
async fn rebuild_chunks(
    db: &ConnectionManager,
    embedder: &dyn Embedder,
    entity_id: &str,
    context: Option<&str>,
    content: Option<&str>,
    labels: &[String],
) -> Result<(), MemoryError> {
    let Some(content) = content else {
        return chunk_query::delete_for_entity(db, entity_id).await;
    };

    if content.chars().count() <= CHUNK_THRESHOLD {
        return chunk_query::delete_for_entity(db, entity_id).await;
    }

    let mut new_chunks = Vec::new();
    for candidate in chunking::chunk_content(content) {
        let embedding = embedder.embed(&candidate.content).await?;
        new_chunks.push(NewChunk {
            id: format!("{entity_id}-{}", candidate.position),
            content: candidate.content,
            position: candidate.position,
            heading_path: candidate.heading_path,
            labels: labels.to_vec(),
            embedding,
        });
    }

    chunk_query::replace_for_entity(db, entity_id, context, new_chunks, embedder.dimension())
        .await?;
    Ok(())
}

/// Input to [`add_episode`].
#[derive(Debug, Clone)]
pub struct AddEpisodeInput {
    pub id: String,
    pub content: String,
    pub summary: Option<String>,
    pub metadata: serde_json::Value,
    pub context: Option<String>,
    pub entity_ids: Vec<String>,
}

/// `add_episode`: embeds the full transcript once and links it
/// to every supplied entity id via `LinkEntityToEpisode`, in appearance
/// order.
pub async fn add_episode(
    db: &ConnectionManager,
    embedder: &dyn Embedder,
    input: AddEpisodeInput,
) -> Result<(Episode, usize), MemoryError> {
    let embedding = embedder.embed(&input.content).await?;

    let episode = episode_query::create(
        db,
        CreateEpisodeInput {
            id: input.id,
            content: input.content,
            summary: input.summary,
            embedding,
            metadata: input.metadata,
            context: input.context,
        },
        embedder.dimension(),
    )
    .await?;

    let mut linked = 0usize;
    for (position, entity_id) in input.entity_ids.iter().enumerate() {
        relation::link_entity_to_episode(db, entity_id, &episode.id, position as i64, 1.0).await?;
        linked += 1;
    }

    Ok((episode, linked))
}

/// Input to [`add_procedure`].
#[derive(Debug, Clone)]
pub struct AddProcedureInput {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
    pub labels: Vec<String>,
    pub context: Option<String>,
}

/// `add_procedure`: embeds `name + description` so procedures
/// can be found by the same hybrid search machinery as entities, then
/// stores the ordered steps verbatim.
pub async fn add_procedure(
    db: &ConnectionManager,
    embedder: &dyn Embedder,
    input: AddProcedureInput,
) -> Result<Procedure, MemoryError> {
    let id = input
        .id
        .unwrap_or_else(|| composite_id(&input.name, input.context.as_deref()));
    let embedding = embedder
        .embed(&format!("{} {}", input.name, input.description))
        .await?;

    procedure_query::create(
        db,
        CreateProcedureInput {
            id,
            name: input.name,
            description: input.description,
            steps: input.steps,
            embedding: Some(embedding),
            labels: input.labels,
            context: input.context,
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::AuthScope;
    use common::storage::connection::ConnectionSettings;
    use common::storage::schema::Schema;
    use std::sync::Arc;
    use uuid::Uuid;

    struct FakeEmbedder {
        dimension: u32,
    }

    #[async_trait::async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
            let mut seed: u32 = 2_166_136_261;
            for byte in text.bytes() {
                seed ^= u32::from(byte);
                seed = seed.wrapping_mul(16_777_619);
            }
            Ok((0..self.dimension)
                .map(|i| {
                    let mixed = seed.wrapping_add(i.wrapping_mul(2_654_435_761));
                    (f64::from(mixed % 1000) / 1000.0) as f32
                })
                .collect())
        }

        fn dimension(&self) -> u32 {
            self.dimension
        }
    }

    async fn memory_db() -> Arc<ConnectionManager> {
        let settings = ConnectionSettings {
            address: "mem://".to_string(),
            namespace: "test_ns".to_string(),
            database: Uuid::new_v4().to_string(),
            username: String::new(),
            password: String::new(),
            auth_scope: AuthScope::Root,
        };
        let db = ConnectionManager::connect(settings)
            .await
            .expect("in-memory connection");
        Schema::install(&db, 8).await.expect("schema install");
        db
    }

    fn sample_input(content: Option<&str>) -> RememberEntityInput {
        RememberEntityInput {
            id: None,
            entity_type: "document".to_string(),
            name: "Alpha".to_string(),
            content: content.map(str::to_string),
            summary: None,
            labels: vec!["lang".to_string()],
            confidence: 0.9,
            source: EntitySource::Manual,
            source_path: None,
            metadata: serde_json::json!({}),
            context: Some("proj-a".to_string()),
        }
    }

    #[tokio::test]
    async fn remember_entity_derives_composite_id_and_embeds() {
        let db = memory_db().await;
        let embedder = FakeEmbedder { dimension: 8 };

        let (entity, created) = remember_entity(&db, &embedder, sample_input(Some("a language")))
            .await
            .expect("remember");
        assert!(created);
        assert_eq!(entity.id, "proj-a:alpha");
        assert_eq!(entity.embedding.as_ref().map(Vec::len), Some(8));
    }

    #[tokio::test]
    async fn remember_entity_skips_reembedding_when_content_unchanged() {
        let db = memory_db().await;
        let embedder = FakeEmbedder { dimension: 8 };

        let (first, _) = remember_entity(&db, &embedder, sample_input(Some("stable content")))
            .await
            .expect("first remember");

        let mut second_input = sample_input(Some("stable content"));
        second_input.labels = vec!["web".to_string()];
        let (second, created) = remember_entity(&db, &embedder, second_input)
            .await
            .expect("second remember");

        assert!(!created);
        assert_eq!(first.embedding, second.embedding);
        let mut labels = second.labels.clone();
        labels.sort();
        assert_eq!(labels, vec!["lang".to_string(), "web".to_string()]);
    }

    #[tokio::test]
    async fn remember_entity_chunks_long_content() {
        let db = memory_db().await;
        let embedder = FakeEmbedder { dimension: 8 };

        let mut long_content = String::from("# Intro\n");
        long_content.push_str(&"word ".repeat(400));
        long_content.push_str("\n## Details\n");
        long_content.push_str(&"word ".repeat(400));

        let mut input = sample_input(Some(&long_content));
        input.id = Some("long-doc".to_string());
        let (entity, _) = remember_entity(&db, &embedder, input)
            .await
            .expect("remember long content");

        let chunks = chunk_query::list_for_entity(&db, &entity.id)
            .await
            .expect("list chunks");
        assert!(!chunks.is_empty());
    }
}
