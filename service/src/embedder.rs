//! The embedder seam: stateless from the caller's perspective, and
//! concurrent `embed` calls are allowed. A trait object rather than a
//! bare async-openai call so the Service Layer can be tested against a
//! deterministic fake without an OpenAI account.

use async_openai::config::OpenAIConfig;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_trait::async_trait;
use common::error::MemoryError;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;

    /// The vector length this embedder always produces; must match the
    /// HNSW index dimension the schema was installed with.
    fn dimension(&self) -> u32;
}

pub struct OpenAiEmbedder {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
    dimension: u32,
}

impl OpenAiEmbedder {
    pub fn new(client: async_openai::Client<OpenAIConfig>, model: String, dimension: u32) -> Self {
        Self {
            client,
            model,
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .dimensions(self.dimension)
            .input([text])
            .build()
            .map_err(|e| MemoryError::Embedding(format!("failed to build embedding request: {e}")))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| MemoryError::Embedding(format!("embedding provider request failed: {e}")))?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Embedding("no embedding data received from provider".into()))?
            .embedding;

        if embedding.len() != self.dimension as usize {
            return Err(MemoryError::Embedding(format!(
                "embedding provider returned {} dimensions, expected {}",
                embedding.len(),
                self.dimension
            )));
        }

        Ok(embedding)
    }

    fn dimension(&self) -> u32 {
        self.dimension
    }
}
