//! Shared test fixtures for this crate's `#[cfg(test)]` modules: an
//! in-memory database and a deterministic fake embedder, mirroring the
//! fixtures `common` and `service` each keep privately for their own
//! tests (duplicated here since `#[cfg(test)]` items aren't visible
//! cross-crate).

use std::sync::Arc;

use uuid::Uuid;

use common::config::AuthScope;
use common::error::MemoryError;
use common::storage::connection::{ConnectionManager, ConnectionSettings};
use common::storage::schema::Schema;
use service::context::ContextConfig;
use service::embedder::Embedder;

pub const TEST_DIM: u32 = 8;

pub struct FakeEmbedder {
    pub dimension: u32,
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

pub async fn memory_db() -> Arc<ConnectionManager> {
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
    Schema::install(&db, TEST_DIM).await.expect("schema install");
    db
}

pub fn permissive_context() -> ContextConfig {
    ContextConfig {
        default_context: None,
        auto_detect: false,
    }
}
