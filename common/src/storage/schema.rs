//! Schema Installer: idempotent `DEFINE ... IF NOT EXISTS`
//! statements for every table, field, index, analyzer and cascade event
//! in the data model.

use crate::error::MemoryError;
use crate::storage::connection::ConnectionManager;

pub struct Schema;

impl Schema {
    /// Installs every table, field, index, analyzer and cascade event,
    /// pinning the HNSW vector indices to `dim`. Safe to call on every
    /// startup: every statement is `IF NOT EXISTS` or `OVERWRITE`-free so a
    /// repeat run is a no-op given an unchanged `dim`.
    pub async fn install(db: &ConnectionManager, dim: u32) -> Result<(), MemoryError> {
        db.query(ENTITY_TABLE).await?;
        db.query(CHUNK_TABLE).await?;
        db.query(RELATES_TABLE).await?;
        db.query(EXTRACTED_FROM_TABLE).await?;
        db.query(EPISODE_TABLE).await?;
        db.query(PROCEDURE_TABLE).await?;
        db.query(INGEST_JOB_TABLE).await?;
        db.query(CASCADE_EVENTS).await?;

        let vector_indices = format!(
            "
            DEFINE INDEX IF NOT EXISTS idx_entity_embedding ON TABLE entity
                FIELDS embedding HNSW DIMENSION {dim} DIST COSINE TYPE F32 EFC 150 M 12;
            DEFINE INDEX IF NOT EXISTS idx_chunk_embedding ON TABLE chunk
                FIELDS embedding HNSW DIMENSION {dim} DIST COSINE TYPE F32 EFC 150 M 12;
            DEFINE INDEX IF NOT EXISTS idx_episode_embedding ON TABLE episode
                FIELDS embedding HNSW DIMENSION {dim} DIST COSINE TYPE F32 EFC 150 M 12;
            DEFINE INDEX IF NOT EXISTS idx_procedure_embedding ON TABLE procedure
                FIELDS embedding HNSW DIMENSION {dim} DIST COSINE TYPE F32 EFC 150 M 12;
            "
        );
        db.query(vector_indices).await?;

        Ok(())
    }

    /// Deletes all rows from dependent tables before base tables. Intended
    /// for test fixtures only: it bypasses the cascade events, so rows
    /// deleted this way never trigger them.
    pub async fn wipe(db: &ConnectionManager) -> Result<(), MemoryError> {
        db.query(
            "DELETE chunk; DELETE relates; DELETE extracted_from;
             DELETE entity; DELETE episode; DELETE procedure; DELETE ingest_job;",
        )
        .await?;
        Ok(())
    }
}

const ENTITY_TABLE: &str = r#"
DEFINE TABLE IF NOT EXISTS entity SCHEMALESS;
DEFINE FIELD IF NOT EXISTS type ON entity TYPE string;
DEFINE FIELD IF NOT EXISTS name ON entity TYPE string;
DEFINE FIELD IF NOT EXISTS content ON entity TYPE option<string>;
DEFINE FIELD IF NOT EXISTS summary ON entity TYPE option<string>;
DEFINE FIELD IF NOT EXISTS labels ON entity TYPE array<string> DEFAULT [];
DEFINE FIELD IF NOT EXISTS confidence ON entity TYPE float DEFAULT 1.0;
DEFINE FIELD IF NOT EXISTS source ON entity TYPE string DEFAULT "manual";
DEFINE FIELD IF NOT EXISTS source_path ON entity TYPE option<string>;
DEFINE FIELD IF NOT EXISTS content_hash ON entity TYPE option<string>;
DEFINE FIELD IF NOT EXISTS metadata ON entity TYPE object DEFAULT {};
DEFINE FIELD IF NOT EXISTS embedding ON entity TYPE option<array<float>>;
DEFINE FIELD IF NOT EXISTS context ON entity TYPE option<string>;
DEFINE FIELD IF NOT EXISTS created ON entity TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS updated ON entity TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS accessed ON entity TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS access_count ON entity TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS decay_weight ON entity TYPE float DEFAULT 1.0;
DEFINE FIELD IF NOT EXISTS importance ON entity TYPE float DEFAULT 0.5;
DEFINE FIELD IF NOT EXISTS user_importance ON entity TYPE option<float>;
DEFINE INDEX IF NOT EXISTS idx_entity_context ON TABLE entity FIELDS context;
DEFINE INDEX IF NOT EXISTS idx_entity_content_hash ON TABLE entity FIELDS content_hash;
DEFINE ANALYZER IF NOT EXISTS entity_analyzer TOKENIZERS class FILTERS lowercase,ascii,snowball(english);
DEFINE INDEX IF NOT EXISTS idx_entity_fts ON TABLE entity FIELDS content SEARCH ANALYZER entity_analyzer BM25 HIGHLIGHTS;
"#;

const CHUNK_TABLE: &str = r#"
DEFINE TABLE IF NOT EXISTS chunk SCHEMALESS;
DEFINE FIELD IF NOT EXISTS entity ON chunk TYPE record<entity>;
DEFINE FIELD IF NOT EXISTS content ON chunk TYPE string;
DEFINE FIELD IF NOT EXISTS position ON chunk TYPE int;
DEFINE FIELD IF NOT EXISTS heading_path ON chunk TYPE option<string>;
DEFINE FIELD IF NOT EXISTS labels ON chunk TYPE array<string> DEFAULT [];
DEFINE FIELD IF NOT EXISTS embedding ON chunk TYPE array<float>;
DEFINE FIELD IF NOT EXISTS created ON chunk TYPE datetime DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_chunk_entity ON TABLE chunk FIELDS entity;
DEFINE INDEX IF NOT EXISTS idx_chunk_position ON TABLE chunk FIELDS entity, position UNIQUE;
"#;

const RELATES_TABLE: &str = r#"
DEFINE TABLE IF NOT EXISTS relates TYPE RELATION IN entity OUT entity SCHEMALESS;
DEFINE FIELD IF NOT EXISTS rel_type ON relates TYPE string;
DEFINE FIELD IF NOT EXISTS weight ON relates TYPE float DEFAULT 1.0;
DEFINE FIELD IF NOT EXISTS created ON relates TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS unique_key ON relates VALUE string::join("|", array::sort([<string> in, <string> out]), rel_type) READONLY;
DEFINE INDEX IF NOT EXISTS idx_relates_unique ON TABLE relates FIELDS unique_key UNIQUE;
"#;

const EXTRACTED_FROM_TABLE: &str = r#"
DEFINE TABLE IF NOT EXISTS extracted_from TYPE RELATION IN entity OUT episode SCHEMALESS;
DEFINE FIELD IF NOT EXISTS position ON extracted_from TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS confidence ON extracted_from TYPE float DEFAULT 1.0;
DEFINE FIELD IF NOT EXISTS created ON extracted_from TYPE datetime DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_extracted_from_unique ON TABLE extracted_from FIELDS in, out UNIQUE;
"#;

const EPISODE_TABLE: &str = r#"
DEFINE TABLE IF NOT EXISTS episode SCHEMALESS;
DEFINE FIELD IF NOT EXISTS content ON episode TYPE string;
DEFINE FIELD IF NOT EXISTS summary ON episode TYPE option<string>;
DEFINE FIELD IF NOT EXISTS embedding ON episode TYPE array<float>;
DEFINE FIELD IF NOT EXISTS timestamp ON episode TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS metadata ON episode TYPE object DEFAULT {};
DEFINE FIELD IF NOT EXISTS context ON episode TYPE option<string>;
DEFINE FIELD IF NOT EXISTS created ON episode TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS accessed ON episode TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS access_count ON episode TYPE int DEFAULT 0;
DEFINE INDEX IF NOT EXISTS idx_episode_context ON TABLE episode FIELDS context;
DEFINE ANALYZER IF NOT EXISTS episode_analyzer TOKENIZERS class FILTERS lowercase,ascii,snowball(english);
DEFINE INDEX IF NOT EXISTS idx_episode_fts ON TABLE episode FIELDS content SEARCH ANALYZER episode_analyzer BM25 HIGHLIGHTS;
"#;

const PROCEDURE_TABLE: &str = r#"
DEFINE TABLE IF NOT EXISTS procedure SCHEMALESS;
DEFINE FIELD IF NOT EXISTS name ON procedure TYPE string;
DEFINE FIELD IF NOT EXISTS description ON procedure TYPE string;
DEFINE FIELD IF NOT EXISTS steps ON procedure TYPE array;
DEFINE FIELD IF NOT EXISTS embedding ON procedure TYPE option<array<float>>;
DEFINE FIELD IF NOT EXISTS labels ON procedure TYPE array<string> DEFAULT [];
DEFINE FIELD IF NOT EXISTS context ON procedure TYPE option<string>;
DEFINE FIELD IF NOT EXISTS created ON procedure TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS accessed ON procedure TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS access_count ON procedure TYPE int DEFAULT 0;
DEFINE INDEX IF NOT EXISTS idx_procedure_context ON TABLE procedure FIELDS context;
DEFINE ANALYZER IF NOT EXISTS procedure_analyzer TOKENIZERS class FILTERS lowercase,ascii,snowball(english);
DEFINE INDEX IF NOT EXISTS idx_procedure_fts ON TABLE procedure FIELDS name, description SEARCH ANALYZER procedure_analyzer BM25 HIGHLIGHTS;
"#;

const INGEST_JOB_TABLE: &str = r#"
DEFINE TABLE IF NOT EXISTS ingest_job SCHEMALESS;
DEFINE FIELD IF NOT EXISTS job_type ON ingest_job TYPE string;
DEFINE FIELD IF NOT EXISTS status ON ingest_job TYPE string DEFAULT "pending";
DEFINE FIELD IF NOT EXISTS name ON ingest_job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS labels ON ingest_job TYPE array<string> DEFAULT [];
DEFINE FIELD IF NOT EXISTS dir_path ON ingest_job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS files ON ingest_job TYPE array<string> DEFAULT [];
DEFINE FIELD IF NOT EXISTS options ON ingest_job TYPE object DEFAULT {};
DEFINE FIELD IF NOT EXISTS total ON ingest_job TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS progress ON ingest_job TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS result ON ingest_job TYPE option<object>;
DEFINE FIELD IF NOT EXISTS error ON ingest_job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS started_at ON ingest_job TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS completed_at ON ingest_job TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS created ON ingest_job TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS updated ON ingest_job TYPE datetime DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_ingest_job_name ON TABLE ingest_job FIELDS name UNIQUE;
DEFINE INDEX IF NOT EXISTS idx_ingest_job_status ON TABLE ingest_job FIELDS status;
"#;

const CASCADE_EVENTS: &str = r#"
DEFINE EVENT IF NOT EXISTS entity_cascade_delete ON TABLE entity WHEN $event = "DELETE" THEN {
    DELETE chunk WHERE entity = $before.id;
    DELETE relates WHERE in = $before.id OR out = $before.id;
    DELETE extracted_from WHERE in = $before.id;
};
DEFINE EVENT IF NOT EXISTS episode_cascade_delete ON TABLE episode WHEN $event = "DELETE" THEN {
    DELETE extracted_from WHERE out = $before.id;
};
"#;
