//! The `IngestJob` record: a persisted async ingestion job, kept
//! for restart resilience. The status vocabulary is a
//! `pending|running|succeeded|failed` state machine.

use serde::{Deserialize, Serialize};

use crate::stored_object;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestJobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

stored_object!(IngestJob, "ingest_job", {
    job_type: String,
    status: IngestJobStatus,
    name: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    dir_path: Option<String>,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    options: serde_json::Value,
    total: i64,
    progress: i64,
    result: Option<serde_json::Value>,
    error: Option<String>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
});

impl IngestJob {
    /// True once the job has reached a terminal state (`succeeded` or
    /// `failed`); terminal states are immutable per 
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            IngestJobStatus::Succeeded | IngestJobStatus::Failed
        )
    }
}
