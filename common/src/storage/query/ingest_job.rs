//! IngestJob operations: the only nontrivial state machine
//! in the data model. `pending → running → (succeeded | failed)`,
//! terminal states immutable. Dedicated transition functions stamp
//! `started_at`/`completed_at` and populate `result`/`error` alongside
//! the status change.

use crate::error::MemoryError;
use crate::storage::connection::ConnectionManager;
use crate::storage::types::ingest_job::IngestJob;

#[derive(Debug, Clone)]
pub struct CreateIngestJobInput {
    pub id: String,
    pub job_type: String,
    pub name: Option<String>,
    pub labels: Vec<String>,
    pub dir_path: Option<String>,
    pub files: Vec<String>,
    pub options: serde_json::Value,
    pub total: i64,
}

pub async fn create(
    db: &ConnectionManager,
    input: CreateIngestJobInput,
) -> Result<IngestJob, MemoryError> {
    let mut response = db
        .client()
        .await
        .query(
            "CREATE type::thing('ingest_job', $id) CONTENT {
                job_type: $job_type,
                status: 'pending',
                name: $name,
                labels: $labels,
                dir_path: $dir_path,
                files: $files,
                options: $options,
                total: $total,
                progress: 0,
                result: NONE,
                error: NONE,
                started_at: NONE,
                completed_at: NONE,
                created: time::now(),
                updated: time::now()
            } RETURN AFTER;",
        )
        .bind(("id", input.id.clone()))
        .bind(("job_type", input.job_type))
        .bind(("name", input.name))
        .bind(("labels", input.labels))
        .bind(("dir_path", input.dir_path))
        .bind(("files", input.files))
        .bind(("options", input.options))
        .bind(("total", input.total))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<IngestJob> = response.take(0).map_err(MemoryError::from)?;
    rows.into_iter().next().ok_or_else(|| {
        MemoryError::Internal(format!("create of ingest job {} returned no row", input.id))
    })
}

pub async fn get(db: &ConnectionManager, id: &str) -> Result<Option<IngestJob>, MemoryError> {
    db.client()
        .await
        .select(("ingest_job", id))
        .await
        .map_err(MemoryError::from)
}

/// `pending → running`. Stamps `started_at`. Rejected if the job is
/// already terminal.
pub async fn mark_running(db: &ConnectionManager, id: &str) -> Result<IngestJob, MemoryError> {
    transition(db, id, |job| {
        if job.is_terminal() {
            return Err(MemoryError::InvalidInput(format!(
                "ingest job {id} is already in a terminal state"
            )));
        }
        Ok(())
    })
    .await?;

    let mut response = db
        .client()
        .await
        .query(
            "UPDATE type::thing('ingest_job', $id) SET
                status = 'running', started_at = time::now(), updated = time::now()
                RETURN AFTER;",
        )
        .bind(("id", id.to_string()))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<IngestJob> = response.take(0).map_err(MemoryError::from)?;
    rows.into_iter()
        .next()
        .ok_or_else(|| MemoryError::NotFound(format!("ingest job {id} not found")))
}

/// `running → succeeded`, populating `result` and `completed_at`.
pub async fn mark_succeeded(
    db: &ConnectionManager,
    id: &str,
    result: serde_json::Value,
) -> Result<IngestJob, MemoryError> {
    transition(db, id, |job| {
        if job.is_terminal() {
            return Err(MemoryError::InvalidInput(format!(
                "ingest job {id} is already in a terminal state"
            )));
        }
        Ok(())
    })
    .await?;

    let mut response = db
        .client()
        .await
        .query(
            "UPDATE type::thing('ingest_job', $id) SET
                status = 'succeeded', result = $result, completed_at = time::now(), updated = time::now()
                RETURN AFTER;",
        )
        .bind(("id", id.to_string()))
        .bind(("result", result))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<IngestJob> = response.take(0).map_err(MemoryError::from)?;
    rows.into_iter()
        .next()
        .ok_or_else(|| MemoryError::NotFound(format!("ingest job {id} not found")))
}

/// `running → failed`, populating `error` and `completed_at`.
pub async fn mark_failed(
    db: &ConnectionManager,
    id: &str,
    error: &str,
) -> Result<IngestJob, MemoryError> {
    transition(db, id, |job| {
        if job.is_terminal() {
            return Err(MemoryError::InvalidInput(format!(
                "ingest job {id} is already in a terminal state"
            )));
        }
        Ok(())
    })
    .await?;

    let mut response = db
        .client()
        .await
        .query(
            "UPDATE type::thing('ingest_job', $id) SET
                status = 'failed', error = $error, completed_at = time::now(), updated = time::now()
                RETURN AFTER;",
        )
        .bind(("id", id.to_string()))
        .bind(("error", error.to_string()))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<IngestJob> = response.take(0).map_err(MemoryError::from)?;
    rows.into_iter()
        .next()
        .ok_or_else(|| MemoryError::NotFound(format!("ingest job {id} not found")))
}

pub async fn advance_progress(
    db: &ConnectionManager,
    id: &str,
    progress: i64,
) -> Result<(), MemoryError> {
    db.client()
        .await
        .query("UPDATE type::thing('ingest_job', $id) SET progress = $progress, updated = time::now();")
        .bind(("id", id.to_string()))
        .bind(("progress", progress))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;
    Ok(())
}

async fn transition(
    db: &ConnectionManager,
    id: &str,
    guard: impl FnOnce(&IngestJob) -> Result<(), MemoryError>,
) -> Result<(), MemoryError> {
    let job = get(db, id)
        .await?
        .ok_or_else(|| MemoryError::NotFound(format!("ingest job {id} not found")))?;
    guard(&job)
}

/// Jobs left `running` across a restart ('s "Ingest jobs persist
/// for restart resilience"). Callers decide whether to resume or to mark
/// them `failed` with a restart diagnostic.
pub async fn list_running(db: &ConnectionManager) -> Result<Vec<IngestJob>, MemoryError> {
    let mut response = db
        .client()
        .await
        .query("SELECT * FROM ingest_job WHERE status = 'running';")
        .await
        .map_err(MemoryError::from)?;
    response.take(0).map_err(MemoryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthScope;
    use crate::storage::connection::ConnectionSettings;
    use crate::storage::schema::Schema;
    use crate::storage::types::ingest_job::IngestJobStatus;
    use uuid::Uuid;

    async fn memory_db() -> std::sync::Arc<ConnectionManager> {
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
        Schema::install(&db, 3).await.expect("schema install");
        db
    }

    fn sample_input(id: &str) -> CreateIngestJobInput {
        CreateIngestJobInput {
            id: id.to_string(),
            job_type: "directory".to_string(),
            name: Some(format!("job-{id}")),
            labels: vec![],
            dir_path: Some("/tmp/docs".to_string()),
            files: vec!["a.md".to_string()],
            options: serde_json::json!({}),
            total: 1,
        }
    }

    #[tokio::test]
    async fn lifecycle_pending_running_succeeded() {
        let db = memory_db().await;
        let job = create(&db, sample_input("job1")).await.expect("create");
        assert_eq!(job.status, IngestJobStatus::Pending);
        assert!(!job.is_terminal());

        let running = mark_running(&db, "job1").await.expect("mark_running");
        assert_eq!(running.status, IngestJobStatus::Running);
        assert!(running.started_at.is_some());

        let succeeded = mark_succeeded(&db, "job1", serde_json::json!({"created": 3}))
            .await
            .expect("mark_succeeded");
        assert_eq!(succeeded.status, IngestJobStatus::Succeeded);
        assert!(succeeded.completed_at.is_some());
        assert!(succeeded.is_terminal());
    }

    #[tokio::test]
    async fn terminal_states_reject_further_transitions() {
        let db = memory_db().await;
        create(&db, sample_input("job1")).await.expect("create");
        mark_running(&db, "job1").await.expect("mark_running");
        mark_failed(&db, "job1", "boom").await.expect("mark_failed");

        let err = mark_running(&db, "job1").await.unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn list_running_only_returns_running_jobs() {
        let db = memory_db().await;
        create(&db, sample_input("job1")).await.expect("create pending");
        create(&db, sample_input("job2")).await.expect("create running");
        mark_running(&db, "job2").await.expect("mark_running");

        let running = list_running(&db).await.expect("list_running");
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, "job2");
    }

    #[tokio::test]
    async fn advance_progress_updates_without_changing_status() {
        let db = memory_db().await;
        create(&db, sample_input("job1")).await.expect("create");
        mark_running(&db, "job1").await.expect("mark_running");

        advance_progress(&db, "job1", 5).await.expect("advance_progress");
        let job = get(&db, "job1").await.expect("get").expect("present");
        assert_eq!(job.progress, 5);
        assert_eq!(job.status, IngestJobStatus::Running);
    }
}
