//! Procedure operations: `CreateProcedure`, `GetProcedure`,
//! `DeleteProcedure`, `SearchProcedures`, `ListProcedures`,
//! `UpdateProcedureAccess`.

use crate::error::MemoryError;
use crate::storage::connection::ConnectionManager;
use crate::storage::types::procedure::{Procedure, Step};

#[derive(Debug, Clone)]
pub struct CreateProcedureInput {
    pub id: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
    pub embedding: Option<Vec<f32>>,
    pub labels: Vec<String>,
    pub context: Option<String>,
}

fn validate_steps(steps: &[Step]) -> Result<(), MemoryError> {
    if steps.is_empty() {
        return Err(MemoryError::InvalidInput(
            "procedure must have at least one step".into(),
        ));
    }
    for (index, step) in steps.iter().enumerate() {
        let expected = (index + 1) as i64;
        if step.order != expected {
            return Err(MemoryError::InvalidInput(format!(
                "step order must be strictly increasing and contiguous from 1, expected {expected} got {}",
                step.order
            )));
        }
    }
    Ok(())
}

pub async fn create(
    db: &ConnectionManager,
    input: CreateProcedureInput,
) -> Result<Procedure, MemoryError> {
    if input.name.trim().is_empty() {
        return Err(MemoryError::InvalidInput(
            "procedure name must not be empty".into(),
        ));
    }
    validate_steps(&input.steps)?;

    let mut response = db
        .client()
        .await
        .query(
            "CREATE type::thing('procedure', $id) CONTENT {
                name: $name,
                description: $description,
                steps: $steps,
                embedding: $embedding,
                labels: $labels,
                context: $context,
                created: time::now(),
                updated: time::now(),
                accessed: time::now(),
                access_count: 0
            } RETURN AFTER;",
        )
        .bind(("id", input.id.clone()))
        .bind(("name", input.name))
        .bind(("description", input.description))
        .bind(("steps", input.steps))
        .bind(("embedding", input.embedding))
        .bind(("labels", input.labels))
        .bind(("context", input.context))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    let rows: Vec<Procedure> = response.take(0).map_err(MemoryError::from)?;
    rows.into_iter().next().ok_or_else(|| {
        MemoryError::Internal(format!("create of procedure {} returned no row", input.id))
    })
}

pub async fn get(db: &ConnectionManager, id: &str) -> Result<Option<Procedure>, MemoryError> {
    db.client()
        .await
        .select(("procedure", id))
        .await
        .map_err(MemoryError::from)
}

pub async fn delete(db: &ConnectionManager, id: &str) -> Result<bool, MemoryError> {
    let existing: Option<Procedure> = db
        .client()
        .await
        .delete(("procedure", id))
        .await
        .map_err(MemoryError::from)?;
    Ok(existing.is_some())
}

pub async fn update_access(db: &ConnectionManager, id: &str) -> Result<(), MemoryError> {
    db.client()
        .await
        .query(
            "UPDATE type::thing('procedure', $id) SET
                accessed = time::now(),
                access_count = IF access_count != NONE THEN access_count + 1 ELSE 1 END;",
        )
        .bind(("id", id.to_string()))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;
    Ok(())
}

pub async fn search(
    db: &ConnectionManager,
    query_text: &str,
    labels: Option<&[String]>,
    context: Option<&str>,
    limit: u32,
) -> Result<Vec<Procedure>, MemoryError> {
    let mut response = db
        .client()
        .await
        .query(
            "SELECT * FROM procedure
                WHERE (name @0@ $query OR description @1@ $query)
                AND ($labels IS NONE OR labels CONTAINSANY $labels)
                AND ($context IS NONE OR context = $context)
                ORDER BY search::score(0) + search::score(1) DESC
                LIMIT $limit;",
        )
        .bind(("query", query_text.to_string()))
        .bind(("labels", labels.map(<[String]>::to_vec)))
        .bind(("context", context.map(str::to_string)))
        .bind(("limit", limit))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    response.take(0).map_err(MemoryError::from)
}

pub async fn list(
    db: &ConnectionManager,
    context: Option<&str>,
    limit: u32,
) -> Result<Vec<Procedure>, MemoryError> {
    let mut response = db
        .client()
        .await
        .query(
            "SELECT * FROM procedure
                WHERE $context IS NONE OR context = $context
                ORDER BY created DESC
                LIMIT $limit;",
        )
        .bind(("context", context.map(str::to_string)))
        .bind(("limit", limit))
        .await
        .map_err(MemoryError::from)?
        .check()
        .map_err(MemoryError::from)?;

    response.take(0).map_err(MemoryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthScope;
    use crate::storage::connection::ConnectionSettings;
    use crate::storage::schema::Schema;
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

    #[tokio::test]
    async fn rejects_non_contiguous_step_order() {
        let steps = vec![
            Step {
                order: 1,
                content: "first".into(),
                optional: false,
            },
            Step {
                order: 3,
                content: "skips two".into(),
                optional: false,
            },
        ];
        let err = validate_steps(&steps).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let db = memory_db().await;
        let input = CreateProcedureInput {
            id: "deploy".to_string(),
            name: "Deploy service".to_string(),
            description: "Standard rollout".to_string(),
            steps: vec![Step {
                order: 1,
                content: "run migrations".into(),
                optional: false,
            }],
            embedding: None,
            labels: vec!["ops".into()],
            context: None,
        };
        create(&db, input).await.expect("create procedure");

        let fetched = get(&db, "deploy").await.expect("get").expect("present");
        assert_eq!(fetched.name, "Deploy service");
        assert_eq!(fetched.steps.len(), 1);
    }
}
