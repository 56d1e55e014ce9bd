//! `add_procedure`, `search_procedures`, `get_procedure`,
//! `list_procedures`, `delete_procedure`.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use common::storage::query::procedure as procedure_query;
use common::storage::types::procedure::Step;
use service::memory::{self, AddProcedureInput};

use crate::error::{ToolError, ToolResult};
use crate::ids::{qualify, record_json, strip_prefix};
use crate::validate::{non_empty, non_empty_list, range_u32};
use crate::ToolDeps;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StepArg {
    pub order: i64,
    pub content: String,
    #[serde(default)]
    pub optional: bool,
}

impl From<StepArg> for Step {
    fn from(arg: StepArg) -> Self {
        Step {
            order: arg.order,
            content: arg.content,
            optional: arg.optional,
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddProcedureArgs {
    pub name: String,
    pub description: String,
    pub steps: Vec<StepArg>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// `add_procedure(name, description, steps[], labels?, context?) →
/// {id, name, description, step_count, labels, context?, action}`.
pub async fn add_procedure(deps: &ToolDeps<'_>, args: AddProcedureArgs) -> ToolResult {
    let name = non_empty("name", &args.name)?.to_string();
    non_empty("description", &args.description)?;
    non_empty_list("steps", &args.steps)?;
    let context = deps.resolve_context(args.context.as_deref());

    let steps: Vec<Step> = args.steps.into_iter().map(Step::from).collect();

    let procedure = memory::add_procedure(
        deps.db,
        deps.embedder,
        AddProcedureInput {
            id: None,
            name,
            description: args.description,
            steps,
            labels: args.labels,
            context,
        },
    )
    .await?;

    Ok(json!({
        "id": qualify("procedure", &procedure.id),
        "name": procedure.name,
        "description": procedure.description,
        "step_count": procedure.steps.len(),
        "labels": procedure.labels,
        "context": procedure.context,
        "action": "created",
    }))
}

fn procedure_summary(raw_id: &str, procedure: &common::storage::types::procedure::Procedure) -> serde_json::Value {
    json!({
        "id": qualify("procedure", raw_id),
        "name": procedure.name,
        "description": procedure.description,
        "step_count": procedure.steps.len(),
        "labels": procedure.labels,
        "context": procedure.context,
    })
}

fn default_procedure_search_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchProceduresArgs {
    pub query: String,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default = "default_procedure_search_limit")]
    pub limit: u32,
}

/// `search_procedures(query, labels?, context?, limit) →
/// {procedures:[summary…], count}`.
pub async fn search_procedures(deps: &ToolDeps<'_>, args: SearchProceduresArgs) -> ToolResult {
    let query = non_empty("query", &args.query)?.to_string();
    let limit = range_u32("limit", args.limit, 1, 50)?;
    let context = deps.resolve_context(args.context.as_deref());

    let procedures = procedure_query::search(deps.db, &query, args.labels.as_deref(), context.as_deref(), limit).await?;

    let mut payload = Vec::with_capacity(procedures.len());
    for procedure in &procedures {
        fire_access_update(deps, &procedure.id).await;
        payload.push(procedure_summary(&procedure.id, procedure));
    }

    Ok(json!({ "procedures": payload, "count": payload.len() }))
}

fn default_list_limit() -> u32 {
    50
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListProceduresArgs {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: u32,
}

/// `list_procedures(context?, limit) → same shape as search_procedures`.
pub async fn list_procedures(deps: &ToolDeps<'_>, args: ListProceduresArgs) -> ToolResult {
    let limit = range_u32("limit", args.limit, 1, 100)?;
    let context = deps.resolve_context(args.context.as_deref());

    let procedures = procedure_query::list(deps.db, context.as_deref(), limit).await?;
    let payload: Vec<_> = procedures
        .iter()
        .map(|procedure| procedure_summary(&procedure.id, procedure))
        .collect();

    Ok(json!({ "procedures": payload, "count": payload.len() }))
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetProcedureArgs {
    pub id: String,
}

/// `get_procedure(id) → procedure row with steps`.
pub async fn get_procedure(deps: &ToolDeps<'_>, args: GetProcedureArgs) -> ToolResult {
    let raw_id = strip_prefix("procedure", non_empty("id", &args.id)?);
    let procedure = procedure_query::get(deps.db, &raw_id)
        .await?
        .ok_or_else(|| ToolError::not_found(format!("procedure {} not found", qualify("procedure", &raw_id))))?;

    fire_access_update(deps, &raw_id).await;
    record_json("procedure", &raw_id, &procedure)
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteProcedureArgs {
    pub id: String,
}

/// `delete_procedure(id) → {deleted, message}`.
pub async fn delete_procedure(deps: &ToolDeps<'_>, args: DeleteProcedureArgs) -> ToolResult {
    let raw_id = strip_prefix("procedure", non_empty("id", &args.id)?);
    let deleted = procedure_query::delete(deps.db, &raw_id).await?;
    Ok(json!({
        "deleted": deleted,
        "message": if deleted {
            format!("procedure {} deleted", qualify("procedure", &raw_id))
        } else {
            format!("procedure {} not found", qualify("procedure", &raw_id))
        },
    }))
}

async fn fire_access_update(deps: &ToolDeps<'_>, procedure_id: &str) {
    if let Err(err) = procedure_query::update_access(deps.db, procedure_id).await {
        tracing::warn!(procedure_id, error = %err, "procedure access update failed");
    }
}
