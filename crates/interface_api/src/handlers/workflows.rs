//! Claims workflow handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use domain_claims::{StepName, WorkflowActivity, WorkflowFilter, WorkflowInstance, WorkflowStatistics, WorkflowStatus};

use crate::auth::{permissions, require_any, Claims};
use crate::dto::parse_optional;
use crate::dto::workflows::*;
use crate::{error::ApiError, AppState};

fn step_name(value: &str) -> Result<StepName, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::NotFound(format!("Workflow step {value} not found")))
}

/// Starts the workflow for a claim
pub async fn create_workflow(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Json(request): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<WorkflowInstance>), ApiError> {
    require_any(&user, permissions::WORKFLOW)?;

    let workflow = state.workflows.initialize(request.claim_id.into(), user.actor()).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

pub async fn list_workflows(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Query(query): Query<WorkflowListQuery>,
) -> Result<Json<Vec<WorkflowInstance>>, ApiError> {
    require_any(&user, permissions::WORKFLOW)?;

    let filter = WorkflowFilter {
        status: parse_optional::<WorkflowStatus>(query.status.as_deref(), "status")?,
        claim_id: query.claim_id.map(Into::into),
        from: query.from,
        to: query.to,
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(state.workflows.list(&filter).await?))
}

pub async fn statistics(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<WorkflowStatistics>, ApiError> {
    require_any(&user, permissions::WORKFLOW)?;
    Ok(Json(state.workflows.statistics(query.from, query.to).await?))
}

pub async fn get_workflow(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowInstance>, ApiError> {
    require_any(&user, permissions::WORKFLOW)?;
    Ok(Json(state.workflows.get(id.into()).await?))
}

pub async fn activity(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<WorkflowActivity>>, ApiError> {
    require_any(&user, permissions::WORKFLOW)?;
    Ok(Json(state.workflows.activity(id.into()).await?))
}

/// Completes a manual step
///
/// The body is optional; without one the workflow auto-advances.
pub async fn complete_step(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path((id, step)): Path<(Uuid, String)>,
    request: Option<Json<CompleteStepRequest>>,
) -> Result<Json<WorkflowInstance>, ApiError> {
    require_any(&user, permissions::WORKFLOW)?;

    let Json(request) = request.unwrap_or_default();
    let workflow = state
        .workflows
        .complete_step(
            id.into(),
            step_name(&step)?,
            user.actor(),
            request.notes,
            request.auto_advance.unwrap_or(true),
        )
        .await?;
    Ok(Json(workflow))
}

pub async fn skip_step(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path((id, step)): Path<(Uuid, String)>,
    request: Option<Json<ReasonRequest>>,
) -> Result<Json<WorkflowInstance>, ApiError> {
    require_any(&user, permissions::WORKFLOW)?;

    let Json(request) = request.unwrap_or_default();
    let workflow = state
        .workflows
        .skip_step(id.into(), step_name(&step)?, user.actor(), request.reason)
        .await?;
    Ok(Json(workflow))
}

/// Re-opens a failed step and resumes automation
pub async fn retry_step(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path((id, step)): Path<(Uuid, String)>,
) -> Result<Json<WorkflowInstance>, ApiError> {
    require_any(&user, permissions::WORKFLOW)?;

    let workflow = state.workflows.retry_step(id.into(), step_name(&step)?, user.actor()).await?;
    Ok(Json(workflow))
}

pub async fn automate(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowInstance>, ApiError> {
    require_any(&user, permissions::WORKFLOW)?;
    Ok(Json(state.workflows.process_automated_steps(id.into(), user.actor()).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
    request: Option<Json<ReasonRequest>>,
) -> Result<Json<WorkflowInstance>, ApiError> {
    require_any(&user, permissions::WORKFLOW_CANCEL)?;

    let Json(request) = request.unwrap_or_default();
    Ok(Json(state.workflows.cancel(id.into(), user.actor(), request.reason).await?))
}
