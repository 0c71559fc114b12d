//! Job control handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use domain_jobs::{JobPayload, QueueName, QueueStats};

use crate::auth::{permissions, require_any, Claims};
use crate::dto::jobs::JobResponse;
use crate::{error::ApiError, AppState};

fn queue_name(value: &str) -> Result<QueueName, ApiError> {
    value.parse().map_err(|_| ApiError::NotFound(format!("Queue {value} not found")))
}

/// Queues an immediate reconciliation run
pub async fn reconcile(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    require_any(&user, permissions::JOBS)?;

    let job = state.jobs.enqueue(JobPayload::ReconcileClaims).await?;
    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

pub async fn queue_stats(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(queue): Path<String>,
) -> Result<Json<QueueStats>, ApiError> {
    require_any(&user, permissions::JOBS)?;
    Ok(Json(state.jobs.stats(queue_name(&queue)?).await?))
}

pub async fn get_job(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path((queue, id)): Path<(String, Uuid)>,
) -> Result<Json<JobResponse>, ApiError> {
    require_any(&user, permissions::JOBS)?;

    let queue = queue_name(&queue)?;
    let job = state
        .jobs
        .get(id.into())
        .await?
        .filter(|job| job.queue == queue)
        .ok_or_else(|| ApiError::NotFound(format!("Job {id} not found in queue {queue}")))?;
    Ok(Json(job.into()))
}
