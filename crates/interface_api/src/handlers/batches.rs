//! SHA batch handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;

use domain_claims::{BatchStatistics, BatchStatus, BatchType, NewBatch};
use domain_jobs::JobPayload;

use crate::auth::{permissions, require_any, Claims};
use crate::dto::batches::*;
use crate::dto::jobs::JobResponse;
use crate::dto::parse_optional;
use crate::{error::ApiError, AppState};

/// Creates a draft batch from the eligible claims
pub async fn create_batch(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Json(request): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    require_any(&user, permissions::BATCH)?;

    let batch_type: BatchType = request.batch_type.parse()?;
    let input = NewBatch {
        batch_type,
        batch_date: request.batch_date.unwrap_or_else(|| Utc::now().date_naive()),
        claim_ids: request.claim_ids.into_iter().map(Into::into).collect(),
        created_by: user.actor().to_string(),
    };
    let (batch, claims) = state.claims.create_batch(input).await?;
    Ok((StatusCode::CREATED, Json(BatchResponse::with_claims(batch, claims))))
}

pub async fn list_batches(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Query(query): Query<BatchListQuery>,
) -> Result<Json<Vec<BatchResponse>>, ApiError> {
    require_any(&user, permissions::BATCH)?;

    let status = parse_optional::<BatchStatus>(query.status.as_deref(), "status")?;
    let batches = state.claims.list_batches(status).await?;
    Ok(Json(batches.into_iter().map(BatchResponse::summary).collect()))
}

/// Batch counts and totals, optionally limited to a batch date range
pub async fn statistics(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Query(query): Query<BatchStatsQuery>,
) -> Result<Json<BatchStatistics>, ApiError> {
    require_any(&user, permissions::BATCH)?;
    Ok(Json(state.claims.batch_statistics(query.from, query.to).await?))
}

/// Gets a batch with its claims
pub async fn get_batch(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchResponse>, ApiError> {
    require_any(&user, permissions::BATCH)?;

    let batch = state.claims.get_batch(id.into()).await?;
    let claims = state.claims.batch_claims(batch.id).await?;
    Ok(Json(BatchResponse::with_claims(batch, claims)))
}

/// Queues a draft batch for submission to SHA
pub async fn submit_batch(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    require_any(&user, permissions::BATCH)?;

    let batch = state.claims.get_batch(id.into()).await?;
    batch.ensure_draft()?;
    let job = state
        .jobs
        .enqueue_unique(JobPayload::SubmitClaimBatch { batch_id: batch.id })
        .await?
        .ok_or_else(|| ApiError::Conflict(format!("batch {} is already queued for submission", batch.batch_number)))?;
    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

pub async fn mark_printed(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchResponse>, ApiError> {
    require_any(&user, permissions::BATCH)?;

    let batch = state.claims.mark_batch_printed(id.into(), user.actor()).await?;
    Ok(Json(BatchResponse::summary(batch)))
}

/// Deletes a draft batch, releasing its claims
pub async fn delete_batch(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_any(&user, permissions::BATCH)?;

    state.claims.delete_batch(id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}
