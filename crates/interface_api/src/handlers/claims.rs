//! SHA claim and document handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use domain_claims::{ClaimFilter, ClaimStatus, DocumentAttachment, DocumentChecklist};
use domain_jobs::JobPayload;

use crate::auth::{permissions, require_any, Claims};
use crate::dto::claims::*;
use crate::dto::jobs::JobResponse;
use crate::dto::parse_optional;
use crate::{error::ApiError, AppState};

/// Creates a draft claim
pub async fn create_claim(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Json(request): Json<CreateClaimRequest>,
) -> Result<(StatusCode, Json<ClaimResponse>), ApiError> {
    require_any(&user, permissions::CLAIM_CREATE)?;
    request.validate()?;

    let claim = state.claims.create_claim(request.into_new_claim(user.user_id()?)?).await?;
    Ok((StatusCode::CREATED, Json(claim.into())))
}

/// Lists claims, optionally filtered by status or patient
pub async fn list_claims(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Query(query): Query<ClaimListQuery>,
) -> Result<Json<Vec<ClaimResponse>>, ApiError> {
    require_any(&user, permissions::CLAIM_READ)?;

    let filter = ClaimFilter {
        status: parse_optional::<ClaimStatus>(query.status.as_deref(), "status")?,
        patient_id: query.patient_id.map(Into::into),
        limit: query.limit,
        offset: query.offset,
    };
    let claims = state.claims.list_claims(&filter).await?;
    Ok(Json(claims.into_iter().map(ClaimResponse::from).collect()))
}

/// Gets a claim with its documents and compliance state
pub async fn get_claim(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClaimDetailResponse>, ApiError> {
    require_any(&user, permissions::CLAIM_READ)?;

    let claim = state.claims.get_claim(id.into()).await?;
    let documents = state.claims.list_documents(claim.id).await?;
    let compliance = domain_claims::ComplianceReport::from_documents(&documents);
    Ok(Json(ClaimDetailResponse {
        claim: claim.into(),
        documents,
        compliance,
    }))
}

/// Updates a claim's amount or notes, or sends a rejected claim back to draft
pub async fn update_claim(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    require_any(&user, permissions::CLAIM_CREATE)?;
    request.validate()?;

    let status = parse_optional::<ClaimStatus>(request.status.as_deref(), "status")?;
    let claim = match status {
        Some(ClaimStatus::Draft) => {
            if request.claim_amount.is_some() || request.notes.is_some() {
                return Err(ApiError::validation("rework cannot be combined with field changes"));
            }
            state.claims.rework_claim(id.into(), user.actor()).await?
        }
        Some(other) => {
            return Err(ApiError::validation(format!(
                "status can only be set to draft, not {other}"
            )))
        }
        None => state.claims.update_claim(id.into(), request.into_update()).await?,
    };
    Ok(Json(claim.into()))
}

/// Deletes a claim that has not been batched or submitted
pub async fn delete_claim(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_any(&user, permissions::CLAIM_DELETE)?;

    state.claims.delete_claim(id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_documents(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DocumentAttachment>>, ApiError> {
    require_any(&user, permissions::CLAIM_READ)?;

    let claim = state.claims.get_claim(id.into()).await?;
    Ok(Json(state.claims.list_documents(claim.id).await?))
}

/// Documents the claim needs, given its services, and which are in hand
pub async fn document_checklist(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentChecklist>, ApiError> {
    require_any(&user, permissions::CLAIM_READ)?;
    Ok(Json(state.claims.document_checklist(id.into()).await?))
}

pub async fn add_document(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentAttachment>), ApiError> {
    require_any(&user, permissions::CLAIM_DOCUMENTS)?;
    request.validate()?;

    let document = state
        .claims
        .add_document(id.into(), request.into_new_document()?, user.user_id()?)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn verify_document(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path((id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DocumentAttachment>, ApiError> {
    require_any(&user, permissions::CLAIM_DOCUMENTS)?;

    let document = state
        .claims
        .verify_document(id.into(), document_id.into(), user.user_id()?)
        .await?;
    Ok(Json(document))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path((id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    require_any(&user, permissions::CLAIM_DOCUMENTS)?;

    state.claims.delete_document(id.into(), document_id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Queues a ready claim for submission to SHA
///
/// A claim already waiting in the queue is not queued twice.
pub async fn submit_claim(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    require_any(&user, permissions::CLAIM_SUBMIT)?;

    let claim = state.claims.get_claim(id.into()).await?;
    if claim.status != ClaimStatus::ReadyToSubmit {
        return Err(ApiError::Conflict(format!(
            "claim {} is {}; only ready_to_submit claims can be submitted",
            claim.claim_number, claim.status
        )));
    }
    if let Some(batch_id) = claim.batch_id {
        return Err(ApiError::Conflict(format!(
            "claim {} belongs to batch {batch_id}; submit the batch instead",
            claim.claim_number
        )));
    }

    let job = state
        .jobs
        .enqueue_unique(JobPayload::SubmitSingleClaim { claim_id: claim.id })
        .await?
        .ok_or_else(|| ApiError::Conflict(format!("claim {} is already queued for submission", claim.claim_number)))?;
    Ok((StatusCode::ACCEPTED, Json(job.into())))
}
