//! SHA invoice handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use domain_claims::ShaInvoice;

use crate::auth::{permissions, require_any, Claims};
use crate::dto::claims::InvoiceListQuery;
use crate::{error::ApiError, AppState};

/// Generates the invoice for a compliance-verified claim
pub async fn generate_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(claim_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ShaInvoice>), ApiError> {
    require_any(&user, permissions::INVOICE)?;

    let invoice = state.claims.generate_invoice(claim_id.into(), user.actor()).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Lists invoices, newest first
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Query(query): Query<InvoiceListQuery>,
) -> Result<Json<Vec<ShaInvoice>>, ApiError> {
    require_any(&user, permissions::INVOICE)?;
    Ok(Json(state.claims.list_invoices(&query.into_filter()?).await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShaInvoice>, ApiError> {
    require_any(&user, permissions::INVOICE)?;
    Ok(Json(state.claims.get_invoice(id.into()).await?))
}

/// Marks the invoice printed; its claim becomes ready to submit
pub async fn print_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShaInvoice>, ApiError> {
    require_any(&user, permissions::INVOICE)?;
    Ok(Json(state.claims.print_invoice(id.into(), user.actor()).await?))
}
