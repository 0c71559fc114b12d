//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use core_kernel::PortError;
use domain_claims::ClaimError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error: {message}")]
    Validation { message: String, details: Vec<String> },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, message, details) = match self {
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized => ("unauthorized", "Unauthorized".to_string(), None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::Unavailable(msg) => ("service_unavailable", msg, None),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                ("internal_error", "Internal server error".to_string(), None)
            }
            ApiError::Validation { message, details } => {
                ("validation_error", message, (!details.is_empty()).then_some(details))
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => ApiError::NotFound(format!("{entity_type} not found: {id}")),
            PortError::Validation { message, .. } => ApiError::validation(message),
            PortError::Conflict { message } => ApiError::Conflict(message),
            other if other.is_transient() => ApiError::Unavailable(other.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ClaimError> for ApiError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::NotFound { .. } | ClaimError::StepNotFound(_) => ApiError::NotFound(err.to_string()),
            ClaimError::Validation(message) => ApiError::validation(message),
            ClaimError::InvalidStatusTransition { .. }
            | ClaimError::InvoiceExists(_)
            | ClaimError::BatchNotDraft { .. }
            | ClaimError::StepState { .. }
            | ClaimError::WorkflowClosed(_)
            | ClaimError::ActiveWorkflowExists(_)
            | ClaimError::ClaimInBatch { .. }
            | ClaimError::ClaimLocked { .. } => ApiError::Conflict(err.to_string()),
            ClaimError::ComplianceFailed { .. }
            | ClaimError::ComplianceNotVerified
            | ClaimError::EmptyBatch
            | ClaimError::MissingReference(_)
            | ClaimError::PrerequisitesNotMet { .. }
            | ClaimError::RequiredStep(_)
            | ClaimError::Money(_) => ApiError::BadRequest(err.to_string()),
            ClaimError::Port(port) => port.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{field}: {message}"),
                    None => format!("{field}: {}", e.code),
                })
            })
            .collect();
        details.sort();
        ApiError::Validation {
            message: "Request validation failed".to_string(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_error_status_mapping() {
        let cases = [
            (ClaimError::not_found("Claim", "x"), StatusCode::NOT_FOUND),
            (ClaimError::validation("bad member number"), StatusCode::UNPROCESSABLE_ENTITY),
            (ClaimError::InvoiceExists("SHA-INV-1".into()), StatusCode::CONFLICT),
            (ClaimError::EmptyBatch, StatusCode::BAD_REQUEST),
            (
                ClaimError::ClaimInBatch { claim_number: "SHA-1".into(), batch_id: "b".into() },
                StatusCode::CONFLICT,
            ),
            (
                ClaimError::ClaimLocked { claim_number: "SHA-1".into(), status: "submitted".into() },
                StatusCode::CONFLICT,
            ),
            (ClaimError::RequiredStep("compliance_check".into()), StatusCode::BAD_REQUEST),
            (ClaimError::Port(PortError::conflict("stale")), StatusCode::CONFLICT),
            (ClaimError::Port(PortError::connection("down")), StatusCode::SERVICE_UNAVAILABLE),
            (ClaimError::Port(PortError::internal("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
