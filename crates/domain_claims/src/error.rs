//! Claims domain errors

use thiserror::Error;

use core_kernel::{MoneyError, PortError};

/// Errors that can occur in the claims domain
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Compliance check failed: {verified} of {required} required documents verified")]
    ComplianceFailed { required: usize, verified: usize },

    #[error("Claim compliance has not been verified")]
    ComplianceNotVerified,

    #[error("An invoice already exists for this claim: {0}")]
    InvoiceExists(String),

    #[error("No eligible claims found for batch")]
    EmptyBatch,

    #[error("Claim {claim_number} belongs to batch {batch_id}; submit the batch instead")]
    ClaimInBatch { claim_number: String, batch_id: String },

    #[error("Claim {claim_number} is {status} and can no longer be changed")]
    ClaimLocked { claim_number: String, status: String },

    #[error("Batch {batch_number} is {status}; only draft batches can be changed")]
    BatchNotDraft { batch_number: String, status: String },

    #[error("Claim {0} has no SHA reference")]
    MissingReference(String),

    #[error("Workflow step {0} not found")]
    StepNotFound(String),

    #[error("Step {step} is {status}, expected {expected}")]
    StepState {
        step: String,
        status: String,
        expected: &'static str,
    },

    #[error("Prerequisites not met for step {step}: {missing:?}")]
    PrerequisitesNotMet { step: String, missing: Vec<String> },

    #[error("Step {0} is required and cannot be skipped")]
    RequiredStep(String),

    #[error("Workflow is already {0}")]
    WorkflowClosed(String),

    #[error("Claim {0} already has an active workflow")]
    ActiveWorkflowExists(String),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl ClaimError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ClaimError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ClaimError::Validation(message.into())
    }

    /// Returns true if retrying the operation later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ClaimError::Port(e) if e.is_transient())
    }
}

