//! Claims Domain Ports
//!
//! Port interfaces the claims services depend on. PostgreSQL adapters live
//! in `infra_db`, the SHA REST adapter in [`crate::adapters`], and in-memory
//! fakes in `test_utils`.
//!
//! ```rust,ignore
//! let service = ClaimsService::new(
//!     Arc::new(PgClaimStore::new(pool.clone())),
//!     Arc::new(ShaApiClient::new(sha_config)?),
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, ClaimId, DocumentId, DomainPort, InvoiceId, PatientId, PortError, WorkflowId};

use crate::batch::{BatchSelection, BatchStatus, ClaimBatch};
use crate::claim::{ClaimStatus, ShaClaim};
use crate::document::DocumentAttachment;
use crate::invoice::{InvoiceStatus, ShaInvoice};
use crate::numbering::NumberKind;
use crate::payment::PaymentTracking;
use crate::submission::{
    ShaBatchPayload, ShaClaimPayload, ShaStatusResponse, ShaSubmissionResponse, SubmissionLog,
};
use crate::workflow::{WorkflowActivity, WorkflowFilter, WorkflowInstance};

/// Query parameters for listing claims
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimFilter {
    pub status: Option<ClaimStatus>,
    pub patient_id: Option<PatientId>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ClaimFilter {
    pub fn matches(&self, claim: &ShaClaim) -> bool {
        self.status.map_or(true, |s| claim.status == s)
            && self.patient_id.map_or(true, |p| claim.patient_id == p)
    }
}

/// Query parameters for listing invoices
///
/// `from` and `to` bound the generation time; `search` matches the invoice
/// number, claim number or patient name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &ShaInvoice) -> bool {
        self.status.map_or(true, |s| invoice.status == s)
            && self.from.map_or(true, |from| invoice.generated_at >= from)
            && self.to.map_or(true, |to| invoice.generated_at <= to)
            && self.search.as_deref().map_or(true, |term| {
                let term = term.to_lowercase();
                [&invoice.invoice_number, &invoice.claim_number, &invoice.patient_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            })
    }
}

/// Persistence for claims and the records hanging off them
#[async_trait]
pub trait ClaimStore: DomainPort {
    /// Returns the next value of a numbering sequence for the period
    async fn next_sequence(&self, kind: NumberKind, period: &str) -> Result<u32, PortError>;

    async fn insert_claim(&self, claim: &ShaClaim) -> Result<(), PortError>;
    async fn update_claim(&self, claim: &ShaClaim) -> Result<(), PortError>;
    /// Writes the claim only if the stored status still equals `expected`;
    /// otherwise fails with `PortError::Conflict`
    async fn transition_claim(&self, claim: &ShaClaim, expected: ClaimStatus) -> Result<(), PortError>;
    /// Writes a reworked claim and drops its previous invoice in one transaction
    async fn save_rework(&self, claim: &ShaClaim, voided_invoice: Option<InvoiceId>) -> Result<(), PortError>;
    /// Removes the claim with its documents, invoice and tracking rows
    async fn delete_claim(&self, id: ClaimId) -> Result<(), PortError>;
    async fn get_claim(&self, id: ClaimId) -> Result<Option<ShaClaim>, PortError>;
    async fn list_claims(&self, filter: &ClaimFilter) -> Result<Vec<ShaClaim>, PortError>;

    /// Unbatched `ReadyToSubmit` claims matching the selection
    async fn find_batch_candidates(&self, selection: &BatchSelection) -> Result<Vec<ShaClaim>, PortError>;
    async fn claims_in_batch(&self, batch_id: BatchId) -> Result<Vec<ShaClaim>, PortError>;
    /// Submitted claims that carry an SHA reference
    async fn claims_awaiting_reconciliation(&self) -> Result<Vec<ShaClaim>, PortError>;

    async fn insert_document(&self, document: &DocumentAttachment) -> Result<(), PortError>;
    async fn update_document(&self, document: &DocumentAttachment) -> Result<(), PortError>;
    async fn get_document(&self, id: DocumentId) -> Result<Option<DocumentAttachment>, PortError>;
    async fn list_documents(&self, claim_id: ClaimId) -> Result<Vec<DocumentAttachment>, PortError>;
    async fn delete_document(&self, id: DocumentId) -> Result<(), PortError>;

    async fn insert_invoice(&self, invoice: &ShaInvoice) -> Result<(), PortError>;
    async fn update_invoice(&self, invoice: &ShaInvoice) -> Result<(), PortError>;
    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<ShaInvoice>, PortError>;
    async fn invoice_for_claim(&self, claim_id: ClaimId) -> Result<Option<ShaInvoice>, PortError>;
    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<ShaInvoice>, PortError>;

    /// Inserts the batch and assigns the claims to it atomically
    async fn create_batch(&self, batch: &ClaimBatch, claim_ids: &[ClaimId]) -> Result<(), PortError>;
    async fn update_batch(&self, batch: &ClaimBatch) -> Result<(), PortError>;
    async fn get_batch(&self, id: BatchId) -> Result<Option<ClaimBatch>, PortError>;
    async fn list_batches(&self, status: Option<BatchStatus>) -> Result<Vec<ClaimBatch>, PortError>;
    /// Deletes the batch and releases its claims atomically
    async fn delete_batch(&self, id: BatchId) -> Result<(), PortError>;
    /// Persists a submitted batch together with its submitted claims.
    /// Fails with `PortError::Conflict` unless the stored batch is still a
    /// draft and every claim is still ready to submit.
    async fn save_batch_submission(&self, batch: &ClaimBatch, claims: &[ShaClaim]) -> Result<(), PortError>;

    async fn insert_submission_log(&self, log: &SubmissionLog) -> Result<(), PortError>;
    async fn update_submission_log(&self, log: &SubmissionLog) -> Result<(), PortError>;

    async fn due_payment_checks(&self, now: DateTime<Utc>) -> Result<Vec<PaymentTracking>, PortError>;
    async fn update_payment_tracking(&self, tracking: &PaymentTracking) -> Result<(), PortError>;
}

/// Side effect of an automated step, committed with the step transition
#[derive(Debug, Clone, PartialEq)]
pub enum StepEffect {
    UpdateClaim(ShaClaim),
    InsertInvoice(ShaInvoice),
    InsertPaymentTracking(PaymentTracking),
}

/// Persistence for workflow instances, steps and activity
///
/// `save_transition` uses `version` for optimistic locking and fails with
/// `PortError::Conflict` when the stored instance moved on.
#[async_trait]
pub trait WorkflowStore: DomainPort {
    async fn insert_workflow(
        &self,
        workflow: &WorkflowInstance,
        activities: &[WorkflowActivity],
    ) -> Result<(), PortError>;

    /// Writes the instance, its steps, activities and effects in one transaction
    async fn save_transition(
        &self,
        workflow: &WorkflowInstance,
        activities: &[WorkflowActivity],
        effects: &[StepEffect],
    ) -> Result<(), PortError>;

    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<WorkflowInstance>, PortError>;
    async fn active_workflow_for_claim(&self, claim_id: ClaimId) -> Result<Option<WorkflowInstance>, PortError>;
    async fn list_workflows(&self, filter: &WorkflowFilter) -> Result<Vec<WorkflowInstance>, PortError>;
    async fn list_activity(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowActivity>, PortError>;
}

/// Outbound SHA API
#[async_trait]
pub trait ShaGateway: DomainPort {
    /// Provider code sent with every submission
    fn provider_code(&self) -> &str;

    async fn submit_claim(&self, payload: &ShaClaimPayload) -> Result<ShaSubmissionResponse, PortError>;
    async fn submit_batch(&self, payload: &ShaBatchPayload) -> Result<ShaSubmissionResponse, PortError>;
    async fn claim_status(&self, reference: &str) -> Result<ShaStatusResponse, PortError>;
    async fn batch_status(&self, reference: &str) -> Result<ShaStatusResponse, PortError>;
}
