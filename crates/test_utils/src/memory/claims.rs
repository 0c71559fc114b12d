use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{
    BatchId, ClaimId, DocumentId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, PortError,
    WorkflowId,
};
use domain_claims::{
    BatchSelection, BatchStatus, ClaimBatch, ClaimFilter, ClaimStatus, ClaimStore, DocumentAttachment,
    InvoiceFilter, NumberKind, PaymentTracking, ShaClaim, ShaInvoice, StepEffect, SubmissionLog, WorkflowActivity,
    WorkflowFilter, WorkflowInstance, WorkflowStore,
};

use super::lock;

#[derive(Default)]
struct State {
    sequences: HashMap<(NumberKind, String), u32>,
    claims: BTreeMap<ClaimId, ShaClaim>,
    documents: Vec<DocumentAttachment>,
    invoices: BTreeMap<InvoiceId, ShaInvoice>,
    batches: BTreeMap<BatchId, ClaimBatch>,
    submission_logs: Vec<SubmissionLog>,
    payment_tracking: Vec<PaymentTracking>,
    workflows: BTreeMap<WorkflowId, WorkflowInstance>,
    activities: Vec<WorkflowActivity>,
}

impl State {
    fn check_invoice_unique(&self, invoice: &ShaInvoice) -> Result<(), PortError> {
        let taken = self.invoices.values().any(|i| {
            i.id == invoice.id || i.claim_id == invoice.claim_id || i.invoice_number == invoice.invoice_number
        });
        if taken {
            return Err(PortError::conflict(format!(
                "invoice for claim {} already exists",
                invoice.claim_id
            )));
        }
        Ok(())
    }

    fn replace_claim(&mut self, claim: &ShaClaim) -> Result<(), PortError> {
        match self.claims.get_mut(&claim.id) {
            Some(stored) => {
                *stored = claim.clone();
                Ok(())
            }
            None => Err(PortError::not_found("Claim", claim.id)),
        }
    }

    fn ensure_claim_status(&self, id: ClaimId, expected: ClaimStatus) -> Result<(), PortError> {
        let stored = self.claims.get(&id).ok_or_else(|| PortError::not_found("Claim", id))?;
        if stored.status != expected {
            return Err(PortError::conflict(format!(
                "claim {} is {}, expected {}",
                stored.claim_number, stored.status, expected
            )));
        }
        Ok(())
    }

    fn remove_invoice(&mut self, id: InvoiceId) {
        self.invoices.remove(&id);
        for tracking in self.payment_tracking.iter_mut().filter(|t| t.invoice_id == Some(id)) {
            tracking.invoice_id = None;
        }
        for workflow in self.workflows.values_mut().filter(|w| w.invoice_id == Some(id)) {
            workflow.invoice_id = None;
        }
    }
}

/// In-memory `ClaimStore` and `WorkflowStore` sharing one state
///
/// Workflow step effects are applied to the same claim, invoice and payment
/// tracking maps the claim store reads, as the PostgreSQL adapters do.
#[derive(Default)]
pub struct InMemoryClaimsDb {
    state: Mutex<State>,
}

impl InMemoryClaimsDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claims(&self) -> Vec<ShaClaim> {
        lock(&self.state).claims.values().cloned().collect()
    }

    pub fn invoices(&self) -> Vec<ShaInvoice> {
        lock(&self.state).invoices.values().cloned().collect()
    }

    pub fn batches(&self) -> Vec<ClaimBatch> {
        lock(&self.state).batches.values().cloned().collect()
    }

    pub fn submission_logs(&self) -> Vec<SubmissionLog> {
        lock(&self.state).submission_logs.clone()
    }

    pub fn payment_tracking(&self) -> Vec<PaymentTracking> {
        lock(&self.state).payment_tracking.clone()
    }

    /// Overwrites a stored claim, bypassing the service layer
    pub fn put_claim(&self, claim: ShaClaim) {
        lock(&self.state).claims.insert(claim.id, claim);
    }

    /// Overwrites a stored payment tracking row, bypassing the service layer
    pub fn put_payment_tracking(&self, tracking: PaymentTracking) {
        let mut state = lock(&self.state);
        state.payment_tracking.retain(|t| t.id != tracking.id);
        state.payment_tracking.push(tracking);
    }

    /// Bumps the stored version of a workflow, as a concurrent writer would
    pub fn touch_workflow(&self, id: WorkflowId) {
        if let Some(workflow) = lock(&self.state).workflows.get_mut(&id) {
            workflow.version += 1;
        }
    }
}

impl DomainPort for InMemoryClaimsDb {}

#[async_trait]
impl HealthCheckable for InMemoryClaimsDb {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("memory-claims-db")
    }
}

#[async_trait]
impl ClaimStore for InMemoryClaimsDb {
    async fn next_sequence(&self, kind: NumberKind, period: &str) -> Result<u32, PortError> {
        let mut state = lock(&self.state);
        let value = state.sequences.entry((kind, period.to_string())).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn insert_claim(&self, claim: &ShaClaim) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        if state.claims.values().any(|c| c.id == claim.id || c.claim_number == claim.claim_number) {
            return Err(PortError::conflict(format!("claim {} already exists", claim.claim_number)));
        }
        state.claims.insert(claim.id, claim.clone());
        Ok(())
    }

    async fn update_claim(&self, claim: &ShaClaim) -> Result<(), PortError> {
        lock(&self.state).replace_claim(claim)
    }

    async fn transition_claim(&self, claim: &ShaClaim, expected: ClaimStatus) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        state.ensure_claim_status(claim.id, expected)?;
        state.replace_claim(claim)
    }

    async fn save_rework(&self, claim: &ShaClaim, voided_invoice: Option<InvoiceId>) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        state.ensure_claim_status(claim.id, ClaimStatus::Rejected)?;
        if let Some(id) = voided_invoice {
            state.remove_invoice(id);
        }
        state.replace_claim(claim)
    }

    async fn delete_claim(&self, id: ClaimId) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        if state.claims.remove(&id).is_none() {
            return Err(PortError::not_found("Claim", id));
        }
        state.documents.retain(|d| d.claim_id != id);
        state.invoices.retain(|_, i| i.claim_id != id);
        state.submission_logs.retain(|l| l.claim_id != Some(id));
        state.payment_tracking.retain(|t| t.claim_id != id);
        let workflow_ids: Vec<WorkflowId> = state
            .workflows
            .values()
            .filter(|w| w.claim_id == id)
            .map(|w| w.id)
            .collect();
        state.workflows.retain(|_, w| w.claim_id != id);
        state.activities.retain(|a| !workflow_ids.contains(&a.workflow_id));
        Ok(())
    }

    async fn get_claim(&self, id: ClaimId) -> Result<Option<ShaClaim>, PortError> {
        Ok(lock(&self.state).claims.get(&id).cloned())
    }

    async fn list_claims(&self, filter: &ClaimFilter) -> Result<Vec<ShaClaim>, PortError> {
        let state = lock(&self.state);
        let mut claims: Vec<ShaClaim> = state.claims.values().filter(|c| filter.matches(c)).cloned().collect();
        claims.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(claims, filter.limit, filter.offset))
    }

    async fn find_batch_candidates(&self, selection: &BatchSelection) -> Result<Vec<ShaClaim>, PortError> {
        let state = lock(&self.state);
        Ok(state.claims.values().filter(|c| selection.matches(c)).cloned().collect())
    }

    async fn claims_in_batch(&self, batch_id: BatchId) -> Result<Vec<ShaClaim>, PortError> {
        let state = lock(&self.state);
        Ok(state
            .claims
            .values()
            .filter(|c| c.batch_id == Some(batch_id))
            .cloned()
            .collect())
    }

    async fn claims_awaiting_reconciliation(&self) -> Result<Vec<ShaClaim>, PortError> {
        let state = lock(&self.state);
        Ok(state
            .claims
            .values()
            .filter(|c| c.status == ClaimStatus::Submitted && c.sha_reference.is_some())
            .cloned()
            .collect())
    }

    async fn insert_document(&self, document: &DocumentAttachment) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        if !state.claims.contains_key(&document.claim_id) {
            return Err(PortError::validation(format!("claim {} does not exist", document.claim_id)));
        }
        state.documents.push(document.clone());
        Ok(())
    }

    async fn update_document(&self, document: &DocumentAttachment) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        let stored = state
            .documents
            .iter_mut()
            .find(|d| d.id == document.id)
            .ok_or_else(|| PortError::not_found("Document", document.id))?;
        *stored = document.clone();
        Ok(())
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<DocumentAttachment>, PortError> {
        Ok(lock(&self.state).documents.iter().find(|d| d.id == id).cloned())
    }

    async fn list_documents(&self, claim_id: ClaimId) -> Result<Vec<DocumentAttachment>, PortError> {
        let state = lock(&self.state);
        Ok(state.documents.iter().filter(|d| d.claim_id == claim_id).cloned().collect())
    }

    async fn delete_document(&self, id: DocumentId) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        let before = state.documents.len();
        state.documents.retain(|d| d.id != id);
        if state.documents.len() == before {
            return Err(PortError::not_found("Document", id));
        }
        Ok(())
    }

    async fn insert_invoice(&self, invoice: &ShaInvoice) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        state.check_invoice_unique(invoice)?;
        state.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn update_invoice(&self, invoice: &ShaInvoice) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        match state.invoices.get_mut(&invoice.id) {
            Some(stored) => {
                *stored = invoice.clone();
                Ok(())
            }
            None => Err(PortError::not_found("Invoice", invoice.id)),
        }
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<ShaInvoice>, PortError> {
        Ok(lock(&self.state).invoices.get(&id).cloned())
    }

    async fn invoice_for_claim(&self, claim_id: ClaimId) -> Result<Option<ShaInvoice>, PortError> {
        let state = lock(&self.state);
        Ok(state.invoices.values().find(|i| i.claim_id == claim_id).cloned())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<ShaInvoice>, PortError> {
        let state = lock(&self.state);
        let mut invoices: Vec<ShaInvoice> = state.invoices.values().filter(|i| filter.matches(i)).cloned().collect();
        invoices.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(page(invoices, filter.limit, filter.offset))
    }

    async fn create_batch(&self, batch: &ClaimBatch, claim_ids: &[ClaimId]) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        let all_free = claim_ids
            .iter()
            .all(|id| state.claims.get(id).is_some_and(|c| c.batch_id.is_none()));
        if !all_free {
            return Err(PortError::conflict(format!(
                "claims for batch {} are no longer available",
                batch.batch_number
            )));
        }
        for id in claim_ids {
            if let Some(claim) = state.claims.get_mut(id) {
                claim.batch_id = Some(batch.id);
                claim.updated_at = batch.created_at;
            }
        }
        state.batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn update_batch(&self, batch: &ClaimBatch) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        match state.batches.get_mut(&batch.id) {
            Some(stored) => {
                *stored = batch.clone();
                Ok(())
            }
            None => Err(PortError::not_found("Batch", batch.id)),
        }
    }

    async fn get_batch(&self, id: BatchId) -> Result<Option<ClaimBatch>, PortError> {
        Ok(lock(&self.state).batches.get(&id).cloned())
    }

    async fn list_batches(&self, status: Option<BatchStatus>) -> Result<Vec<ClaimBatch>, PortError> {
        let state = lock(&self.state);
        let mut batches: Vec<ClaimBatch> = state
            .batches
            .values()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        batches.sort_by(|a, b| b.batch_date.cmp(&a.batch_date).then(b.created_at.cmp(&a.created_at)));
        Ok(batches)
    }

    async fn delete_batch(&self, id: BatchId) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        if state.batches.remove(&id).is_none() {
            return Err(PortError::not_found("Batch", id));
        }
        for claim in state.claims.values_mut().filter(|c| c.batch_id == Some(id)) {
            claim.batch_id = None;
        }
        Ok(())
    }

    async fn save_batch_submission(&self, batch: &ClaimBatch, claims: &[ShaClaim]) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        let stored = state.batches.get(&batch.id).ok_or_else(|| PortError::not_found("Batch", batch.id))?;
        if stored.status != BatchStatus::Draft {
            return Err(PortError::conflict(format!(
                "batch {} is {}, expected draft",
                stored.batch_number, stored.status
            )));
        }
        for claim in claims {
            state.ensure_claim_status(claim.id, ClaimStatus::ReadyToSubmit)?;
        }
        state.batches.insert(batch.id, batch.clone());
        for claim in claims {
            state.claims.insert(claim.id, claim.clone());
        }
        Ok(())
    }

    async fn insert_submission_log(&self, log: &SubmissionLog) -> Result<(), PortError> {
        lock(&self.state).submission_logs.push(log.clone());
        Ok(())
    }

    async fn update_submission_log(&self, log: &SubmissionLog) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        if let Some(stored) = state.submission_logs.iter_mut().find(|l| l.id == log.id) {
            *stored = log.clone();
        }
        Ok(())
    }

    async fn due_payment_checks(&self, now: DateTime<Utc>) -> Result<Vec<PaymentTracking>, PortError> {
        let state = lock(&self.state);
        Ok(state.payment_tracking.iter().filter(|t| t.is_due(now)).cloned().collect())
    }

    async fn update_payment_tracking(&self, tracking: &PaymentTracking) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        if let Some(stored) = state.payment_tracking.iter_mut().find(|t| t.id == tracking.id) {
            *stored = tracking.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for InMemoryClaimsDb {
    async fn insert_workflow(
        &self,
        workflow: &WorkflowInstance,
        activities: &[WorkflowActivity],
    ) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        let active_exists = state
            .workflows
            .values()
            .any(|w| w.claim_id == workflow.claim_id && w.is_active());
        if active_exists {
            return Err(PortError::conflict(format!(
                "claim {} already has an active workflow",
                workflow.claim_id
            )));
        }
        state.workflows.insert(workflow.id, workflow.clone());
        state.activities.extend_from_slice(activities);
        Ok(())
    }

    async fn save_transition(
        &self,
        workflow: &WorkflowInstance,
        activities: &[WorkflowActivity],
        effects: &[StepEffect],
    ) -> Result<(), PortError> {
        let mut state = lock(&self.state);
        let stored_version = state
            .workflows
            .get(&workflow.id)
            .map(|w| w.version)
            .ok_or_else(|| PortError::not_found("Workflow", workflow.id))?;
        if stored_version != workflow.version {
            return Err(PortError::conflict(format!(
                "workflow {} is no longer at version {}",
                workflow.id, workflow.version
            )));
        }

        // Validate every effect before applying any of them
        for effect in effects {
            match effect {
                StepEffect::UpdateClaim(claim) if !state.claims.contains_key(&claim.id) => {
                    return Err(PortError::not_found("Claim", claim.id));
                }
                StepEffect::InsertInvoice(invoice) => state.check_invoice_unique(invoice)?,
                _ => {}
            }
        }
        for effect in effects {
            match effect {
                StepEffect::UpdateClaim(claim) => state.replace_claim(claim)?,
                StepEffect::InsertInvoice(invoice) => {
                    state.invoices.insert(invoice.id, invoice.clone());
                }
                StepEffect::InsertPaymentTracking(tracking) => state.payment_tracking.push(tracking.clone()),
            }
        }

        let mut saved = workflow.clone();
        saved.version += 1;
        state.workflows.insert(saved.id, saved);
        state.activities.extend_from_slice(activities);
        Ok(())
    }

    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<WorkflowInstance>, PortError> {
        Ok(lock(&self.state).workflows.get(&id).cloned())
    }

    async fn active_workflow_for_claim(&self, claim_id: ClaimId) -> Result<Option<WorkflowInstance>, PortError> {
        let state = lock(&self.state);
        Ok(state
            .workflows
            .values()
            .find(|w| w.claim_id == claim_id && w.is_active())
            .cloned())
    }

    async fn list_workflows(&self, filter: &WorkflowFilter) -> Result<Vec<WorkflowInstance>, PortError> {
        let state = lock(&self.state);
        let mut workflows: Vec<WorkflowInstance> =
            state.workflows.values().filter(|w| filter.matches(w)).cloned().collect();
        workflows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(page(workflows, filter.limit, filter.offset))
    }

    async fn list_activity(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowActivity>, PortError> {
        let state = lock(&self.state);
        Ok(state
            .activities
            .iter()
            .filter(|a| a.workflow_id == workflow_id)
            .cloned()
            .collect())
    }
}

fn page<T>(items: Vec<T>, limit: Option<u32>, offset: Option<u32>) -> Vec<T> {
    let offset = offset.unwrap_or(0) as usize;
    let limit = limit.map_or(usize::MAX, |l| l as usize);
    items.into_iter().skip(offset).take(limit).collect()
}
