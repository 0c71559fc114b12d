//! Claims, documents, invoices, batches and SHA submission

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use core_kernel::{BatchId, ClaimId, Currency, DocumentId, InvoiceId, UserId};

use crate::batch::{BatchSelection, BatchStatus, ClaimBatch, NewBatch};
use crate::claim::{ClaimStatus, ClaimUpdate, NewClaim, ShaClaim};
use crate::document::{ComplianceReport, DocumentAttachment, DocumentChecklist, DocumentType};
use crate::error::ClaimError;
use crate::invoice::{InvoiceStatus, ShaInvoice};
use crate::numbering::NumberKind;
use crate::ports::{ClaimFilter, ClaimStore, InvoiceFilter, ShaGateway};
use crate::reconciliation::{apply_sha_status, ReconciliationSummary};
use crate::statistics::BatchStatistics;
use crate::submission::{ShaBatchPayload, ShaClaimPayload, SubmissionLog, SubmissionType};

/// Input for attaching a document to a claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub document_type: DocumentType,
    pub file_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_required: bool,
}

/// Application service for the claim lifecycle outside the workflow engine
pub struct ClaimsService {
    store: Arc<dyn ClaimStore>,
    gateway: Arc<dyn ShaGateway>,
}

impl ClaimsService {
    pub fn new(store: Arc<dyn ClaimStore>, gateway: Arc<dyn ShaGateway>) -> Self {
        Self { store, gateway }
    }

    pub fn store(&self) -> &Arc<dyn ClaimStore> {
        &self.store
    }

    async fn next_number(&self, kind: NumberKind, date: NaiveDate) -> Result<String, ClaimError> {
        let sequence = self.store.next_sequence(kind, &kind.period(date)).await?;
        Ok(kind.format(date, sequence))
    }

    // ---- claims ----

    #[instrument(skip(self, input), fields(patient_id = %input.patient_id))]
    pub async fn create_claim(&self, input: NewClaim) -> Result<ShaClaim, ClaimError> {
        input.validate()?;
        let now = Utc::now();
        let claim_number = self.next_number(NumberKind::Claim, now.date_naive()).await?;
        let claim = ShaClaim::create(input, claim_number, now)?;
        self.store.insert_claim(&claim).await?;
        info!(claim_id = %claim.id, claim_number = %claim.claim_number, "SHA claim created");
        Ok(claim)
    }

    pub async fn get_claim(&self, id: ClaimId) -> Result<ShaClaim, ClaimError> {
        self.store
            .get_claim(id)
            .await?
            .ok_or_else(|| ClaimError::not_found("Claim", id))
    }

    pub async fn list_claims(&self, filter: &ClaimFilter) -> Result<Vec<ShaClaim>, ClaimError> {
        Ok(self.store.list_claims(filter).await?)
    }

    /// Edits the amount or notes of a claim
    #[instrument(skip(self, update))]
    pub async fn update_claim(&self, id: ClaimId, update: ClaimUpdate) -> Result<ShaClaim, ClaimError> {
        if update.is_empty() {
            return Err(ClaimError::validation("no fields to update"));
        }
        let mut claim = self.get_claim(id).await?;
        let expected = claim.status;
        claim.apply_update(update, Utc::now())?;
        self.store.transition_claim(&claim, expected).await?;
        Ok(claim)
    }

    /// Sends a rejected claim back to draft and voids its invoice so a
    /// corrected one can be generated
    #[instrument(skip(self))]
    pub async fn rework_claim(&self, id: ClaimId, requested_by: &str) -> Result<ShaClaim, ClaimError> {
        let mut claim = self.get_claim(id).await?;
        claim.rework(Utc::now())?;
        let voided = self.store.invoice_for_claim(id).await?.map(|invoice| invoice.id);
        self.store.save_rework(&claim, voided).await?;
        info!(
            claim_number = %claim.claim_number,
            requested_by,
            invoice_voided = voided.is_some(),
            "rejected claim returned to draft"
        );
        Ok(claim)
    }

    pub async fn delete_claim(&self, id: ClaimId) -> Result<(), ClaimError> {
        let claim = self.get_claim(id).await?;
        claim.ensure_deletable()?;
        self.store.delete_claim(id).await?;
        info!(claim_number = %claim.claim_number, "SHA claim deleted");
        Ok(())
    }

    // ---- documents ----

    pub async fn add_document(
        &self,
        claim_id: ClaimId,
        input: NewDocument,
        uploaded_by: UserId,
    ) -> Result<DocumentAttachment, ClaimError> {
        self.get_claim(claim_id).await?;
        if input.file_name.trim().is_empty() {
            return Err(ClaimError::validation("file name is required"));
        }
        let mut document = DocumentAttachment::new(
            claim_id,
            input.document_type,
            input.file_name,
            input.is_required,
            uploaded_by,
            Utc::now(),
        );
        document.description = input.description;
        self.store.insert_document(&document).await?;
        Ok(document)
    }

    pub async fn verify_document(
        &self,
        claim_id: ClaimId,
        document_id: DocumentId,
        verified_by: UserId,
    ) -> Result<DocumentAttachment, ClaimError> {
        let mut document = self
            .store
            .get_document(document_id)
            .await?
            .filter(|d| d.claim_id == claim_id)
            .ok_or_else(|| ClaimError::not_found("Document", document_id))?;
        document.verify(verified_by, Utc::now());
        self.store.update_document(&document).await?;
        Ok(document)
    }

    pub async fn list_documents(&self, claim_id: ClaimId) -> Result<Vec<DocumentAttachment>, ClaimError> {
        Ok(self.store.list_documents(claim_id).await?)
    }

    pub async fn delete_document(&self, claim_id: ClaimId, document_id: DocumentId) -> Result<(), ClaimError> {
        self.store
            .get_document(document_id)
            .await?
            .filter(|d| d.claim_id == claim_id)
            .ok_or_else(|| ClaimError::not_found("Document", document_id))?;
        self.store.delete_document(document_id).await?;
        Ok(())
    }

    /// Required documents for the claim and how far along they are
    pub async fn document_checklist(&self, claim_id: ClaimId) -> Result<DocumentChecklist, ClaimError> {
        let claim = self.get_claim(claim_id).await?;
        let documents = self.store.list_documents(claim_id).await?;
        Ok(DocumentChecklist::build(&claim, &documents))
    }

    pub async fn compliance_report(&self, claim_id: ClaimId) -> Result<ComplianceReport, ClaimError> {
        let documents = self.store.list_documents(claim_id).await?;
        Ok(ComplianceReport::from_documents(&documents))
    }

    // ---- invoices ----

    /// Builds a numbered invoice for the claim without persisting it
    pub async fn prepare_invoice(&self, claim: &ShaClaim, generated_by: &str) -> Result<ShaInvoice, ClaimError> {
        if let Some(existing) = self.store.invoice_for_claim(claim.id).await? {
            return Err(ClaimError::InvoiceExists(existing.invoice_number));
        }
        // Check before consuming a sequence number
        if claim.compliance_status != crate::claim::ComplianceStatus::Verified {
            return Err(ClaimError::ComplianceNotVerified);
        }
        let now = Utc::now();
        let number = self.next_number(NumberKind::Invoice, now.date_naive()).await?;
        ShaInvoice::from_claim(claim, number, generated_by, now)
    }

    #[instrument(skip(self))]
    pub async fn generate_invoice(&self, claim_id: ClaimId, generated_by: &str) -> Result<ShaInvoice, ClaimError> {
        let claim = self.get_claim(claim_id).await?;
        let invoice = self.prepare_invoice(&claim, generated_by).await?;
        self.store.insert_invoice(&invoice).await?;
        info!(invoice_number = %invoice.invoice_number, "SHA invoice generated");
        Ok(invoice)
    }

    pub async fn get_invoice(&self, id: InvoiceId) -> Result<ShaInvoice, ClaimError> {
        self.store
            .get_invoice(id)
            .await?
            .ok_or_else(|| ClaimError::not_found("Invoice", id))
    }

    pub async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<ShaInvoice>, ClaimError> {
        Ok(self.store.list_invoices(filter).await?)
    }

    /// Marks the invoice printed and makes its claim ready to submit
    pub async fn print_invoice(&self, id: InvoiceId, printed_by: &str) -> Result<ShaInvoice, ClaimError> {
        let mut invoice = self.get_invoice(id).await?;
        let now = Utc::now();
        invoice.mark_printed(printed_by, now)?;
        self.store.update_invoice(&invoice).await?;

        let mut claim = self.get_claim(invoice.claim_id).await?;
        if claim.status == ClaimStatus::Draft {
            claim.transition_to(ClaimStatus::ReadyToSubmit, now)?;
            self.store.update_claim(&claim).await?;
        }
        Ok(invoice)
    }

    // ---- batches ----

    #[instrument(skip(self, input), fields(batch_type = %input.batch_type))]
    pub async fn create_batch(&self, input: NewBatch) -> Result<(ClaimBatch, Vec<ShaClaim>), ClaimError> {
        let now = Utc::now();
        let selection = BatchSelection::for_batch(input.batch_type, input.batch_date, input.claim_ids.clone(), now);
        let claims: Vec<ShaClaim> = self
            .store
            .find_batch_candidates(&selection)
            .await?
            .into_iter()
            .filter(|c| selection.matches(c))
            .collect();
        if claims.is_empty() {
            return Err(ClaimError::EmptyBatch);
        }

        let number = self.next_number(NumberKind::Batch, input.batch_date).await?;
        let batch = ClaimBatch::create(number, &input, &claims, now)?;
        let ids: Vec<ClaimId> = claims.iter().map(|c| c.id).collect();
        self.store.create_batch(&batch, &ids).await?;

        info!(batch_number = %batch.batch_number, total_claims = batch.total_claims, "SHA batch created");
        let claims = claims
            .into_iter()
            .map(|mut c| {
                c.batch_id = Some(batch.id);
                c
            })
            .collect();
        Ok((batch, claims))
    }

    pub async fn get_batch(&self, id: BatchId) -> Result<ClaimBatch, ClaimError> {
        self.store
            .get_batch(id)
            .await?
            .ok_or_else(|| ClaimError::not_found("Batch", id))
    }

    pub async fn batch_claims(&self, id: BatchId) -> Result<Vec<ShaClaim>, ClaimError> {
        Ok(self.store.claims_in_batch(id).await?)
    }

    pub async fn list_batches(&self, status: Option<BatchStatus>) -> Result<Vec<ClaimBatch>, ClaimError> {
        Ok(self.store.list_batches(status).await?)
    }

    /// Counts and totals over batches dated within the range
    pub async fn batch_statistics(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<BatchStatistics, ClaimError> {
        let batches: Vec<ClaimBatch> = self
            .store
            .list_batches(None)
            .await?
            .into_iter()
            .filter(|b| from.map_or(true, |from| b.batch_date >= from))
            .filter(|b| to.map_or(true, |to| b.batch_date <= to))
            .collect();
        Ok(BatchStatistics::from_batches(&batches, Currency::KES))
    }

    pub async fn delete_batch(&self, id: BatchId) -> Result<(), ClaimError> {
        let batch = self.get_batch(id).await?;
        batch.ensure_draft()?;
        self.store.delete_batch(id).await?;
        info!(batch_number = %batch.batch_number, "SHA batch deleted");
        Ok(())
    }

    /// Marks the batch and every generated invoice in it as printed
    pub async fn mark_batch_printed(&self, id: BatchId, printed_by: &str) -> Result<ClaimBatch, ClaimError> {
        let mut batch = self.get_batch(id).await?;
        let now = Utc::now();
        for claim in self.store.claims_in_batch(id).await? {
            let Some(mut invoice) = self.store.invoice_for_claim(claim.id).await? else {
                continue;
            };
            if invoice.status == InvoiceStatus::Generated {
                invoice.mark_printed(printed_by, now)?;
                self.store.update_invoice(&invoice).await?;
            }
        }
        batch.mark_printed(printed_by, now);
        self.store.update_batch(&batch).await?;
        Ok(batch)
    }

    // ---- SHA submission ----

    /// Submits one claim to SHA, recording the attempt
    #[instrument(skip(self))]
    pub async fn submit_single_claim(&self, claim_id: ClaimId, retry_count: u32) -> Result<ShaClaim, ClaimError> {
        let mut claim = self.get_claim(claim_id).await?;
        if claim.status != ClaimStatus::ReadyToSubmit {
            return Err(ClaimError::InvalidStatusTransition {
                from: claim.status.to_string(),
                to: ClaimStatus::Submitted.to_string(),
            });
        }
        if let Some(batch_id) = claim.batch_id {
            return Err(ClaimError::ClaimInBatch {
                claim_number: claim.claim_number,
                batch_id: batch_id.to_string(),
            });
        }

        let payload = ShaClaimPayload::from_claim(&claim, self.gateway.provider_code());
        let request = serde_json::to_value(&payload).unwrap_or_default();
        let mut log = SubmissionLog::pending(
            SubmissionType::Single,
            Some(claim.id),
            None,
            request,
            retry_count,
            Utc::now(),
        );
        self.store.insert_submission_log(&log).await?;

        match self.gateway.submit_claim(&payload).await {
            Ok(response) => {
                let now = Utc::now();
                log.succeed(serde_json::to_value(&response).unwrap_or_default(), now);
                self.store.update_submission_log(&log).await?;

                claim.mark_submitted(response.claim_reference(), now)?;
                self.store.transition_claim(&claim, ClaimStatus::ReadyToSubmit).await?;
                self.mark_invoice_submitted(claim.id, now).await?;
                info!(claim_number = %claim.claim_number, reference = ?claim.sha_reference, "claim submitted to SHA");
                Ok(claim)
            }
            Err(error) => {
                warn!(claim_number = %claim.claim_number, error = %error, "SHA claim submission failed");
                log.fail(error.to_string(), Utc::now());
                self.store.update_submission_log(&log).await?;
                Err(error.into())
            }
        }
    }

    /// Submits a draft batch to SHA, recording the attempt
    #[instrument(skip(self))]
    pub async fn submit_batch(&self, batch_id: BatchId, retry_count: u32) -> Result<ClaimBatch, ClaimError> {
        let mut batch = self.get_batch(batch_id).await?;
        batch.ensure_draft()?;
        let mut claims = Vec::new();
        for claim in self.store.claims_in_batch(batch_id).await? {
            if claim.status == ClaimStatus::ReadyToSubmit {
                claims.push(claim);
            } else {
                warn!(claim_number = %claim.claim_number, status = %claim.status, "skipping claim not ready for submission");
            }
        }
        if claims.is_empty() {
            return Err(ClaimError::EmptyBatch);
        }

        let payload = ShaBatchPayload::from_batch(&batch, &claims, self.gateway.provider_code());
        let request = serde_json::to_value(&payload).unwrap_or_default();
        let mut log = SubmissionLog::pending(
            SubmissionType::Batch,
            None,
            Some(batch.id),
            request,
            retry_count,
            Utc::now(),
        );
        self.store.insert_submission_log(&log).await?;

        let response = match self.gateway.submit_batch(&payload).await {
            Ok(response) => response,
            Err(error) => {
                warn!(batch_number = %batch.batch_number, error = %error, "SHA batch submission failed");
                log.fail(error.to_string(), Utc::now());
                self.store.update_submission_log(&log).await?;
                return Err(error.into());
            }
        };

        let now = Utc::now();
        log.succeed(serde_json::to_value(&response).unwrap_or_default(), now);
        self.store.update_submission_log(&log).await?;

        batch.mark_submitted(response.batch_reference(), now)?;
        let mut submitted = claims;
        for claim in &mut submitted {
            claim.mark_submitted(None, now)?;
        }
        self.store.save_batch_submission(&batch, &submitted).await?;
        for claim in &submitted {
            self.mark_invoice_submitted(claim.id, now).await?;
        }

        info!(batch_number = %batch.batch_number, claims = submitted.len(), "batch submitted to SHA");
        Ok(batch)
    }

    async fn mark_invoice_submitted(&self, claim_id: ClaimId, now: DateTime<Utc>) -> Result<(), ClaimError> {
        if let Some(mut invoice) = self.store.invoice_for_claim(claim_id).await? {
            if invoice.status == InvoiceStatus::Printed {
                invoice.mark_submitted(now)?;
                self.store.update_invoice(&invoice).await?;
            }
        }
        Ok(())
    }

    // ---- reconciliation ----

    /// Checks every submitted claim and batch against SHA
    #[instrument(skip(self))]
    pub async fn reconcile_claims(&self) -> Result<ReconciliationSummary, ClaimError> {
        let mut summary = ReconciliationSummary::default();

        for mut claim in self.store.claims_awaiting_reconciliation().await? {
            summary.checked += 1;
            match self.reconcile_claim(&mut claim).await {
                Ok(true) => summary.updated += 1,
                Ok(false) => {}
                Err(error) => {
                    summary.failed += 1;
                    warn!(claim_number = %claim.claim_number, error = %error, "claim reconciliation failed");
                }
            }
        }

        self.reconcile_batches().await?;
        info!(checked = summary.checked, updated = summary.updated, failed = summary.failed, "claims reconciliation finished");
        Ok(summary)
    }

    async fn reconcile_claim(&self, claim: &mut ShaClaim) -> Result<bool, ClaimError> {
        let reference = claim
            .sha_reference
            .clone()
            .ok_or_else(|| ClaimError::MissingReference(claim.claim_number.clone()))?;
        let response = self.gateway.claim_status(&reference).await?;
        let changed = apply_sha_status(claim, &response, Utc::now());
        self.store.update_claim(claim).await?;
        if changed && claim.status.is_settled() {
            self.settle_invoice(claim).await?;
        }
        Ok(changed)
    }

    /// Carries a paid or rejected outcome onto the claim's submitted invoice
    async fn settle_invoice(&self, claim: &ShaClaim) -> Result<(), ClaimError> {
        let Some(mut invoice) = self.store.invoice_for_claim(claim.id).await? else {
            return Ok(());
        };
        if invoice.status != InvoiceStatus::Submitted {
            return Ok(());
        }
        match claim.status {
            ClaimStatus::Paid => invoice.mark_paid()?,
            ClaimStatus::Rejected => invoice.mark_rejected()?,
            _ => return Ok(()),
        }
        self.store.update_invoice(&invoice).await?;
        info!(invoice_number = %invoice.invoice_number, status = %invoice.status, "invoice settled");
        Ok(())
    }

    async fn reconcile_batches(&self) -> Result<(), ClaimError> {
        for mut batch in self.store.list_batches(Some(BatchStatus::Submitted)).await? {
            let Some(reference) = batch.sha_batch_reference.clone() else {
                continue;
            };
            let response = match self.gateway.batch_status(&reference).await {
                Ok(response) => response,
                Err(error) => {
                    warn!(batch_number = %batch.batch_number, error = %error, "batch status check failed");
                    continue;
                }
            };
            let status = match response.status.to_ascii_lowercase().as_str() {
                "completed" | "processed" | "paid" => BatchStatus::Completed,
                "failed" | "rejected" => BatchStatus::Failed,
                _ => continue,
            };
            batch.status = status;
            batch.updated_at = Utc::now();
            self.store.update_batch(&batch).await?;
            info!(batch_number = %batch.batch_number, status = %status, "batch reconciled");
        }
        Ok(())
    }

    /// Re-checks claims whose payment tracking check is due
    #[instrument(skip(self))]
    pub async fn run_payment_checks(&self, now: DateTime<Utc>) -> Result<ReconciliationSummary, ClaimError> {
        let mut summary = ReconciliationSummary::default();

        for mut tracking in self.store.due_payment_checks(now).await? {
            summary.checked += 1;
            let mut claim = match self.get_claim(tracking.claim_id).await {
                Ok(claim) => claim,
                Err(error) => {
                    summary.failed += 1;
                    warn!(claim_id = %tracking.claim_id, error = %error, "payment check skipped");
                    continue;
                }
            };

            if claim.sha_reference.is_some() && !claim.status.is_settled() {
                match self.reconcile_claim(&mut claim).await {
                    Ok(true) => summary.updated += 1,
                    Ok(false) => {}
                    Err(error) => {
                        summary.failed += 1;
                        warn!(claim_number = %claim.claim_number, error = %error, "payment check failed");
                    }
                }
            }

            tracking.record_check(&claim, now);
            self.store.update_payment_tracking(&tracking).await?;
        }
        Ok(summary)
    }
}
