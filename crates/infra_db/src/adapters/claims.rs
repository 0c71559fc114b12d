//! PostgreSQL Claims Adapter
//!
//! Implements the claims domain's `ClaimStore` port on top of the
//! [`ClaimsRepository`], translating between domain types and row types.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PgClaimStore;
//! use domain_claims::ClaimsService;
//!
//! let store = Arc::new(PgClaimStore::new(pool.clone()));
//! let service = ClaimsService::new(store, gateway);
//! ```

use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    AdapterHealth, BatchId, ClaimId, Currency, DocumentId, DomainPort, HealthCheckResult, HealthCheckable,
    InvoiceId, Money, PortError,
};
use domain_claims::{
    BatchSelection, BatchStatus, ClaimBatch, ClaimFilter, ClaimStatus, ClaimStore, Diagnosis,
    DocumentAttachment, InvoiceFilter, NumberKind, PaymentTracking, ShaClaim, ShaInvoice, SubmissionLog,
};

use crate::error::DatabaseError;
use crate::repositories::claims::{
    BatchRow, ClaimQuery, ClaimRow, ClaimsRepository, DocumentRow, InvoiceQuery, InvoiceRow,
    PaymentTrackingRow, SubmissionLogRow,
};

/// Page size used when a listing does not ask for one
const DEFAULT_LIMIT: i64 = 100;

/// PostgreSQL-backed implementation of `ClaimStore`
#[derive(Debug, Clone)]
pub struct PgClaimStore {
    repository: ClaimsRepository,
    pool: PgPool,
}

impl PgClaimStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: ClaimsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &ClaimsRepository {
        &self.repository
    }
}

impl DomainPort for PgClaimStore {}

#[async_trait]
impl HealthCheckable for PgClaimStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-claims-adapter").await
    }
}

#[async_trait]
impl ClaimStore for PgClaimStore {
    async fn next_sequence(&self, kind: NumberKind, period: &str) -> Result<u32, PortError> {
        let value = self.repository.next_sequence(kind.as_str(), period).await?;
        Ok(to_u32(value, "number_sequences.value")?)
    }

    #[instrument(skip(self, claim), fields(claim_number = %claim.claim_number))]
    async fn insert_claim(&self, claim: &ShaClaim) -> Result<(), PortError> {
        ClaimsRepository::insert_claim(&self.pool, &claim_to_row(claim)?).await?;
        Ok(())
    }

    async fn update_claim(&self, claim: &ShaClaim) -> Result<(), PortError> {
        ClaimsRepository::update_claim(&self.pool, &claim_to_row(claim)?).await?;
        Ok(())
    }

    async fn transition_claim(&self, claim: &ShaClaim, expected: ClaimStatus) -> Result<(), PortError> {
        ClaimsRepository::transition_claim(&self.pool, &claim_to_row(claim)?, expected.as_str()).await?;
        Ok(())
    }

    #[instrument(skip(self, claim), fields(claim_number = %claim.claim_number))]
    async fn save_rework(&self, claim: &ShaClaim, voided_invoice: Option<InvoiceId>) -> Result<(), PortError> {
        self.repository
            .save_rework(&claim_to_row(claim)?, voided_invoice.map(Uuid::from))
            .await?;
        Ok(())
    }

    async fn delete_claim(&self, id: ClaimId) -> Result<(), PortError> {
        self.repository.delete_claim(id.into()).await?;
        Ok(())
    }

    async fn get_claim(&self, id: ClaimId) -> Result<Option<ShaClaim>, PortError> {
        let row = self.repository.get_claim(id.into()).await?;
        Ok(row.map(row_to_claim).transpose()?)
    }

    async fn list_claims(&self, filter: &ClaimFilter) -> Result<Vec<ShaClaim>, PortError> {
        let query = ClaimQuery {
            status: filter.status.map(|s| s.as_str().to_string()),
            patient_id: filter.patient_id.map(Uuid::from),
            limit: filter.limit.map_or(DEFAULT_LIMIT, i64::from),
            offset: filter.offset.map_or(0, i64::from),
        };
        let rows = self.repository.list_claims(&query).await?;
        Ok(rows.into_iter().map(row_to_claim).collect::<Result<_, _>>()?)
    }

    #[instrument(skip(self, selection))]
    async fn find_batch_candidates(&self, selection: &BatchSelection) -> Result<Vec<ShaClaim>, PortError> {
        let rows = match selection {
            BatchSelection::CreatedBetween { from, to } => {
                self.repository.batch_candidates_between(*from, *to).await?
            }
            BatchSelection::Explicit(ids) => {
                let ids: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
                self.repository.batch_candidates_in(&ids).await?
            }
        };
        debug!(candidates = rows.len(), "Found batch candidates");
        Ok(rows.into_iter().map(row_to_claim).collect::<Result<_, _>>()?)
    }

    async fn claims_in_batch(&self, batch_id: BatchId) -> Result<Vec<ShaClaim>, PortError> {
        let rows = self.repository.claims_in_batch(batch_id.into()).await?;
        Ok(rows.into_iter().map(row_to_claim).collect::<Result<_, _>>()?)
    }

    async fn claims_awaiting_reconciliation(&self) -> Result<Vec<ShaClaim>, PortError> {
        let rows = self.repository.claims_awaiting_reconciliation().await?;
        Ok(rows.into_iter().map(row_to_claim).collect::<Result<_, _>>()?)
    }

    async fn insert_document(&self, document: &DocumentAttachment) -> Result<(), PortError> {
        self.repository.insert_document(&document_to_row(document)).await?;
        Ok(())
    }

    async fn update_document(&self, document: &DocumentAttachment) -> Result<(), PortError> {
        self.repository.update_document(&document_to_row(document)).await?;
        Ok(())
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<DocumentAttachment>, PortError> {
        let row = self.repository.get_document(id.into()).await?;
        Ok(row.map(row_to_document).transpose()?)
    }

    async fn list_documents(&self, claim_id: ClaimId) -> Result<Vec<DocumentAttachment>, PortError> {
        let rows = self.repository.list_documents(claim_id.into()).await?;
        Ok(rows.into_iter().map(row_to_document).collect::<Result<_, _>>()?)
    }

    async fn delete_document(&self, id: DocumentId) -> Result<(), PortError> {
        self.repository.delete_document(id.into()).await?;
        Ok(())
    }

    async fn insert_invoice(&self, invoice: &ShaInvoice) -> Result<(), PortError> {
        ClaimsRepository::insert_invoice(&self.pool, &invoice_to_row(invoice)?).await?;
        Ok(())
    }

    async fn update_invoice(&self, invoice: &ShaInvoice) -> Result<(), PortError> {
        self.repository.update_invoice(&invoice_to_row(invoice)?).await?;
        Ok(())
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<ShaInvoice>, PortError> {
        let row = self.repository.get_invoice(id.into()).await?;
        Ok(row.map(row_to_invoice).transpose()?)
    }

    async fn invoice_for_claim(&self, claim_id: ClaimId) -> Result<Option<ShaInvoice>, PortError> {
        let row = self.repository.invoice_for_claim(claim_id.into()).await?;
        Ok(row.map(row_to_invoice).transpose()?)
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<ShaInvoice>, PortError> {
        let query = InvoiceQuery {
            status: filter.status.map(|s| s.as_str().to_string()),
            from: filter.from,
            to: filter.to,
            search: filter.search.clone(),
            limit: filter.limit.map_or(DEFAULT_LIMIT, i64::from),
            offset: filter.offset.map_or(0, i64::from),
        };
        let rows = self.repository.list_invoices(&query).await?;
        Ok(rows.into_iter().map(row_to_invoice).collect::<Result<_, _>>()?)
    }

    #[instrument(skip(self, batch, claim_ids), fields(batch_number = %batch.batch_number, claims = claim_ids.len()))]
    async fn create_batch(&self, batch: &ClaimBatch, claim_ids: &[ClaimId]) -> Result<(), PortError> {
        let ids: Vec<Uuid> = claim_ids.iter().copied().map(Uuid::from).collect();
        self.repository.create_batch(&batch_to_row(batch)?, &ids).await?;
        Ok(())
    }

    async fn update_batch(&self, batch: &ClaimBatch) -> Result<(), PortError> {
        ClaimsRepository::update_batch(&self.pool, &batch_to_row(batch)?).await?;
        Ok(())
    }

    async fn get_batch(&self, id: BatchId) -> Result<Option<ClaimBatch>, PortError> {
        let row = self.repository.get_batch(id.into()).await?;
        Ok(row.map(row_to_batch).transpose()?)
    }

    async fn list_batches(&self, status: Option<BatchStatus>) -> Result<Vec<ClaimBatch>, PortError> {
        let rows = self.repository.list_batches(status.as_ref().map(BatchStatus::as_str)).await?;
        Ok(rows.into_iter().map(row_to_batch).collect::<Result<_, _>>()?)
    }

    async fn delete_batch(&self, id: BatchId) -> Result<(), PortError> {
        self.repository.delete_batch(id.into()).await?;
        Ok(())
    }

    async fn save_batch_submission(&self, batch: &ClaimBatch, claims: &[ShaClaim]) -> Result<(), PortError> {
        let claim_rows = claims.iter().map(claim_to_row).collect::<Result<Vec<_>, _>>()?;
        self.repository.save_batch_submission(&batch_to_row(batch)?, &claim_rows).await?;
        Ok(())
    }

    async fn insert_submission_log(&self, log: &SubmissionLog) -> Result<(), PortError> {
        self.repository.insert_submission_log(&submission_log_to_row(log)?).await?;
        Ok(())
    }

    async fn update_submission_log(&self, log: &SubmissionLog) -> Result<(), PortError> {
        self.repository.update_submission_log(&submission_log_to_row(log)?).await?;
        Ok(())
    }

    async fn due_payment_checks(&self, now: DateTime<Utc>) -> Result<Vec<PaymentTracking>, PortError> {
        let rows = self.repository.due_payment_checks(now).await?;
        Ok(rows.into_iter().map(row_to_payment_tracking).collect::<Result<_, _>>()?)
    }

    async fn update_payment_tracking(&self, tracking: &PaymentTracking) -> Result<(), PortError> {
        self.repository.update_payment_tracking(&payment_tracking_to_row(tracking)).await?;
        Ok(())
    }
}

/// Runs `SELECT 1` and reports the round trip
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        },
        Err(e) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(format!("Database error: {}", e)),
            checked_at: Utc::now(),
        },
    }
}

// ---- conversions ----

pub(crate) fn parse<T>(value: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| DatabaseError::decode(e))
}

fn currency(code: &str) -> Result<Currency, DatabaseError> {
    parse(code.trim())
}

fn money(amount: Decimal, code: &str) -> Result<Money, DatabaseError> {
    Ok(Money::new(amount, currency(code)?))
}

fn to_u32(value: i32, column: &str) -> Result<u32, DatabaseError> {
    u32::try_from(value).map_err(|_| DatabaseError::decode(format!("{column} is negative: {value}")))
}

fn to_i32(value: u32, column: &str) -> Result<i32, DatabaseError> {
    i32::try_from(value).map_err(|_| DatabaseError::decode(format!("{column} out of range: {value}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DatabaseError> {
    serde_json::to_value(value).map_err(DatabaseError::decode)
}

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, DatabaseError> {
    serde_json::from_value(value).map_err(DatabaseError::decode)
}

pub(crate) fn claim_to_row(claim: &ShaClaim) -> Result<ClaimRow, DatabaseError> {
    Ok(ClaimRow {
        id: claim.id.into(),
        claim_number: claim.claim_number.clone(),
        patient_id: claim.patient_id.into(),
        visit_id: claim.visit_id.into(),
        patient_name: claim.patient_name.clone(),
        member_number: claim.member_number.clone(),
        visit_date: claim.visit_date,
        primary_diagnosis_code: claim.primary_diagnosis.code.clone(),
        primary_diagnosis_description: claim.primary_diagnosis.description.clone(),
        secondary_diagnoses: to_json(&claim.secondary_diagnoses)?,
        services: to_json(&claim.services)?,
        claim_amount: claim.claim_amount.amount(),
        approved_amount: claim.approved_amount.map(|m| m.amount()),
        currency: claim.claim_amount.currency().code().to_string(),
        status: claim.status.as_str().to_string(),
        compliance_status: claim.compliance_status.as_str().to_string(),
        batch_id: claim.batch_id.map(Uuid::from),
        sha_reference: claim.sha_reference.clone(),
        submission_date: claim.submission_date,
        approval_date: claim.approval_date,
        last_reconciled_at: claim.last_reconciled_at,
        rejection_reason: claim.rejection_reason.clone(),
        notes: claim.notes.clone(),
        created_by: claim.created_by.into(),
        created_at: claim.created_at,
        updated_at: claim.updated_at,
    })
}

pub(crate) fn row_to_claim(row: ClaimRow) -> Result<ShaClaim, DatabaseError> {
    let currency = currency(&row.currency)?;
    Ok(ShaClaim {
        id: row.id.into(),
        claim_number: row.claim_number,
        patient_id: row.patient_id.into(),
        visit_id: row.visit_id.into(),
        patient_name: row.patient_name,
        member_number: row.member_number,
        visit_date: row.visit_date,
        primary_diagnosis: Diagnosis::new(row.primary_diagnosis_code, row.primary_diagnosis_description),
        secondary_diagnoses: from_json(row.secondary_diagnoses)?,
        services: from_json(row.services)?,
        claim_amount: Money::new(row.claim_amount, currency),
        approved_amount: row.approved_amount.map(|a| Money::new(a, currency)),
        status: parse(&row.status)?,
        compliance_status: parse(&row.compliance_status)?,
        batch_id: row.batch_id.map(BatchId::from),
        sha_reference: row.sha_reference,
        submission_date: row.submission_date,
        approval_date: row.approval_date,
        last_reconciled_at: row.last_reconciled_at,
        rejection_reason: row.rejection_reason,
        notes: row.notes,
        created_by: row.created_by.into(),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn document_to_row(document: &DocumentAttachment) -> DocumentRow {
    DocumentRow {
        id: document.id.into(),
        claim_id: document.claim_id.into(),
        document_type: document.document_type.as_str().to_string(),
        file_name: document.file_name.clone(),
        description: document.description.clone(),
        is_required: document.is_required,
        compliance_verified: document.compliance_verified,
        verified_by: document.verified_by.map(Uuid::from),
        verified_at: document.verified_at,
        uploaded_by: document.uploaded_by.into(),
        uploaded_at: document.uploaded_at,
    }
}

fn row_to_document(row: DocumentRow) -> Result<DocumentAttachment, DatabaseError> {
    Ok(DocumentAttachment {
        id: row.id.into(),
        claim_id: row.claim_id.into(),
        document_type: parse(&row.document_type)?,
        file_name: row.file_name,
        description: row.description,
        is_required: row.is_required,
        compliance_verified: row.compliance_verified,
        verified_by: row.verified_by.map(Into::into),
        verified_at: row.verified_at,
        uploaded_by: row.uploaded_by.into(),
        uploaded_at: row.uploaded_at,
    })
}

pub(crate) fn invoice_to_row(invoice: &ShaInvoice) -> Result<InvoiceRow, DatabaseError> {
    Ok(InvoiceRow {
        id: invoice.id.into(),
        invoice_number: invoice.invoice_number.clone(),
        claim_id: invoice.claim_id.into(),
        claim_number: invoice.claim_number.clone(),
        patient_id: invoice.patient_id.into(),
        patient_name: invoice.patient_name.clone(),
        member_number: invoice.member_number.clone(),
        visit_date: invoice.visit_date,
        diagnosis: to_json(&invoice.diagnosis)?,
        services: to_json(&invoice.services)?,
        total_amount: invoice.total_amount.amount(),
        currency: invoice.total_amount.currency().code().to_string(),
        status: invoice.status.as_str().to_string(),
        generated_by: invoice.generated_by.clone(),
        generated_at: invoice.generated_at,
        printed_by: invoice.printed_by.clone(),
        printed_at: invoice.printed_at,
        submitted_at: invoice.submitted_at,
    })
}

fn row_to_invoice(row: InvoiceRow) -> Result<ShaInvoice, DatabaseError> {
    Ok(ShaInvoice {
        id: row.id.into(),
        invoice_number: row.invoice_number,
        claim_id: row.claim_id.into(),
        claim_number: row.claim_number,
        patient_id: row.patient_id.into(),
        patient_name: row.patient_name,
        member_number: row.member_number,
        visit_date: row.visit_date,
        diagnosis: from_json(row.diagnosis)?,
        services: from_json(row.services)?,
        total_amount: money(row.total_amount, &row.currency)?,
        status: parse(&row.status)?,
        generated_by: row.generated_by,
        generated_at: row.generated_at,
        printed_by: row.printed_by,
        printed_at: row.printed_at,
        submitted_at: row.submitted_at,
    })
}

fn batch_to_row(batch: &ClaimBatch) -> Result<BatchRow, DatabaseError> {
    Ok(BatchRow {
        id: batch.id.into(),
        batch_number: batch.batch_number.clone(),
        batch_date: batch.batch_date,
        batch_type: batch.batch_type.as_str().to_string(),
        status: batch.status.as_str().to_string(),
        total_claims: to_i32(batch.total_claims, "total_claims")?,
        total_amount: batch.total_amount.amount(),
        currency: batch.total_amount.currency().code().to_string(),
        is_printed: batch.is_printed,
        printed_by: batch.printed_by.clone(),
        printed_at: batch.printed_at,
        sha_batch_reference: batch.sha_batch_reference.clone(),
        submitted_at: batch.submitted_at,
        created_by: batch.created_by.clone(),
        created_at: batch.created_at,
        updated_at: batch.updated_at,
    })
}

fn row_to_batch(row: BatchRow) -> Result<ClaimBatch, DatabaseError> {
    Ok(ClaimBatch {
        id: row.id.into(),
        batch_number: row.batch_number,
        batch_date: row.batch_date,
        batch_type: parse(&row.batch_type)?,
        status: parse(&row.status)?,
        total_claims: to_u32(row.total_claims, "total_claims")?,
        total_amount: money(row.total_amount, &row.currency)?,
        is_printed: row.is_printed,
        printed_by: row.printed_by,
        printed_at: row.printed_at,
        sha_batch_reference: row.sha_batch_reference,
        submitted_at: row.submitted_at,
        created_by: row.created_by,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn submission_log_to_row(log: &SubmissionLog) -> Result<SubmissionLogRow, DatabaseError> {
    Ok(SubmissionLogRow {
        id: log.id.into(),
        claim_id: log.claim_id.map(Uuid::from),
        batch_id: log.batch_id.map(Uuid::from),
        submission_type: log.submission_type.as_str().to_string(),
        status: log.status.as_str().to_string(),
        request_payload: log.request_payload.clone(),
        response_payload: log.response_payload.clone(),
        error_message: log.error_message.clone(),
        retry_count: to_i32(log.retry_count, "retry_count")?,
        created_at: log.created_at,
        completed_at: log.completed_at,
    })
}

/// Maps a stored submission log back onto the domain type
pub fn row_to_submission_log(row: SubmissionLogRow) -> Result<SubmissionLog, DatabaseError> {
    Ok(SubmissionLog {
        id: row.id.into(),
        claim_id: row.claim_id.map(ClaimId::from),
        batch_id: row.batch_id.map(BatchId::from),
        submission_type: parse(&row.submission_type)?,
        status: parse(&row.status)?,
        request_payload: row.request_payload,
        response_payload: row.response_payload,
        error_message: row.error_message,
        retry_count: to_u32(row.retry_count, "retry_count")?,
        created_at: row.created_at,
        completed_at: row.completed_at,
    })
}

pub(crate) fn payment_tracking_to_row(tracking: &PaymentTracking) -> PaymentTrackingRow {
    PaymentTrackingRow {
        id: tracking.id.into(),
        claim_id: tracking.claim_id.into(),
        invoice_id: tracking.invoice_id.map(Uuid::from),
        workflow_id: tracking.workflow_id.map(Uuid::from),
        expected_amount: tracking.expected_amount.amount(),
        approved_amount: tracking.approved_amount.map(|m| m.amount()),
        currency: tracking.expected_amount.currency().code().to_string(),
        payment_status: tracking.payment_status.as_str().to_string(),
        auto_check_enabled: tracking.auto_check_enabled,
        last_checked_at: tracking.last_checked_at,
        next_check_at: tracking.next_check_at,
        created_at: tracking.created_at,
    }
}

fn row_to_payment_tracking(row: PaymentTrackingRow) -> Result<PaymentTracking, DatabaseError> {
    let currency = currency(&row.currency)?;
    Ok(PaymentTracking {
        id: row.id.into(),
        claim_id: row.claim_id.into(),
        invoice_id: row.invoice_id.map(InvoiceId::from),
        workflow_id: row.workflow_id.map(Into::into),
        expected_amount: Money::new(row.expected_amount, currency),
        approved_amount: row.approved_amount.map(|a| Money::new(a, currency)),
        payment_status: parse(&row.payment_status)?,
        auto_check_enabled: row.auto_check_enabled,
        last_checked_at: row.last_checked_at,
        next_check_at: row.next_check_at,
        created_at: row.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{PatientId, UserId, VisitId};
    use domain_claims::{ClaimStatus, NewClaim, ServiceItem};
    use rust_decimal_macros::dec;

    fn sample_claim() -> ShaClaim {
        let new = NewClaim {
            patient_id: PatientId::new(),
            visit_id: VisitId::new(),
            patient_name: "Amina Otieno".to_string(),
            member_number: "123456789".to_string(),
            visit_date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            primary_diagnosis: Diagnosis::new("J06.9", "Acute upper respiratory infection"),
            secondary_diagnoses: vec![],
            services: vec![ServiceItem::new("Consultation", 1, Money::kes(dec!(1500)))],
            claim_amount: Money::kes(dec!(1500)),
            notes: None,
            created_by: UserId::new(),
        };
        ShaClaim::create(new, "SHA-202403-000001".to_string(), Utc::now()).unwrap()
    }

    #[test]
    fn test_claim_row_conversion_preserves_fields() {
        let claim = sample_claim();
        let row = claim_to_row(&claim).unwrap();
        assert_eq!(row.status, "draft");
        assert_eq!(row.currency, "KES");

        let back = row_to_claim(row).unwrap();
        assert_eq!(back, claim);
    }

    #[test]
    fn test_unknown_status_is_a_decode_error() {
        let mut row = claim_to_row(&sample_claim()).unwrap();
        row.status = "archived".to_string();
        let err = row_to_claim(row).unwrap_err();
        assert!(matches!(err, DatabaseError::Decode(_)));
    }

    #[test]
    fn test_padded_currency_is_accepted() {
        let mut row = claim_to_row(&sample_claim()).unwrap();
        row.currency = "KES ".to_string();
        row.status = ClaimStatus::Submitted.as_str().to_string();
        let claim = row_to_claim(row).unwrap();
        assert_eq!(claim.claim_amount.currency(), Currency::KES);
        assert_eq!(claim.status, ClaimStatus::Submitted);
    }
}
