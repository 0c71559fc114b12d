//! SHA claims repository
//!
//! Row types and SQL for claims and the records hanging off them: document
//! attachments, invoices, batches, submission logs and payment tracking.
//!
//! Write operations are associated functions generic over the executor so
//! they can run against the pool or inside a transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct ClaimRow {
    pub id: Uuid,
    pub claim_number: String,
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub patient_name: String,
    pub member_number: String,
    pub visit_date: NaiveDate,
    pub primary_diagnosis_code: String,
    pub primary_diagnosis_description: String,
    pub secondary_diagnoses: serde_json::Value,
    pub services: serde_json::Value,
    pub claim_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub currency: String,
    pub status: String,
    pub compliance_status: String,
    pub batch_id: Option<Uuid>,
    pub sha_reference: Option<String>,
    pub submission_date: Option<DateTime<Utc>>,
    pub approval_date: Option<DateTime<Utc>>,
    pub last_reconciled_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const CLAIM_COLUMNS: &str = "id, claim_number, patient_id, visit_id, patient_name, member_number, \
    visit_date, primary_diagnosis_code, primary_diagnosis_description, secondary_diagnoses, services, \
    claim_amount, approved_amount, currency, status, compliance_status, batch_id, sha_reference, \
    submission_date, approval_date, last_reconciled_at, rejection_reason, notes, created_by, \
    created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub document_type: String,
    pub file_name: String,
    pub description: Option<String>,
    pub is_required: bool,
    pub compliance_verified: bool,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

const DOCUMENT_COLUMNS: &str = "id, claim_id, document_type, file_name, description, is_required, \
    compliance_verified, verified_by, verified_at, uploaded_by, uploaded_at";

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub invoice_number: String,
    pub claim_id: Uuid,
    pub claim_number: String,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub member_number: String,
    pub visit_date: NaiveDate,
    pub diagnosis: serde_json::Value,
    pub services: serde_json::Value,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: String,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
    pub printed_by: Option<String>,
    pub printed_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

const INVOICE_COLUMNS: &str = "id, invoice_number, claim_id, claim_number, patient_id, patient_name, \
    member_number, visit_date, diagnosis, services, total_amount, currency, status, generated_by, \
    generated_at, printed_by, printed_at, submitted_at";

#[derive(Debug, Clone, FromRow)]
pub struct BatchRow {
    pub id: Uuid,
    pub batch_number: String,
    pub batch_date: NaiveDate,
    pub batch_type: String,
    pub status: String,
    pub total_claims: i32,
    pub total_amount: Decimal,
    pub currency: String,
    pub is_printed: bool,
    pub printed_by: Option<String>,
    pub printed_at: Option<DateTime<Utc>>,
    pub sha_batch_reference: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const BATCH_COLUMNS: &str = "id, batch_number, batch_date, batch_type, status, total_claims, \
    total_amount, currency, is_printed, printed_by, printed_at, sha_batch_reference, submitted_at, \
    created_by, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct SubmissionLogRow {
    pub id: Uuid,
    pub claim_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub submission_type: String,
    pub status: String,
    pub request_payload: serde_json::Value,
    pub response_payload: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentTrackingRow {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub workflow_id: Option<Uuid>,
    pub expected_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub currency: String,
    pub payment_status: String,
    pub auto_check_enabled: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub next_check_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

const PAYMENT_TRACKING_COLUMNS: &str = "id, claim_id, invoice_id, workflow_id, expected_amount, \
    approved_amount, currency, payment_status, auto_check_enabled, last_checked_at, next_check_at, \
    created_at";

/// Filter for listing claims
#[derive(Debug, Clone, Default)]
pub struct ClaimQuery {
    pub status: Option<String>,
    pub patient_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

/// Filter for listing invoices
#[derive(Debug, Clone, Default)]
pub struct InvoiceQuery {
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Repository for the SHA claims tables
#[derive(Debug, Clone)]
pub struct ClaimsRepository {
    pool: PgPool,
}

impl ClaimsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Increments and returns the sequence for the kind and period
    pub async fn next_sequence(&self, kind: &str, period: &str) -> Result<i32, DatabaseError> {
        let value = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO number_sequences (kind, period, value)
            VALUES ($1, $2, 1)
            ON CONFLICT (kind, period)
            DO UPDATE SET value = number_sequences.value + 1, updated_at = NOW()
            RETURNING value
            "#,
        )
        .bind(kind)
        .bind(period)
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }

    // ---- claims ----

    pub async fn insert_claim<'e, E: PgExecutor<'e>>(executor: E, row: &ClaimRow) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO sha_claims ({CLAIM_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)"
        ))
        .bind(row.id)
        .bind(&row.claim_number)
        .bind(row.patient_id)
        .bind(row.visit_id)
        .bind(&row.patient_name)
        .bind(&row.member_number)
        .bind(row.visit_date)
        .bind(&row.primary_diagnosis_code)
        .bind(&row.primary_diagnosis_description)
        .bind(&row.secondary_diagnoses)
        .bind(&row.services)
        .bind(row.claim_amount)
        .bind(row.approved_amount)
        .bind(&row.currency)
        .bind(&row.status)
        .bind(&row.compliance_status)
        .bind(row.batch_id)
        .bind(&row.sha_reference)
        .bind(row.submission_date)
        .bind(row.approval_date)
        .bind(row.last_reconciled_at)
        .bind(&row.rejection_reason)
        .bind(&row.notes)
        .bind(row.created_by)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Writes the mutable columns of a claim
    pub async fn update_claim<'e, E: PgExecutor<'e>>(executor: E, row: &ClaimRow) -> Result<(), DatabaseError> {
        let affected = Self::write_claim(executor, row, None).await?;
        if affected == 0 {
            return Err(DatabaseError::not_found("Claim", row.id));
        }
        Ok(())
    }

    /// Updates the claim only while its stored status is still `expected`
    pub async fn transition_claim<'e, E: PgExecutor<'e>>(
        executor: E,
        row: &ClaimRow,
        expected: &str,
    ) -> Result<(), DatabaseError> {
        let affected = Self::write_claim(executor, row, Some(expected)).await?;
        if affected == 0 {
            return Err(DatabaseError::Conflict(format!(
                "claim {} is missing or no longer {expected}",
                row.claim_number
            )));
        }
        Ok(())
    }

    async fn write_claim<'e, E: PgExecutor<'e>>(
        executor: E,
        row: &ClaimRow,
        expected_status: Option<&str>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE sha_claims SET
                approved_amount = $2,
                status = $3,
                compliance_status = $4,
                batch_id = $5,
                sha_reference = $6,
                submission_date = $7,
                approval_date = $8,
                last_reconciled_at = $9,
                rejection_reason = $10,
                notes = $11,
                updated_at = $12,
                claim_amount = $13
            WHERE id = $1 AND ($14::text IS NULL OR status = $14)
            "#,
        )
        .bind(row.id)
        .bind(row.approved_amount)
        .bind(&row.status)
        .bind(&row.compliance_status)
        .bind(row.batch_id)
        .bind(&row.sha_reference)
        .bind(row.submission_date)
        .bind(row.approval_date)
        .bind(row.last_reconciled_at)
        .bind(&row.rejection_reason)
        .bind(&row.notes)
        .bind(row.updated_at)
        .bind(row.claim_amount)
        .bind(expected_status)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Writes a reworked claim and deletes its voided invoice together
    pub async fn save_rework(&self, claim: &ClaimRow, voided_invoice: Option<Uuid>) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        Self::transition_claim(&mut *tx, claim, "rejected").await?;
        if let Some(invoice_id) = voided_invoice {
            sqlx::query("DELETE FROM sha_invoices WHERE id = $1 AND claim_id = $2")
                .bind(invoice_id)
                .bind(claim.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Deletes the claim; documents, invoice, logs, tracking and workflows cascade
    pub async fn delete_claim(&self, id: Uuid) -> Result<(), DatabaseError> {
        let deleted = sqlx::query("DELETE FROM sha_claims WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Claim", id));
        }
        Ok(())
    }

    pub async fn get_claim(&self, id: Uuid) -> Result<Option<ClaimRow>, DatabaseError> {
        let row = sqlx::query_as::<_, ClaimRow>(&format!("SELECT {CLAIM_COLUMNS} FROM sha_claims WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_claims(&self, query: &ClaimQuery) -> Result<Vec<ClaimRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {CLAIM_COLUMNS} FROM sha_claims \
             WHERE ($1::text IS NULL OR status = $1) AND ($2::uuid IS NULL OR patient_id = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(&query.status)
        .bind(query.patient_id)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Unbatched ready-to-submit claims created in `[from, to)`
    pub async fn batch_candidates_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ClaimRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {CLAIM_COLUMNS} FROM sha_claims \
             WHERE status = 'ready_to_submit' AND batch_id IS NULL \
               AND created_at >= $1 AND created_at < $2 \
             ORDER BY created_at"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Unbatched ready-to-submit claims among the given ids
    pub async fn batch_candidates_in(&self, ids: &[Uuid]) -> Result<Vec<ClaimRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {CLAIM_COLUMNS} FROM sha_claims \
             WHERE status = 'ready_to_submit' AND batch_id IS NULL AND id = ANY($1) \
             ORDER BY created_at"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn claims_in_batch(&self, batch_id: Uuid) -> Result<Vec<ClaimRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {CLAIM_COLUMNS} FROM sha_claims WHERE batch_id = $1 ORDER BY created_at"
        ))
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn claims_awaiting_reconciliation(&self) -> Result<Vec<ClaimRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {CLAIM_COLUMNS} FROM sha_claims \
             WHERE status = 'submitted' AND sha_reference IS NOT NULL \
             ORDER BY submission_date"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- documents ----

    pub async fn insert_document(&self, row: &DocumentRow) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO sha_document_attachments ({DOCUMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(row.id)
        .bind(row.claim_id)
        .bind(&row.document_type)
        .bind(&row.file_name)
        .bind(&row.description)
        .bind(row.is_required)
        .bind(row.compliance_verified)
        .bind(row.verified_by)
        .bind(row.verified_at)
        .bind(row.uploaded_by)
        .bind(row.uploaded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_document(&self, row: &DocumentRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE sha_document_attachments SET
                description = $2,
                is_required = $3,
                compliance_verified = $4,
                verified_by = $5,
                verified_at = $6
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(&row.description)
        .bind(row.is_required)
        .bind(row.compliance_verified)
        .bind(row.verified_by)
        .bind(row.verified_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Document", row.id));
        }
        Ok(())
    }

    pub async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRow>, DatabaseError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM sha_document_attachments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<(), DatabaseError> {
        let deleted = sqlx::query("DELETE FROM sha_document_attachments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Document", id));
        }
        Ok(())
    }

    pub async fn list_documents(&self, claim_id: Uuid) -> Result<Vec<DocumentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM sha_document_attachments WHERE claim_id = $1 ORDER BY uploaded_at"
        ))
        .bind(claim_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- invoices ----

    pub async fn insert_invoice<'e, E: PgExecutor<'e>>(executor: E, row: &InvoiceRow) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO sha_invoices ({INVOICE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        ))
        .bind(row.id)
        .bind(&row.invoice_number)
        .bind(row.claim_id)
        .bind(&row.claim_number)
        .bind(row.patient_id)
        .bind(&row.patient_name)
        .bind(&row.member_number)
        .bind(row.visit_date)
        .bind(&row.diagnosis)
        .bind(&row.services)
        .bind(row.total_amount)
        .bind(&row.currency)
        .bind(&row.status)
        .bind(&row.generated_by)
        .bind(row.generated_at)
        .bind(&row.printed_by)
        .bind(row.printed_at)
        .bind(row.submitted_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn update_invoice(&self, row: &InvoiceRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE sha_invoices SET
                status = $2,
                printed_by = $3,
                printed_at = $4,
                submitted_at = $5
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(&row.status)
        .bind(&row.printed_by)
        .bind(row.printed_at)
        .bind(row.submitted_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Invoice", row.id));
        }
        Ok(())
    }

    pub async fn get_invoice(&self, id: Uuid) -> Result<Option<InvoiceRow>, DatabaseError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!("SELECT {INVOICE_COLUMNS} FROM sha_invoices WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_invoices(&self, query: &InvoiceQuery) -> Result<Vec<InvoiceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM sha_invoices \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::timestamptz IS NULL OR generated_at >= $2) \
               AND ($3::timestamptz IS NULL OR generated_at <= $3) \
               AND ($4::text IS NULL OR invoice_number ILIKE $4 OR claim_number ILIKE $4 OR patient_name ILIKE $4) \
             ORDER BY generated_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(&query.status)
        .bind(query.from)
        .bind(query.to)
        .bind(query.search.as_ref().map(|term| format!("%{term}%")))
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn invoice_for_claim(&self, claim_id: Uuid) -> Result<Option<InvoiceRow>, DatabaseError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM sha_invoices WHERE claim_id = $1"
        ))
        .bind(claim_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // ---- batches ----

    /// Inserts the batch and assigns the claims to it in one transaction
    ///
    /// Fails with `Conflict` if any claim was batched in the meantime.
    pub async fn create_batch(&self, row: &BatchRow, claim_ids: &[Uuid]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO sha_claim_batches ({BATCH_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        ))
        .bind(row.id)
        .bind(&row.batch_number)
        .bind(row.batch_date)
        .bind(&row.batch_type)
        .bind(&row.status)
        .bind(row.total_claims)
        .bind(row.total_amount)
        .bind(&row.currency)
        .bind(row.is_printed)
        .bind(&row.printed_by)
        .bind(row.printed_at)
        .bind(&row.sha_batch_reference)
        .bind(row.submitted_at)
        .bind(&row.created_by)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await?;

        let assigned = sqlx::query(
            "UPDATE sha_claims SET batch_id = $1, updated_at = $2 WHERE id = ANY($3) AND batch_id IS NULL",
        )
        .bind(row.id)
        .bind(row.created_at)
        .bind(claim_ids)
        .execute(&mut *tx)
        .await?;

        if assigned.rows_affected() != claim_ids.len() as u64 {
            return Err(DatabaseError::Conflict(format!(
                "only {} of {} claims could be assigned to batch {}",
                assigned.rows_affected(),
                claim_ids.len(),
                row.batch_number
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn update_batch<'e, E: PgExecutor<'e>>(executor: E, row: &BatchRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE sha_claim_batches SET
                status = $2,
                total_claims = $3,
                total_amount = $4,
                is_printed = $5,
                printed_by = $6,
                printed_at = $7,
                sha_batch_reference = $8,
                submitted_at = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(&row.status)
        .bind(row.total_claims)
        .bind(row.total_amount)
        .bind(row.is_printed)
        .bind(&row.printed_by)
        .bind(row.printed_at)
        .bind(&row.sha_batch_reference)
        .bind(row.submitted_at)
        .bind(row.updated_at)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Batch", row.id));
        }
        Ok(())
    }

    pub async fn get_batch(&self, id: Uuid) -> Result<Option<BatchRow>, DatabaseError> {
        let row = sqlx::query_as::<_, BatchRow>(&format!("SELECT {BATCH_COLUMNS} FROM sha_claim_batches WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_batches(&self, status: Option<&str>) -> Result<Vec<BatchRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {BATCH_COLUMNS} FROM sha_claim_batches \
             WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY batch_date DESC, created_at DESC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Releases the batch's claims and deletes it in one transaction
    pub async fn delete_batch(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE sha_claims SET batch_id = NULL, updated_at = NOW() WHERE batch_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM sha_claim_batches WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Batch", id));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Writes a submitted batch and its claims in one transaction
    /// Marks a draft batch and its ready claims submitted in one transaction
    pub async fn save_batch_submission(&self, batch: &BatchRow, claims: &[ClaimRow]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let locked = sqlx::query("SELECT id FROM sha_claim_batches WHERE id = $1 AND status = 'draft' FOR UPDATE")
            .bind(batch.id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(DatabaseError::Conflict(format!(
                "batch {} is missing or no longer a draft",
                batch.batch_number
            )));
        }
        Self::update_batch(&mut *tx, batch).await?;
        for claim in claims {
            Self::transition_claim(&mut *tx, claim, "ready_to_submit").await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ---- submission logs ----

    pub async fn insert_submission_log(&self, row: &SubmissionLogRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO claim_submission_logs (
                id, claim_id, batch_id, submission_type, status, request_payload,
                response_payload, error_message, retry_count, created_at, completed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(row.id)
        .bind(row.claim_id)
        .bind(row.batch_id)
        .bind(&row.submission_type)
        .bind(&row.status)
        .bind(&row.request_payload)
        .bind(&row.response_payload)
        .bind(&row.error_message)
        .bind(row.retry_count)
        .bind(row.created_at)
        .bind(row.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_submission_log(&self, row: &SubmissionLogRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE claim_submission_logs SET
                status = $2,
                response_payload = $3,
                error_message = $4,
                completed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(&row.status)
        .bind(&row.response_payload)
        .bind(&row.error_message)
        .bind(row.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn submission_logs_for_claim(&self, claim_id: Uuid) -> Result<Vec<SubmissionLogRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, SubmissionLogRow>(
            r#"
            SELECT id, claim_id, batch_id, submission_type, status, request_payload,
                   response_payload, error_message, retry_count, created_at, completed_at
            FROM claim_submission_logs
            WHERE claim_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(claim_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- payment tracking ----

    pub async fn insert_payment_tracking<'e, E: PgExecutor<'e>>(
        executor: E,
        row: &PaymentTrackingRow,
    ) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO sha_payment_tracking ({PAYMENT_TRACKING_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(row.id)
        .bind(row.claim_id)
        .bind(row.invoice_id)
        .bind(row.workflow_id)
        .bind(row.expected_amount)
        .bind(row.approved_amount)
        .bind(&row.currency)
        .bind(&row.payment_status)
        .bind(row.auto_check_enabled)
        .bind(row.last_checked_at)
        .bind(row.next_check_at)
        .bind(row.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn due_payment_checks(&self, now: DateTime<Utc>) -> Result<Vec<PaymentTrackingRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, PaymentTrackingRow>(&format!(
            "SELECT {PAYMENT_TRACKING_COLUMNS} FROM sha_payment_tracking \
             WHERE auto_check_enabled AND next_check_at <= $1 \
             ORDER BY next_check_at"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_payment_tracking(&self, row: &PaymentTrackingRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE sha_payment_tracking SET
                approved_amount = $2,
                payment_status = $3,
                auto_check_enabled = $4,
                last_checked_at = $5,
                next_check_at = $6
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(row.approved_amount)
        .bind(&row.payment_status)
        .bind(row.auto_check_enabled)
        .bind(row.last_checked_at)
        .bind(row.next_check_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
