//! Workflow repository
//!
//! SQL for workflow instances, their steps and the activity log. Writes are
//! executor-generic so the workflow adapter can compose them with claim,
//! invoice and payment tracking writes in a single transaction.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub status: String,
    pub current_step: Option<String>,
    pub initiated_by: String,
    pub invoice_id: Option<Uuid>,
    pub notes: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

const WORKFLOW_COLUMNS: &str = "id, claim_id, status, current_step, initiated_by, invoice_id, notes, \
    started_at, completed_at, updated_at, version";

#[derive(Debug, Clone, FromRow)]
pub struct StepRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub step_name: String,
    pub step_order: i16,
    pub status: String,
    pub is_required: bool,
    pub is_automated: bool,
    pub estimated_minutes: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub actual_minutes: Option<i64>,
    pub notes: Option<String>,
}

const STEP_COLUMNS: &str = "id, workflow_id, step_name, step_order, status, is_required, is_automated, \
    estimated_minutes, started_at, completed_at, completed_by, actual_minutes, notes";

#[derive(Debug, Clone, FromRow)]
pub struct ActivityRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub step_name: Option<String>,
    pub action: String,
    pub performed_by: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Filter for listing workflow instances
#[derive(Debug, Clone, Default)]
pub struct WorkflowQuery {
    pub status: Option<String>,
    pub claim_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// `None` returns every matching row
    pub limit: Option<i64>,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct WorkflowRepository {
    pool: PgPool,
}

impl WorkflowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_instance<'e, E: PgExecutor<'e>>(executor: E, row: &WorkflowRow) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO sha_workflow_instances ({WORKFLOW_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(row.id)
        .bind(row.claim_id)
        .bind(&row.status)
        .bind(&row.current_step)
        .bind(&row.initiated_by)
        .bind(row.invoice_id)
        .bind(&row.notes)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(row.updated_at)
        .bind(row.version)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Updates the instance if its stored version still equals `expected_version`
    ///
    /// The stored version becomes `row.version`. Returns `Conflict` when the
    /// row was changed by someone else.
    pub async fn update_instance<'e, E: PgExecutor<'e>>(
        executor: E,
        row: &WorkflowRow,
        expected_version: i32,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE sha_workflow_instances SET
                status = $3,
                current_step = $4,
                invoice_id = $5,
                notes = $6,
                completed_at = $7,
                updated_at = $8,
                version = $9
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(row.id)
        .bind(expected_version)
        .bind(&row.status)
        .bind(&row.current_step)
        .bind(row.invoice_id)
        .bind(&row.notes)
        .bind(row.completed_at)
        .bind(row.updated_at)
        .bind(row.version)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::Conflict(format!(
                "workflow {} is no longer at version {}",
                row.id, expected_version
            )));
        }
        Ok(())
    }

    pub async fn insert_step<'e, E: PgExecutor<'e>>(executor: E, row: &StepRow) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO sha_workflow_steps ({STEP_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(row.id)
        .bind(row.workflow_id)
        .bind(&row.step_name)
        .bind(row.step_order)
        .bind(&row.status)
        .bind(row.is_required)
        .bind(row.is_automated)
        .bind(row.estimated_minutes)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(&row.completed_by)
        .bind(row.actual_minutes)
        .bind(&row.notes)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn update_step<'e, E: PgExecutor<'e>>(executor: E, row: &StepRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE sha_workflow_steps SET
                status = $2,
                started_at = $3,
                completed_at = $4,
                completed_by = $5,
                actual_minutes = $6,
                notes = $7
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(&row.status)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(&row.completed_by)
        .bind(row.actual_minutes)
        .bind(&row.notes)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn insert_activity<'e, E: PgExecutor<'e>>(executor: E, row: &ActivityRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO sha_workflow_activity_log (id, workflow_id, step_name, action, performed_by, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(row.id)
        .bind(row.workflow_id)
        .bind(&row.step_name)
        .bind(&row.action)
        .bind(&row.performed_by)
        .bind(&row.details)
        .bind(row.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn get_instance(&self, id: Uuid) -> Result<Option<WorkflowRow>, DatabaseError> {
        let row = sqlx::query_as::<_, WorkflowRow>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM sha_workflow_instances WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn active_instance_for_claim(&self, claim_id: Uuid) -> Result<Option<WorkflowRow>, DatabaseError> {
        let row = sqlx::query_as::<_, WorkflowRow>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM sha_workflow_instances \
             WHERE claim_id = $1 AND status IN ('in_progress', 'failed')"
        ))
        .bind(claim_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_instances(&self, query: &WorkflowQuery) -> Result<Vec<WorkflowRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, WorkflowRow>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM sha_workflow_instances \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::uuid IS NULL OR claim_id = $2) \
               AND ($3::timestamptz IS NULL OR started_at >= $3) \
               AND ($4::timestamptz IS NULL OR started_at <= $4) \
             ORDER BY started_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(&query.status)
        .bind(query.claim_id)
        .bind(query.from)
        .bind(query.to)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Steps of the given instances ordered by workflow then step order
    pub async fn steps_for(&self, workflow_ids: &[Uuid]) -> Result<Vec<StepRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, StepRow>(&format!(
            "SELECT {STEP_COLUMNS} FROM sha_workflow_steps \
             WHERE workflow_id = ANY($1) ORDER BY workflow_id, step_order"
        ))
        .bind(workflow_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_activity(&self, workflow_id: Uuid) -> Result<Vec<ActivityRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT id, workflow_id, step_name, action, performed_by, details, created_at
            FROM sha_workflow_activity_log
            WHERE workflow_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
