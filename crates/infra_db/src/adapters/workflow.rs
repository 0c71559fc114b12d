//! PostgreSQL Workflow Adapter
//!
//! Implements `WorkflowStore`. A transition writes the instance row under an
//! optimistic version check, its steps, the new activity entries and any
//! step effects in one transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{ClaimId, DomainPort, HealthCheckResult, HealthCheckable, PortError, WorkflowId};
use domain_claims::{
    StepEffect, WorkflowActivity, WorkflowFilter, WorkflowInstance, WorkflowStep, WorkflowStore,
};

use crate::adapters::claims::{claim_to_row, invoice_to_row, parse, payment_tracking_to_row, ping};
use crate::error::DatabaseError;
use crate::repositories::claims::ClaimsRepository;
use crate::repositories::workflow::{ActivityRow, StepRow, WorkflowQuery, WorkflowRepository, WorkflowRow};

/// PostgreSQL-backed implementation of `WorkflowStore`
#[derive(Debug, Clone)]
pub struct PgWorkflowStore {
    repository: WorkflowRepository,
    pool: PgPool,
}

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: WorkflowRepository::new(pool.clone()),
            pool,
        }
    }

    /// Loads the steps for the given instance rows and assembles the aggregates
    async fn hydrate(&self, rows: Vec<WorkflowRow>) -> Result<Vec<WorkflowInstance>, DatabaseError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut steps: HashMap<Uuid, Vec<WorkflowStep>> = HashMap::new();
        for step in self.repository.steps_for(&ids).await? {
            steps.entry(step.workflow_id).or_default().push(row_to_step(step)?);
        }

        rows.into_iter()
            .map(|row| {
                let workflow_steps = steps.remove(&row.id).unwrap_or_default();
                row_to_workflow(row, workflow_steps)
            })
            .collect()
    }
}

impl DomainPort for PgWorkflowStore {}

#[async_trait]
impl HealthCheckable for PgWorkflowStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-workflow-adapter").await
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    #[instrument(skip(self, workflow, activities), fields(workflow_id = %workflow.id))]
    async fn insert_workflow(
        &self,
        workflow: &WorkflowInstance,
        activities: &[WorkflowActivity],
    ) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        WorkflowRepository::insert_instance(&mut *tx, &workflow_to_row(workflow, workflow.version)?).await?;
        for step in &workflow.steps {
            WorkflowRepository::insert_step(&mut *tx, &step_to_row(step)?).await?;
        }
        for activity in activities {
            WorkflowRepository::insert_activity(&mut *tx, &activity_to_row(activity)).await?;
        }

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }

    #[instrument(skip_all, fields(workflow_id = %workflow.id, version = workflow.version))]
    async fn save_transition(
        &self,
        workflow: &WorkflowInstance,
        activities: &[WorkflowActivity],
        effects: &[StepEffect],
    ) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        // Effects first: the instance may reference an invoice inserted here
        for effect in effects {
            match effect {
                StepEffect::UpdateClaim(claim) => {
                    ClaimsRepository::update_claim(&mut *tx, &claim_to_row(claim)?).await?;
                }
                StepEffect::InsertInvoice(invoice) => {
                    ClaimsRepository::insert_invoice(&mut *tx, &invoice_to_row(invoice)?).await?;
                }
                StepEffect::InsertPaymentTracking(tracking) => {
                    ClaimsRepository::insert_payment_tracking(&mut *tx, &payment_tracking_to_row(tracking)).await?;
                }
            }
        }

        let expected = to_i32(workflow.version)?;
        let row = workflow_to_row(workflow, workflow.version + 1)?;
        WorkflowRepository::update_instance(&mut *tx, &row, expected).await?;
        for step in &workflow.steps {
            WorkflowRepository::update_step(&mut *tx, &step_to_row(step)?).await?;
        }
        for activity in activities {
            WorkflowRepository::insert_activity(&mut *tx, &activity_to_row(activity)).await?;
        }

        tx.commit().await.map_err(DatabaseError::from)?;
        debug!(effects = effects.len(), activities = activities.len(), "Workflow transition saved");
        Ok(())
    }

    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<WorkflowInstance>, PortError> {
        let Some(row) = self.repository.get_instance(id.into()).await? else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![row]).await?.pop())
    }

    async fn active_workflow_for_claim(&self, claim_id: ClaimId) -> Result<Option<WorkflowInstance>, PortError> {
        let Some(row) = self.repository.active_instance_for_claim(claim_id.into()).await? else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![row]).await?.pop())
    }

    async fn list_workflows(&self, filter: &WorkflowFilter) -> Result<Vec<WorkflowInstance>, PortError> {
        let query = WorkflowQuery {
            status: filter.status.map(|s| s.as_str().to_string()),
            claim_id: filter.claim_id.map(Uuid::from),
            from: filter.from,
            to: filter.to,
            limit: filter.limit.map(i64::from),
            offset: filter.offset.map_or(0, i64::from),
        };
        let rows = self.repository.list_instances(&query).await?;
        Ok(self.hydrate(rows).await?)
    }

    async fn list_activity(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowActivity>, PortError> {
        let rows = self.repository.list_activity(workflow_id.into()).await?;
        Ok(rows.into_iter().map(row_to_activity).collect::<Result<_, _>>()?)
    }
}

fn to_i32(value: u32) -> Result<i32, DatabaseError> {
    i32::try_from(value).map_err(|_| DatabaseError::decode(format!("value out of range: {value}")))
}

fn workflow_to_row(workflow: &WorkflowInstance, version: u32) -> Result<WorkflowRow, DatabaseError> {
    Ok(WorkflowRow {
        id: workflow.id.into(),
        claim_id: workflow.claim_id.into(),
        status: workflow.status.as_str().to_string(),
        current_step: workflow.current_step.map(|s| s.as_str().to_string()),
        initiated_by: workflow.initiated_by.clone(),
        invoice_id: workflow.invoice_id.map(Uuid::from),
        notes: workflow.notes.clone(),
        started_at: workflow.started_at,
        completed_at: workflow.completed_at,
        updated_at: workflow.updated_at,
        version: to_i32(version)?,
    })
}

fn row_to_workflow(row: WorkflowRow, steps: Vec<WorkflowStep>) -> Result<WorkflowInstance, DatabaseError> {
    Ok(WorkflowInstance {
        id: row.id.into(),
        claim_id: row.claim_id.into(),
        status: parse(&row.status)?,
        current_step: row.current_step.as_deref().map(parse).transpose()?,
        initiated_by: row.initiated_by,
        invoice_id: row.invoice_id.map(Into::into),
        notes: row.notes,
        started_at: row.started_at,
        completed_at: row.completed_at,
        updated_at: row.updated_at,
        version: u32::try_from(row.version).map_err(|_| DatabaseError::decode("negative workflow version"))?,
        steps,
    })
}

fn step_to_row(step: &WorkflowStep) -> Result<StepRow, DatabaseError> {
    Ok(StepRow {
        id: step.id.into(),
        workflow_id: step.workflow_id.into(),
        step_name: step.step.as_str().to_string(),
        step_order: i16::from(step.step_order),
        status: step.status.as_str().to_string(),
        is_required: step.is_required,
        is_automated: step.is_automated,
        estimated_minutes: to_i32(step.estimated_minutes)?,
        started_at: step.started_at,
        completed_at: step.completed_at,
        completed_by: step.completed_by.clone(),
        actual_minutes: step.actual_minutes,
        notes: step.notes.clone(),
    })
}

fn row_to_step(row: StepRow) -> Result<WorkflowStep, DatabaseError> {
    Ok(WorkflowStep {
        id: row.id.into(),
        workflow_id: row.workflow_id.into(),
        step: parse(&row.step_name)?,
        step_order: u8::try_from(row.step_order).map_err(|_| DatabaseError::decode("step_order out of range"))?,
        status: parse(&row.status)?,
        is_required: row.is_required,
        is_automated: row.is_automated,
        estimated_minutes: u32::try_from(row.estimated_minutes)
            .map_err(|_| DatabaseError::decode("negative estimated_minutes"))?,
        started_at: row.started_at,
        completed_at: row.completed_at,
        completed_by: row.completed_by,
        actual_minutes: row.actual_minutes,
        notes: row.notes,
    })
}

fn activity_to_row(activity: &WorkflowActivity) -> ActivityRow {
    ActivityRow {
        id: activity.id.into(),
        workflow_id: activity.workflow_id.into(),
        step_name: activity.step.map(|s| s.as_str().to_string()),
        action: activity.action.as_str().to_string(),
        performed_by: activity.performed_by.clone(),
        details: activity.details.clone(),
        created_at: activity.created_at,
    }
}

fn row_to_activity(row: ActivityRow) -> Result<WorkflowActivity, DatabaseError> {
    Ok(WorkflowActivity {
        id: row.id.into(),
        workflow_id: row.workflow_id.into(),
        step: row.step_name.as_deref().map(parse).transpose()?,
        action: parse(&row.action)?,
        performed_by: row.performed_by,
        details: row.details,
        created_at: row.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain_claims::{StepName, StepStatus, WorkflowStatus};

    #[test]
    fn test_workflow_row_conversion() {
        let (workflow, activities) = WorkflowInstance::initialize(ClaimId::new(), "clerk", Utc::now()).unwrap();

        let row = workflow_to_row(&workflow, 3).unwrap();
        assert_eq!(row.status, "in_progress");
        assert_eq!(row.current_step.as_deref(), Some("claim_creation"));
        assert_eq!(row.version, 3);

        let steps = workflow
            .steps
            .iter()
            .map(|s| row_to_step(step_to_row(s).unwrap()).unwrap())
            .collect();
        let back = row_to_workflow(row, steps).unwrap();
        assert_eq!(back.status, WorkflowStatus::InProgress);
        assert_eq!(back.version, 3);
        assert_eq!(back.steps, workflow.steps);
        assert_eq!(back.step(StepName::ClaimCreation).unwrap().status, StepStatus::InProgress);

        let activity = row_to_activity(activity_to_row(&activities[0])).unwrap();
        assert_eq!(activity, activities[0]);
    }
}
