//! Workflow orchestration: persistence of transitions and automated steps

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use core_kernel::{ClaimId, WorkflowId};

use crate::claim::ComplianceStatus;
use crate::error::ClaimError;
use crate::payment::PaymentTracking;
use crate::ports::{StepEffect, WorkflowStore};
use crate::services::claims::ClaimsService;
use crate::statistics::WorkflowStatistics;
use crate::workflow::{
    StepName, WorkflowActivity, WorkflowFilter, WorkflowInstance, SYSTEM_ACTOR,
};

/// Application service driving workflow instances
pub struct WorkflowService {
    claims: Arc<ClaimsService>,
    workflows: Arc<dyn WorkflowStore>,
}

impl WorkflowService {
    pub fn new(claims: Arc<ClaimsService>, workflows: Arc<dyn WorkflowStore>) -> Self {
        Self { claims, workflows }
    }

    /// Starts a workflow for a claim that has none active
    #[instrument(skip(self))]
    pub async fn initialize(&self, claim_id: ClaimId, initiated_by: &str) -> Result<WorkflowInstance, ClaimError> {
        self.claims.get_claim(claim_id).await?;
        if self.workflows.active_workflow_for_claim(claim_id).await?.is_some() {
            return Err(ClaimError::ActiveWorkflowExists(claim_id.to_string()));
        }

        let (workflow, activities) = WorkflowInstance::initialize(claim_id, initiated_by, Utc::now())?;
        self.workflows.insert_workflow(&workflow, &activities).await?;
        info!(workflow_id = %workflow.id, claim_id = %claim_id, "claims workflow started");
        Ok(workflow)
    }

    pub async fn get(&self, id: WorkflowId) -> Result<WorkflowInstance, ClaimError> {
        self.workflows
            .get_workflow(id)
            .await?
            .ok_or_else(|| ClaimError::not_found("Workflow", id))
    }

    pub async fn list(&self, filter: &WorkflowFilter) -> Result<Vec<WorkflowInstance>, ClaimError> {
        Ok(self.workflows.list_workflows(filter).await?)
    }

    pub async fn activity(&self, id: WorkflowId) -> Result<Vec<WorkflowActivity>, ClaimError> {
        self.get(id).await?;
        Ok(self.workflows.list_activity(id).await?)
    }

    pub async fn statistics(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<WorkflowStatistics, ClaimError> {
        let workflows = self.workflows.list_workflows(&WorkflowFilter::between(from, to)).await?;
        Ok(WorkflowStatistics::from_instances(&workflows, Utc::now()))
    }

    async fn save(
        &self,
        workflow: &mut WorkflowInstance,
        activities: &[WorkflowActivity],
        effects: &[StepEffect],
    ) -> Result<(), ClaimError> {
        self.workflows.save_transition(workflow, activities, effects).await?;
        workflow.version += 1;
        Ok(())
    }

    /// Completes a manual step; with `auto_advance` any automated steps that
    /// follow are run as well
    #[instrument(skip(self, notes))]
    pub async fn complete_step(
        &self,
        id: WorkflowId,
        step: StepName,
        completed_by: &str,
        notes: Option<String>,
        auto_advance: bool,
    ) -> Result<WorkflowInstance, ClaimError> {
        let mut workflow = self.get(id).await?;
        let activities = workflow.complete_step(step, completed_by, notes, auto_advance, Utc::now())?;
        self.save(&mut workflow, &activities, &[]).await?;

        if auto_advance && workflow.pending_automation().is_some() {
            return self.run_automation(workflow, completed_by).await;
        }
        Ok(workflow)
    }

    /// Starts a pending step out of order once its prerequisites are done
    pub async fn start_step(&self, id: WorkflowId, step: StepName, started_by: &str) -> Result<WorkflowInstance, ClaimError> {
        let mut workflow = self.get(id).await?;
        let activities = workflow.start_step(step, started_by, Utc::now())?;
        self.save(&mut workflow, &activities, &[]).await?;
        Ok(workflow)
    }

    pub async fn fail_step(
        &self,
        id: WorkflowId,
        step: StepName,
        failed_by: &str,
        reason: &str,
    ) -> Result<WorkflowInstance, ClaimError> {
        let mut workflow = self.get(id).await?;
        let activities = workflow.fail_step(step, failed_by, reason, Utc::now())?;
        self.save(&mut workflow, &activities, &[]).await?;
        warn!(workflow_id = %id, step = %step, reason, "workflow step failed");
        Ok(workflow)
    }

    pub async fn skip_step(
        &self,
        id: WorkflowId,
        step: StepName,
        skipped_by: &str,
        reason: Option<String>,
    ) -> Result<WorkflowInstance, ClaimError> {
        let mut workflow = self.get(id).await?;
        let activities = workflow.skip_step(step, skipped_by, reason, Utc::now())?;
        self.save(&mut workflow, &activities, &[]).await?;
        self.run_automation(workflow, skipped_by).await
    }

    pub async fn retry_step(&self, id: WorkflowId, step: StepName, retried_by: &str) -> Result<WorkflowInstance, ClaimError> {
        let mut workflow = self.get(id).await?;
        let activities = workflow.retry_step(step, retried_by, Utc::now())?;
        self.save(&mut workflow, &activities, &[]).await?;
        self.run_automation(workflow, retried_by).await
    }

    pub async fn cancel(&self, id: WorkflowId, cancelled_by: &str, reason: Option<String>) -> Result<WorkflowInstance, ClaimError> {
        let mut workflow = self.get(id).await?;
        let activities = workflow.cancel(cancelled_by, reason, Utc::now())?;
        self.save(&mut workflow, &activities, &[]).await?;
        info!(workflow_id = %id, "claims workflow cancelled");
        Ok(workflow)
    }

    /// Runs automated steps until a manual step, a failure or completion
    pub async fn process_automated_steps(&self, id: WorkflowId, triggered_by: &str) -> Result<WorkflowInstance, ClaimError> {
        let workflow = self.get(id).await?;
        self.run_automation(workflow, triggered_by).await
    }

    async fn run_automation(&self, mut workflow: WorkflowInstance, triggered_by: &str) -> Result<WorkflowInstance, ClaimError> {
        while let Some(step) = workflow.pending_automation() {
            let now = Utc::now();
            match self.execute_step(&mut workflow, step, now).await {
                Ok(effects) => {
                    let notes = Some(format!("Automated step triggered by {triggered_by}"));
                    let activities = workflow.complete_step(step, SYSTEM_ACTOR, notes, true, now)?;
                    self.save(&mut workflow, &activities, &effects).await?;
                    info!(workflow_id = %workflow.id, step = %step, "automated step completed");
                }
                Err(error) if error.is_transient() => {
                    warn!(workflow_id = %workflow.id, step = %step, error = %error, "automated step deferred");
                    return Err(error);
                }
                Err(error) => {
                    warn!(workflow_id = %workflow.id, step = %step, error = %error, "automated step failed");
                    let effects = self.failure_effects(&workflow, step, &error, now).await?;
                    let activities = workflow.fail_step(step, SYSTEM_ACTOR, error.to_string(), now)?;
                    self.save(&mut workflow, &activities, &effects).await?;
                    break;
                }
            }
        }
        Ok(workflow)
    }

    /// Performs the work of an automated step, returning its side effects
    async fn execute_step(
        &self,
        workflow: &mut WorkflowInstance,
        step: StepName,
        now: DateTime<Utc>,
    ) -> Result<Vec<StepEffect>, ClaimError> {
        let mut claim = self.claims.get_claim(workflow.claim_id).await?;

        match step {
            StepName::ComplianceVerification => {
                self.claims.compliance_report(claim.id).await?.ensure_compliant()?;
                claim.set_compliance(ComplianceStatus::Verified, now);
                Ok(vec![StepEffect::UpdateClaim(claim)])
            }
            StepName::InvoiceGeneration => {
                // A rerun after a partial failure links the invoice that already exists
                if let Some(existing) = self.claims.store().invoice_for_claim(claim.id).await? {
                    workflow.invoice_id = Some(existing.id);
                    return Ok(Vec::new());
                }
                let invoice = self.claims.prepare_invoice(&claim, SYSTEM_ACTOR).await?;
                workflow.invoice_id = Some(invoice.id);
                Ok(vec![StepEffect::InsertInvoice(invoice)])
            }
            StepName::PaymentTracking => {
                let invoice_id = match workflow.invoice_id {
                    Some(id) => Some(id),
                    None => self.claims.store().invoice_for_claim(claim.id).await?.map(|i| i.id),
                };
                let tracking = PaymentTracking::start(&claim, invoice_id, Some(workflow.id), now);
                Ok(vec![StepEffect::InsertPaymentTracking(tracking)])
            }
            manual => Err(ClaimError::validation(format!("step {manual} is not automated"))),
        }
    }

    async fn failure_effects(
        &self,
        workflow: &WorkflowInstance,
        step: StepName,
        error: &ClaimError,
        now: DateTime<Utc>,
    ) -> Result<Vec<StepEffect>, ClaimError> {
        if step != StepName::ComplianceVerification || !matches!(error, ClaimError::ComplianceFailed { .. }) {
            return Ok(Vec::new());
        }
        let mut claim = self.claims.get_claim(workflow.claim_id).await?;
        claim.set_compliance(ComplianceStatus::Failed, now);
        Ok(vec![StepEffect::UpdateClaim(claim)])
    }
}

