//! Claims workflow engine
//!
//! Each claim runs through nine named steps. Steps are gated by their
//! prerequisites; automated steps are executed by the service layer when
//! they become the current step.
//!
//! ```text
//! claim_creation -> clinical_review -> document_collection
//!   -> compliance_verification* -> invoice_generation* -> invoice_review
//!   -> invoice_printing -> claim_submission -> payment_tracking*
//!                                               (* automated)
//! ```
//!
//! The aggregate is pure: every transition mutates the instance in memory
//! and returns the activity entries describing it. Callers persist both in
//! one transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use core_kernel::{ActivityId, ClaimId, InvoiceId, WorkflowId, WorkflowStepId};
use crate::error::ClaimError;

/// Actor recorded for steps run by the engine itself
pub const SYSTEM_ACTOR: &str = "system";

text_enum! {
    /// The named steps of a claims workflow
    pub enum StepName {
        ClaimCreation => "claim_creation",
        ClinicalReview => "clinical_review",
        DocumentCollection => "document_collection",
        ComplianceVerification => "compliance_verification",
        InvoiceGeneration => "invoice_generation",
        InvoiceReview => "invoice_review",
        InvoicePrinting => "invoice_printing",
        ClaimSubmission => "claim_submission",
        PaymentTracking => "payment_tracking",
    }
}

/// Static configuration of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDefinition {
    pub name: StepName,
    pub order: u8,
    pub required: bool,
    pub automated: bool,
    pub estimated_minutes: u32,
    pub prerequisites: &'static [StepName],
}

/// Step definitions in execution order
pub const STEP_DEFINITIONS: [StepDefinition; 9] = [
    StepDefinition {
        name: StepName::ClaimCreation,
        order: 1,
        required: true,
        automated: false,
        estimated_minutes: 15,
        prerequisites: &[],
    },
    StepDefinition {
        name: StepName::ClinicalReview,
        order: 2,
        required: true,
        automated: false,
        estimated_minutes: 30,
        prerequisites: &[StepName::ClaimCreation],
    },
    StepDefinition {
        name: StepName::DocumentCollection,
        order: 3,
        required: true,
        automated: false,
        estimated_minutes: 20,
        prerequisites: &[StepName::ClinicalReview],
    },
    StepDefinition {
        name: StepName::ComplianceVerification,
        order: 4,
        required: true,
        automated: true,
        estimated_minutes: 5,
        prerequisites: &[StepName::DocumentCollection],
    },
    StepDefinition {
        name: StepName::InvoiceGeneration,
        order: 5,
        required: true,
        automated: true,
        estimated_minutes: 2,
        prerequisites: &[StepName::ComplianceVerification],
    },
    StepDefinition {
        name: StepName::InvoiceReview,
        order: 6,
        required: true,
        automated: false,
        estimated_minutes: 15,
        prerequisites: &[StepName::InvoiceGeneration],
    },
    StepDefinition {
        name: StepName::InvoicePrinting,
        order: 7,
        required: true,
        automated: false,
        estimated_minutes: 5,
        prerequisites: &[StepName::InvoiceReview],
    },
    StepDefinition {
        name: StepName::ClaimSubmission,
        order: 8,
        required: true,
        automated: false,
        estimated_minutes: 10,
        prerequisites: &[StepName::InvoicePrinting],
    },
    StepDefinition {
        name: StepName::PaymentTracking,
        order: 9,
        required: false,
        automated: true,
        estimated_minutes: 1,
        prerequisites: &[StepName::ClaimSubmission],
    },
];

impl StepName {
    pub fn definition(&self) -> &'static StepDefinition {
        // STEP_DEFINITIONS is indexed by declaration order
        let index = StepName::ALL.iter().position(|s| s == self).unwrap_or(0);
        &STEP_DEFINITIONS[index]
    }
}

text_enum! {
    pub enum StepStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Skipped => "skipped",
        Failed => "failed",
    }
}

impl StepStatus {
    /// Completed or skipped steps satisfy prerequisites
    pub fn is_done(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }
}

text_enum! {
    pub enum WorkflowStatus {
        NotStarted => "not_started",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Activity log actions
    pub enum ActivityAction {
        WorkflowStarted => "WORKFLOW_STARTED",
        StepStarted => "STEP_STARTED",
        StepCompleted => "STEP_COMPLETED",
        StepSkipped => "STEP_SKIPPED",
        StepFailed => "STEP_FAILED",
        StepRetried => "STEP_RETRIED",
        WorkflowCompleted => "WORKFLOW_COMPLETED",
        WorkflowCancelled => "WORKFLOW_CANCELLED",
    }
}

/// One step row of a workflow instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: WorkflowStepId,
    pub workflow_id: WorkflowId,
    pub step: StepName,
    pub step_order: u8,
    pub status: StepStatus,
    pub is_required: bool,
    pub is_automated: bool,
    pub estimated_minutes: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub actual_minutes: Option<i64>,
    pub notes: Option<String>,
}

impl WorkflowStep {
    fn from_definition(workflow_id: WorkflowId, def: &StepDefinition) -> Self {
        Self {
            id: WorkflowStepId::new_v7(),
            workflow_id,
            step: def.name,
            step_order: def.order,
            status: StepStatus::Pending,
            is_required: def.required,
            is_automated: def.automated,
            estimated_minutes: def.estimated_minutes,
            started_at: None,
            completed_at: None,
            completed_by: None,
            actual_minutes: None,
            notes: None,
        }
    }
}

/// Append-only audit entry for a workflow transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowActivity {
    pub id: ActivityId,
    pub workflow_id: WorkflowId,
    pub step: Option<StepName>,
    pub action: ActivityAction,
    pub performed_by: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A per-claim execution of the step sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: WorkflowId,
    pub claim_id: ClaimId,
    pub status: WorkflowStatus,
    pub current_step: Option<StepName>,
    pub initiated_by: String,
    pub invoice_id: Option<InvoiceId>,
    pub notes: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic lock counter, bumped by the store on every save
    pub version: u32,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowInstance {
    /// Creates the instance with all steps and starts `claim_creation`
    pub fn initialize(
        claim_id: ClaimId,
        initiated_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(Self, Vec<WorkflowActivity>), ClaimError> {
        let id = WorkflowId::new_v7();
        let initiated_by = initiated_by.into();
        let mut workflow = Self {
            id,
            claim_id,
            status: WorkflowStatus::NotStarted,
            current_step: None,
            initiated_by: initiated_by.clone(),
            invoice_id: None,
            notes: None,
            started_at: now,
            completed_at: None,
            updated_at: now,
            version: 0,
            steps: STEP_DEFINITIONS
                .iter()
                .map(|def| WorkflowStep::from_definition(id, def))
                .collect(),
        };

        workflow.status = WorkflowStatus::InProgress;
        let mut activities = vec![workflow.activity(
            None,
            ActivityAction::WorkflowStarted,
            &initiated_by,
            json!({ "claim_id": claim_id }),
            now,
        )];
        activities.extend(workflow.start_step(StepName::ClaimCreation, &initiated_by, now)?);
        Ok((workflow, activities))
    }

    pub fn step(&self, name: StepName) -> Result<&WorkflowStep, ClaimError> {
        self.steps
            .iter()
            .find(|s| s.step == name)
            .ok_or_else(|| ClaimError::StepNotFound(name.to_string()))
    }

    fn step_mut(&mut self, name: StepName) -> Result<&mut WorkflowStep, ClaimError> {
        self.steps
            .iter_mut()
            .find(|s| s.step == name)
            .ok_or_else(|| ClaimError::StepNotFound(name.to_string()))
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, WorkflowStatus::InProgress | WorkflowStatus::Failed)
    }

    /// Hours from start to completion, for completed workflows
    pub fn duration_hours(&self) -> Option<f64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_seconds() as f64 / 3600.0)
    }

    /// Hours from start to completion, or to `now` while still open
    pub fn elapsed_hours(&self, now: DateTime<Utc>) -> f64 {
        (self.completed_at.unwrap_or(now) - self.started_at).num_seconds() as f64 / 3600.0
    }

    fn ensure_in_progress(&self) -> Result<(), ClaimError> {
        if self.status == WorkflowStatus::InProgress {
            Ok(())
        } else {
            Err(ClaimError::WorkflowClosed(self.status.to_string()))
        }
    }

    fn missing_prerequisites(&self, name: StepName) -> Vec<String> {
        name.definition()
            .prerequisites
            .iter()
            .filter(|p| !self.step(**p).map(|s| s.status.is_done()).unwrap_or(false))
            .map(|p| p.to_string())
            .collect()
    }

    /// Starts a pending step whose prerequisites are done
    pub fn start_step(
        &mut self,
        name: StepName,
        by: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowActivity>, ClaimError> {
        self.ensure_in_progress()?;
        let status = self.step(name)?.status;
        if status != StepStatus::Pending {
            return Err(ClaimError::StepState {
                step: name.to_string(),
                status: status.to_string(),
                expected: "pending",
            });
        }
        let missing = self.missing_prerequisites(name);
        if !missing.is_empty() {
            return Err(ClaimError::PrerequisitesNotMet {
                step: name.to_string(),
                missing,
            });
        }

        let step = self.step_mut(name)?;
        step.status = StepStatus::InProgress;
        step.started_at = Some(now);
        self.current_step = Some(name);
        self.updated_at = now;

        Ok(vec![self.activity(Some(name), ActivityAction::StepStarted, by, json!({}), now)])
    }

    /// Completes an in-progress step, optionally starting the next one
    pub fn complete_step(
        &mut self,
        name: StepName,
        by: &str,
        notes: Option<String>,
        auto_advance: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowActivity>, ClaimError> {
        self.ensure_in_progress()?;
        let step = self.step_mut(name)?;
        if step.status != StepStatus::InProgress {
            return Err(ClaimError::StepState {
                step: name.to_string(),
                status: step.status.to_string(),
                expected: "in_progress",
            });
        }

        let actual_minutes = step.started_at.map(|s| (now - s).num_minutes());
        step.status = StepStatus::Completed;
        step.completed_at = Some(now);
        step.completed_by = Some(by.to_string());
        step.actual_minutes = actual_minutes;
        if notes.is_some() {
            step.notes = notes.clone();
        }
        self.updated_at = now;

        let mut activities = vec![self.activity(
            Some(name),
            ActivityAction::StepCompleted,
            by,
            json!({ "actual_minutes": actual_minutes, "notes": notes }),
            now,
        )];

        if auto_advance {
            activities.extend(self.advance(by, now)?);
        } else {
            activities.extend(self.complete_if_finished(by, now));
        }
        Ok(activities)
    }

    /// Skips a non-required step
    pub fn skip_step(
        &mut self,
        name: StepName,
        by: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowActivity>, ClaimError> {
        self.ensure_in_progress()?;
        let step = self.step_mut(name)?;
        if step.is_required {
            return Err(ClaimError::RequiredStep(name.to_string()));
        }
        if !matches!(step.status, StepStatus::Pending | StepStatus::InProgress) {
            return Err(ClaimError::StepState {
                step: name.to_string(),
                status: step.status.to_string(),
                expected: "pending or in_progress",
            });
        }
        step.status = StepStatus::Skipped;
        step.completed_at = Some(now);
        step.completed_by = Some(by.to_string());
        step.notes = reason.clone();
        self.updated_at = now;

        let mut activities = vec![self.activity(
            Some(name),
            ActivityAction::StepSkipped,
            by,
            json!({ "reason": reason }),
            now,
        )];
        if self.current_step == Some(name) {
            activities.extend(self.advance(by, now)?);
        } else {
            activities.extend(self.complete_if_finished(by, now));
        }
        Ok(activities)
    }

    /// Marks an in-progress step failed, which halts the workflow
    pub fn fail_step(
        &mut self,
        name: StepName,
        by: &str,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowActivity>, ClaimError> {
        self.ensure_in_progress()?;
        let reason = reason.into();
        let step = self.step_mut(name)?;
        if step.status != StepStatus::InProgress {
            return Err(ClaimError::StepState {
                step: name.to_string(),
                status: step.status.to_string(),
                expected: "in_progress",
            });
        }
        step.status = StepStatus::Failed;
        step.notes = Some(reason.clone());
        self.status = WorkflowStatus::Failed;
        self.updated_at = now;

        Ok(vec![self.activity(
            Some(name),
            ActivityAction::StepFailed,
            by,
            json!({ "error": reason }),
            now,
        )])
    }

    /// Puts a failed step back in progress
    pub fn retry_step(
        &mut self,
        name: StepName,
        by: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowActivity>, ClaimError> {
        if !self.is_active() {
            return Err(ClaimError::WorkflowClosed(self.status.to_string()));
        }
        let step = self.step_mut(name)?;
        if step.status != StepStatus::Failed {
            return Err(ClaimError::StepState {
                step: name.to_string(),
                status: step.status.to_string(),
                expected: "failed",
            });
        }
        let previous_error = step.notes.take();
        step.status = StepStatus::InProgress;
        step.started_at = Some(now);
        self.status = WorkflowStatus::InProgress;
        self.current_step = Some(name);
        self.updated_at = now;

        Ok(vec![self.activity(
            Some(name),
            ActivityAction::StepRetried,
            by,
            json!({ "previous_error": previous_error }),
            now,
        )])
    }

    /// Cancels an unfinished workflow
    pub fn cancel(
        &mut self,
        by: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowActivity>, ClaimError> {
        if matches!(self.status, WorkflowStatus::Completed | WorkflowStatus::Cancelled) {
            return Err(ClaimError::WorkflowClosed(self.status.to_string()));
        }
        self.status = WorkflowStatus::Cancelled;
        self.notes = reason.clone();
        self.completed_at = Some(now);
        self.updated_at = now;

        Ok(vec![self.activity(
            self.current_step,
            ActivityAction::WorkflowCancelled,
            by,
            json!({ "reason": reason }),
            now,
        )])
    }

    /// The current step, if it is in progress and automated
    pub fn pending_automation(&self) -> Option<StepName> {
        if self.status != WorkflowStatus::InProgress {
            return None;
        }
        let current = self.current_step?;
        let step = self.step(current).ok()?;
        (step.is_automated && step.status == StepStatus::InProgress).then_some(current)
    }

    /// Starts the next ready step or completes the workflow
    fn advance(&mut self, by: &str, now: DateTime<Utc>) -> Result<Vec<WorkflowActivity>, ClaimError> {
        let next = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending)
            .min_by_key(|s| s.step_order)
            .map(|s| s.step)
            .filter(|name| self.missing_prerequisites(*name).is_empty());

        match next {
            Some(name) => self.start_step(name, by, now),
            None => Ok(self.complete_if_finished(by, now)),
        }
    }

    fn complete_if_finished(&mut self, by: &str, now: DateTime<Utc>) -> Vec<WorkflowActivity> {
        if !self.steps.iter().all(|s| s.status.is_done()) {
            return Vec::new();
        }
        self.status = WorkflowStatus::Completed;
        self.current_step = None;
        self.completed_at = Some(now);
        self.updated_at = now;

        let duration_hours = self.duration_hours();
        vec![self.activity(
            None,
            ActivityAction::WorkflowCompleted,
            by,
            json!({ "duration_hours": duration_hours }),
            now,
        )]
    }

    fn activity(
        &self,
        step: Option<StepName>,
        action: ActivityAction,
        by: &str,
        details: serde_json::Value,
        now: DateTime<Utc>,
    ) -> WorkflowActivity {
        WorkflowActivity {
            id: ActivityId::new_v7(),
            workflow_id: self.id,
            step,
            action,
            performed_by: by.to_string(),
            details,
            created_at: now,
        }
    }
}

/// Filter for listing workflows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowFilter {
    pub status: Option<WorkflowStatus>,
    pub claim_id: Option<ClaimId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl WorkflowFilter {
    pub fn between(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self {
            from,
            to,
            ..Default::default()
        }
    }

    pub fn matches(&self, workflow: &WorkflowInstance) -> bool {
        self.status.map_or(true, |s| workflow.status == s)
            && self.claim_id.map_or(true, |c| workflow.claim_id == c)
            && self.from.map_or(true, |f| workflow.started_at >= f)
            && self.to.map_or(true, |t| workflow.started_at <= t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn started() -> (WorkflowInstance, DateTime<Utc>) {
        let now = Utc::now();
        let (wf, _) = WorkflowInstance::initialize(ClaimId::new(), "clerk", now).unwrap();
        (wf, now)
    }

    #[test]
    fn test_definitions_are_ordered() {
        for (i, def) in STEP_DEFINITIONS.iter().enumerate() {
            assert_eq!(def.order as usize, i + 1);
            assert_eq!(def.name, StepName::ALL[i]);
            assert_eq!(def.name.definition(), def);
        }
        assert!(!StepName::PaymentTracking.definition().required);
    }

    #[test]
    fn test_initialize_starts_first_step() {
        let now = Utc::now();
        let (wf, activities) = WorkflowInstance::initialize(ClaimId::new(), "clerk", now).unwrap();
        assert_eq!(wf.status, WorkflowStatus::InProgress);
        assert_eq!(wf.current_step, Some(StepName::ClaimCreation));
        assert_eq!(wf.steps.len(), 9);
        assert_eq!(wf.step(StepName::ClaimCreation).unwrap().status, StepStatus::InProgress);
        let actions: Vec<_> = activities.iter().map(|a| a.action).collect();
        assert_eq!(actions, vec![ActivityAction::WorkflowStarted, ActivityAction::StepStarted]);
    }

    #[test]
    fn test_complete_records_duration_and_advances() {
        let (mut wf, now) = started();
        let later = now + Duration::minutes(12);
        let activities = wf
            .complete_step(StepName::ClaimCreation, "clerk", Some("ok".into()), true, later)
            .unwrap();

        let step = wf.step(StepName::ClaimCreation).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.actual_minutes, Some(12));
        assert_eq!(step.completed_by.as_deref(), Some("clerk"));
        assert_eq!(wf.current_step, Some(StepName::ClinicalReview));
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[1].step, Some(StepName::ClinicalReview));
    }

    #[test]
    fn test_complete_requires_in_progress() {
        let (mut wf, now) = started();
        let result = wf.complete_step(StepName::ClinicalReview, "clerk", None, true, now);
        assert!(matches!(result, Err(ClaimError::StepState { .. })));
    }

    #[test]
    fn test_start_checks_prerequisites() {
        let (mut wf, now) = started();
        let result = wf.start_step(StepName::InvoiceReview, "clerk", now);
        match result {
            Err(ClaimError::PrerequisitesNotMet { missing, .. }) => {
                assert_eq!(missing, vec!["invoice_generation".to_string()]);
            }
            other => panic!("expected prerequisite error, got {other:?}"),
        }
    }

    #[test]
    fn test_required_step_cannot_be_skipped() {
        let (mut wf, now) = started();
        assert!(matches!(
            wf.skip_step(StepName::ClinicalReview, "clerk", None, now),
            Err(ClaimError::RequiredStep(_))
        ));
    }

    #[test]
    fn test_reaches_automation_after_document_collection() {
        let (mut wf, now) = started();
        for step in [StepName::ClaimCreation, StepName::ClinicalReview, StepName::DocumentCollection] {
            wf.complete_step(step, "clerk", None, true, now).unwrap();
        }
        assert_eq!(wf.pending_automation(), Some(StepName::ComplianceVerification));
    }

    #[test]
    fn test_fail_and_retry() {
        let (mut wf, now) = started();
        wf.fail_step(StepName::ClaimCreation, SYSTEM_ACTOR, "boom", now).unwrap();
        assert_eq!(wf.status, WorkflowStatus::Failed);
        assert!(wf.complete_step(StepName::ClaimCreation, "clerk", None, true, now).is_err());

        let activities = wf.retry_step(StepName::ClaimCreation, "clerk", now).unwrap();
        assert_eq!(activities[0].action, ActivityAction::StepRetried);
        assert_eq!(wf.status, WorkflowStatus::InProgress);
        assert_eq!(wf.step(StepName::ClaimCreation).unwrap().status, StepStatus::InProgress);
    }

    #[test]
    fn test_full_run_completes_workflow() {
        let (mut wf, now) = started();
        let mut last = Vec::new();
        for step in StepName::ALL {
            last = wf.complete_step(*step, "clerk", None, true, now).unwrap();
        }
        assert_eq!(wf.status, WorkflowStatus::Completed);
        assert_eq!(wf.current_step, None);
        assert_eq!(last.last().map(|a| a.action), Some(ActivityAction::WorkflowCompleted));
    }

    #[test]
    fn test_skipping_last_optional_step_completes() {
        let (mut wf, now) = started();
        for step in &StepName::ALL[..8] {
            wf.complete_step(*step, "clerk", None, true, now).unwrap();
        }
        wf.skip_step(StepName::PaymentTracking, "clerk", Some("cash patient".into()), now)
            .unwrap();
        assert_eq!(wf.status, WorkflowStatus::Completed);
    }

    #[test]
    fn test_cancel_twice_fails() {
        let (mut wf, now) = started();
        wf.cancel("manager", Some("duplicate".into()), now).unwrap();
        assert_eq!(wf.status, WorkflowStatus::Cancelled);
        assert!(wf.cancel("manager", None, now).is_err());
        assert!(wf.start_step(StepName::ClinicalReview, "clerk", now).is_err());
    }

    #[test]
    fn test_filter() {
        let (wf, now) = started();
        assert!(WorkflowFilter::default().matches(&wf));
        assert!(WorkflowFilter::between(Some(now - Duration::hours(1)), None).matches(&wf));
        let completed_only = WorkflowFilter {
            status: Some(WorkflowStatus::Completed),
            ..Default::default()
        };
        assert!(!completed_only.matches(&wf));
    }
}
