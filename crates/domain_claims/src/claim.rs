//! SHA claim aggregate

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, ClaimId, Currency, Money, PatientId, UserId, VisitId};
use crate::error::ClaimError;

text_enum! {
    /// Claim status
    ///
    /// ```text
    /// Draft -> ReadyToSubmit -> Submitted -> Approved -> Paid
    ///   ^                           |------> Rejected
    ///   |                           |------> Paid
    ///   +---------- rework ---------- Rejected
    /// ```
    pub enum ClaimStatus {
        Draft => "draft",
        ReadyToSubmit => "ready_to_submit",
        Submitted => "submitted",
        Approved => "approved",
        Rejected => "rejected",
        Paid => "paid",
    }
}

impl ClaimStatus {
    /// Checks if transition is valid
    pub fn can_transition_to(self, target: ClaimStatus) -> bool {
        use ClaimStatus::*;
        matches!(
            (self, target),
            (Draft, ReadyToSubmit) |
            (ReadyToSubmit, Submitted) |
            (Submitted, Approved) |
            (Submitted, Rejected) |
            (Submitted, Paid) |
            (Approved, Paid) |
            (Rejected, Draft)
        )
    }

    /// Status reported by SHA that ends the reconciliation loop for a claim
    pub fn is_settled(self) -> bool {
        matches!(self, ClaimStatus::Paid | ClaimStatus::Rejected)
    }
}

text_enum! {
    /// Outcome of the document compliance check
    pub enum ComplianceStatus {
        Pending => "pending",
        Verified => "verified",
        Failed => "failed",
    }
}

/// ICD-10 diagnosis attached to a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub code: String,
    pub description: String,
}

impl Diagnosis {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

text_enum! {
    /// Category of a service line; some categories call for extra documents
    pub enum ServiceType {
        Consultation => "CONSULTATION",
        Laboratory => "LABORATORY",
        Pharmacy => "PHARMACY",
        Inpatient => "INPATIENT",
        Procedure => "PROCEDURE",
        Imaging => "IMAGING",
        Other => "OTHER",
    }
}

/// A billable service line on a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceItem {
    pub service_code: Option<String>,
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
}

impl ServiceItem {
    /// Creates a line whose total is quantity times unit price
    pub fn new(description: impl Into<String>, quantity: u32, unit_price: Money) -> Self {
        Self {
            service_code: None,
            service_type: None,
            description: description.into(),
            quantity,
            total: unit_price.multiply(Decimal::from(quantity)),
            unit_price,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.service_code = Some(code.into());
        self
    }

    pub fn with_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = Some(service_type);
        self
    }
}

/// Input for creating a claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClaim {
    pub patient_id: PatientId,
    pub visit_id: VisitId,
    pub patient_name: String,
    pub member_number: String,
    pub visit_date: NaiveDate,
    pub primary_diagnosis: Diagnosis,
    pub secondary_diagnoses: Vec<Diagnosis>,
    pub services: Vec<ServiceItem>,
    pub claim_amount: Money,
    pub notes: Option<String>,
    pub created_by: UserId,
}

impl NewClaim {
    /// Validates member number, diagnosis and amounts
    pub fn validate(&self) -> Result<(), ClaimError> {
        if !is_valid_member_number(&self.member_number) {
            return Err(ClaimError::validation("SHA member number must be exactly 9 digits"));
        }
        if self.patient_name.trim().is_empty() {
            return Err(ClaimError::validation("patient name is required"));
        }
        if self.primary_diagnosis.code.trim().is_empty()
            || self.primary_diagnosis.description.trim().is_empty()
        {
            return Err(ClaimError::validation("primary diagnosis code and description are required"));
        }
        if !self.claim_amount.is_positive() {
            return Err(ClaimError::validation("claim amount must be positive"));
        }

        if self.services.is_empty() {
            return Ok(());
        }

        for item in &self.services {
            if item.quantity == 0 {
                return Err(ClaimError::validation(format!(
                    "service '{}' has zero quantity",
                    item.description
                )));
            }
            let expected = item.unit_price.multiply(Decimal::from(item.quantity));
            if expected != item.total {
                return Err(ClaimError::validation(format!(
                    "service '{}' total {} does not equal {} x {}",
                    item.description, item.total, item.quantity, item.unit_price
                )));
            }
        }

        let services_total = Money::sum(
            self.claim_amount.currency(),
            self.services.iter().map(|s| &s.total),
        )?;
        if services_total != self.claim_amount {
            return Err(ClaimError::validation(format!(
                "service lines total {} but claim amount is {}",
                services_total, self.claim_amount
            )));
        }

        Ok(())
    }
}

/// Editable fields of an existing claim
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimUpdate {
    pub claim_amount: Option<Money>,
    pub notes: Option<String>,
}

impl ClaimUpdate {
    pub fn is_empty(&self) -> bool {
        self.claim_amount.is_none() && self.notes.is_none()
    }
}

/// Returns true for a 9 digit SHA member number
pub fn is_valid_member_number(value: &str) -> bool {
    value.len() == 9 && value.bytes().all(|b| b.is_ascii_digit())
}

/// A claim submitted to SHA for reimbursement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaClaim {
    pub id: ClaimId,
    pub claim_number: String,
    pub patient_id: PatientId,
    pub visit_id: VisitId,
    pub patient_name: String,
    pub member_number: String,
    pub visit_date: NaiveDate,
    pub primary_diagnosis: Diagnosis,
    pub secondary_diagnoses: Vec<Diagnosis>,
    pub services: Vec<ServiceItem>,
    pub claim_amount: Money,
    pub approved_amount: Option<Money>,
    pub status: ClaimStatus,
    pub compliance_status: ComplianceStatus,
    pub batch_id: Option<BatchId>,
    pub sha_reference: Option<String>,
    pub submission_date: Option<DateTime<Utc>>,
    pub approval_date: Option<DateTime<Utc>>,
    pub last_reconciled_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShaClaim {
    /// Creates a draft claim after validating the input
    pub fn create(new: NewClaim, claim_number: String, now: DateTime<Utc>) -> Result<Self, ClaimError> {
        new.validate()?;

        Ok(Self {
            id: ClaimId::new_v7(),
            claim_number,
            patient_id: new.patient_id,
            visit_id: new.visit_id,
            patient_name: new.patient_name,
            member_number: new.member_number,
            visit_date: new.visit_date,
            primary_diagnosis: new.primary_diagnosis,
            secondary_diagnoses: new.secondary_diagnoses,
            services: new.services,
            claim_amount: new.claim_amount,
            approved_amount: None,
            status: ClaimStatus::Draft,
            compliance_status: ComplianceStatus::Pending,
            batch_id: None,
            sha_reference: None,
            submission_date: None,
            approval_date: None,
            last_reconciled_at: None,
            rejection_reason: None,
            notes: new.notes,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn currency(&self) -> Currency {
        self.claim_amount.currency()
    }

    /// Moves the claim to a new status
    pub fn transition_to(&mut self, target: ClaimStatus, now: DateTime<Utc>) -> Result<(), ClaimError> {
        if !self.status.can_transition_to(target) {
            return Err(ClaimError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    /// Records a successful SHA submission
    pub fn mark_submitted(&mut self, reference: Option<String>, now: DateTime<Utc>) -> Result<(), ClaimError> {
        self.transition_to(ClaimStatus::Submitted, now)?;
        if reference.is_some() {
            self.sha_reference = reference;
        }
        self.submission_date = Some(now);
        self.rejection_reason = None;
        Ok(())
    }

    /// Sends a rejected claim back to draft so it can be corrected and
    /// resubmitted. Everything SHA returned for the previous attempt is
    /// cleared except the rejection reason.
    pub fn rework(&mut self, now: DateTime<Utc>) -> Result<(), ClaimError> {
        if self.status != ClaimStatus::Rejected {
            return Err(ClaimError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: ClaimStatus::Draft.to_string(),
            });
        }
        self.transition_to(ClaimStatus::Draft, now)?;
        self.compliance_status = ComplianceStatus::Pending;
        self.batch_id = None;
        self.sha_reference = None;
        self.submission_date = None;
        self.approval_date = None;
        self.approved_amount = None;
        self.last_reconciled_at = None;
        Ok(())
    }

    /// Applies edits; the amount is only editable while the claim is a draft
    pub fn apply_update(&mut self, update: ClaimUpdate, now: DateTime<Utc>) -> Result<(), ClaimError> {
        if let Some(amount) = update.claim_amount {
            if self.status != ClaimStatus::Draft {
                return Err(self.locked());
            }
            if !amount.is_positive() {
                return Err(ClaimError::validation("claim amount must be positive"));
            }
            if amount.currency() != self.currency() {
                return Err(ClaimError::validation(format!(
                    "claim amount must be in {}",
                    self.currency()
                )));
            }
            if !self.services.is_empty() {
                let services_total = Money::sum(self.currency(), self.services.iter().map(|s| &s.total))?;
                if services_total != amount {
                    return Err(ClaimError::validation(format!(
                        "service lines total {} but claim amount is {}",
                        services_total, amount
                    )));
                }
            }
            self.claim_amount = amount;
        }
        if let Some(notes) = update.notes {
            self.notes = Some(notes);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Only claims that never reached SHA and sit outside a batch can be deleted
    pub fn ensure_deletable(&self) -> Result<(), ClaimError> {
        let open = matches!(self.status, ClaimStatus::Draft | ClaimStatus::ReadyToSubmit);
        if !open || self.is_batched() {
            return Err(self.locked());
        }
        Ok(())
    }

    fn locked(&self) -> ClaimError {
        ClaimError::ClaimLocked {
            claim_number: self.claim_number.clone(),
            status: self.status.to_string(),
        }
    }

    pub fn set_compliance(&mut self, status: ComplianceStatus, now: DateTime<Utc>) {
        self.compliance_status = status;
        self.updated_at = now;
    }

    pub fn is_batched(&self) -> bool {
        self.batch_id.is_some()
    }

    /// Claims that can be picked up by a new batch
    pub fn is_batch_eligible(&self) -> bool {
        self.status == ClaimStatus::ReadyToSubmit && !self.is_batched()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_claim() -> NewClaim {
        let consult = ServiceItem::new("Consultation", 1, Money::kes(dec!(1500)));
        let lab = ServiceItem::new("Full haemogram", 2, Money::kes(dec!(800)));
        NewClaim {
            patient_id: PatientId::new(),
            visit_id: VisitId::new(),
            patient_name: "Wanjiku Kamau".to_string(),
            member_number: "123456789".to_string(),
            visit_date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            primary_diagnosis: Diagnosis::new("B54", "Unspecified malaria"),
            secondary_diagnoses: vec![],
            services: vec![consult, lab],
            claim_amount: Money::kes(dec!(3100)),
            notes: None,
            created_by: UserId::new(),
        }
    }

    #[test]
    fn test_create_claim_starts_in_draft() {
        let claim = ShaClaim::create(new_claim(), "SHA-202403-000001".into(), Utc::now()).unwrap();
        assert_eq!(claim.status, ClaimStatus::Draft);
        assert_eq!(claim.compliance_status, ComplianceStatus::Pending);
        assert!(claim.sha_reference.is_none());
    }

    #[test]
    fn test_member_number_must_be_nine_digits() {
        assert!(is_valid_member_number("000000001"));
        assert!(!is_valid_member_number("12345678"));
        assert!(!is_valid_member_number("12345678a"));

        let mut input = new_claim();
        input.member_number = "1234".into();
        assert!(matches!(input.validate(), Err(ClaimError::Validation(_))));
    }

    #[test]
    fn test_service_lines_must_sum_to_claim_amount() {
        let mut input = new_claim();
        input.claim_amount = Money::kes(dec!(3000));
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_service_line_total_must_match_quantity() {
        let mut input = new_claim();
        input.services[1].total = Money::kes(dec!(800));
        input.claim_amount = Money::kes(dec!(2300));
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_claim_without_lines_only_needs_positive_amount() {
        let mut input = new_claim();
        input.services.clear();
        assert!(input.validate().is_ok());

        input.claim_amount = Money::kes(dec!(0));
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_transitions() {
        use ClaimStatus::*;
        assert!(Draft.can_transition_to(ReadyToSubmit));
        assert!(Submitted.can_transition_to(Paid));
        assert!(Rejected.can_transition_to(Draft));
        assert!(!Draft.can_transition_to(Submitted));
        assert!(!Paid.can_transition_to(Draft));
        assert!(!Approved.can_transition_to(Rejected));
    }

    #[test]
    fn test_mark_submitted_requires_ready_claim() {
        let now = Utc::now();
        let mut claim = ShaClaim::create(new_claim(), "SHA-202403-000002".into(), now).unwrap();
        assert!(claim.mark_submitted(Some("REF-1".into()), now).is_err());

        claim.transition_to(ClaimStatus::ReadyToSubmit, now).unwrap();
        claim.mark_submitted(Some("REF-1".into()), now).unwrap();
        assert_eq!(claim.status, ClaimStatus::Submitted);
        assert_eq!(claim.sha_reference.as_deref(), Some("REF-1"));
        assert_eq!(claim.submission_date, Some(now));
    }

    #[test]
    fn test_submission_clears_previous_rejection_reason() {
        let now = Utc::now();
        let mut claim = ShaClaim::create(new_claim(), "SHA-202403-000003".into(), now).unwrap();
        claim.rejection_reason = Some("Missing discharge summary".into());
        claim.transition_to(ClaimStatus::ReadyToSubmit, now).unwrap();
        claim.mark_submitted(Some("REF-2".into()), now).unwrap();
        assert!(claim.rejection_reason.is_none());
    }

    #[test]
    fn test_rework_resets_rejected_claim() {
        let now = Utc::now();
        let mut claim = ShaClaim::create(new_claim(), "SHA-202403-000004".into(), now).unwrap();
        claim.transition_to(ClaimStatus::ReadyToSubmit, now).unwrap();
        claim.mark_submitted(Some("REF-3".into()), now).unwrap();
        claim.transition_to(ClaimStatus::Rejected, now).unwrap();
        claim.set_compliance(ComplianceStatus::Verified, now);
        claim.rejection_reason = Some("Invalid diagnosis".into());
        claim.last_reconciled_at = Some(now);

        claim.rework(now).unwrap();

        assert_eq!(claim.status, ClaimStatus::Draft);
        assert_eq!(claim.compliance_status, ComplianceStatus::Pending);
        assert!(claim.sha_reference.is_none());
        assert!(claim.submission_date.is_none());
        assert!(claim.last_reconciled_at.is_none());
        assert_eq!(claim.rejection_reason.as_deref(), Some("Invalid diagnosis"));
    }

    #[test]
    fn test_rework_only_applies_to_rejected_claims() {
        let now = Utc::now();
        let mut claim = ShaClaim::create(new_claim(), "SHA-202403-000005".into(), now).unwrap();
        assert!(matches!(claim.rework(now), Err(ClaimError::InvalidStatusTransition { .. })));
    }

    #[test]
    fn test_amount_update_must_match_service_lines() {
        let now = Utc::now();
        let mut claim = ShaClaim::create(new_claim(), "SHA-202403-000006".into(), now).unwrap();
        let update = ClaimUpdate { claim_amount: Some(Money::kes(dec!(5000))), notes: None };
        assert!(matches!(claim.apply_update(update, now), Err(ClaimError::Validation(_))));

        claim.services.clear();
        let update = ClaimUpdate { claim_amount: Some(Money::kes(dec!(5000))), notes: Some("revised".into()) };
        claim.apply_update(update, now).unwrap();
        assert_eq!(claim.claim_amount, Money::kes(dec!(5000)));
        assert_eq!(claim.notes.as_deref(), Some("revised"));
    }

    #[test]
    fn test_amount_is_locked_after_draft() {
        let now = Utc::now();
        let mut claim = ShaClaim::create(new_claim(), "SHA-202403-000007".into(), now).unwrap();
        claim.transition_to(ClaimStatus::ReadyToSubmit, now).unwrap();
        let update = ClaimUpdate { claim_amount: Some(Money::kes(dec!(3100))), notes: None };
        assert!(matches!(claim.apply_update(update, now), Err(ClaimError::ClaimLocked { .. })));

        let notes_only = ClaimUpdate { claim_amount: None, notes: Some("called patient".into()) };
        assert!(claim.apply_update(notes_only, now).is_ok());
    }

    #[test]
    fn test_submitted_and_batched_claims_cannot_be_deleted() {
        let now = Utc::now();
        let mut claim = ShaClaim::create(new_claim(), "SHA-202403-000008".into(), now).unwrap();
        assert!(claim.ensure_deletable().is_ok());

        claim.batch_id = Some(BatchId::new());
        assert!(claim.ensure_deletable().is_err());

        claim.batch_id = None;
        claim.transition_to(ClaimStatus::ReadyToSubmit, now).unwrap();
        claim.mark_submitted(None, now).unwrap();
        assert!(matches!(claim.ensure_deletable(), Err(ClaimError::ClaimLocked { .. })));
    }

    #[test]
    fn test_status_text_roundtrip() {
        for status in ClaimStatus::ALL {
            assert_eq!(status.as_str().parse::<ClaimStatus>().unwrap(), *status);
        }
        assert!("closed".parse::<ClaimStatus>().is_err());
    }
}
