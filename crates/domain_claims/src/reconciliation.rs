//! Applying SHA status responses to claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::Money;
use crate::claim::{ClaimStatus, ShaClaim};
use crate::submission::ShaStatusResponse;

/// Counters reported by a reconciliation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub checked: u32,
    pub updated: u32,
    pub failed: u32,
}

/// Maps an SHA status string onto a claim status
///
/// `pending` and anything unrecognised return `None`.
pub fn map_sha_status(status: &str) -> Option<ClaimStatus> {
    match status.to_ascii_lowercase().as_str() {
        "approved" => Some(ClaimStatus::Approved),
        "rejected" => Some(ClaimStatus::Rejected),
        "paid" => Some(ClaimStatus::Paid),
        _ => None,
    }
}

/// Applies an SHA status to the claim, returning true when it changed
pub fn apply_sha_status(claim: &mut ShaClaim, response: &ShaStatusResponse, now: DateTime<Utc>) -> bool {
    claim.last_reconciled_at = Some(now);

    let Some(target) = map_sha_status(&response.status) else {
        return false;
    };
    if target == claim.status || !claim.status.can_transition_to(target) {
        return false;
    }

    claim.status = target;
    claim.updated_at = now;
    if let Some(amount) = response.approved_amount {
        claim.approved_amount = Some(Money::new(amount, claim.currency()));
    }
    if matches!(target, ClaimStatus::Approved | ClaimStatus::Paid) && claim.approval_date.is_none() {
        claim.approval_date = Some(now);
    }
    if target == ClaimStatus::Rejected {
        claim.rejection_reason = response.rejection_reason.clone();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{Diagnosis, NewClaim};
    use chrono::NaiveDate;
    use core_kernel::{PatientId, UserId, VisitId};
    use rust_decimal_macros::dec;

    fn submitted_claim() -> ShaClaim {
        let input = NewClaim {
            patient_id: PatientId::new(),
            visit_id: VisitId::new(),
            patient_name: "Achieng Njeri".into(),
            member_number: "555666777".into(),
            visit_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            primary_diagnosis: Diagnosis::new("A09", "Gastroenteritis"),
            secondary_diagnoses: vec![],
            services: vec![],
            claim_amount: Money::kes(dec!(2400)),
            notes: None,
            created_by: UserId::new(),
        };
        let now = Utc::now();
        let mut claim = ShaClaim::create(input, "SHA-202406-000010".into(), now).unwrap();
        claim.transition_to(ClaimStatus::ReadyToSubmit, now).unwrap();
        claim.mark_submitted(Some("REF-10".into()), now).unwrap();
        claim
    }

    fn response(status: &str) -> ShaStatusResponse {
        ShaStatusResponse {
            status: status.into(),
            approved_amount: Some(dec!(2000)),
            rejection_reason: Some("Member not eligible".into()),
        }
    }

    #[test]
    fn test_approved_sets_amount_and_date() {
        let mut claim = submitted_claim();
        assert!(apply_sha_status(&mut claim, &response("approved"), Utc::now()));
        assert_eq!(claim.status, ClaimStatus::Approved);
        assert_eq!(claim.approved_amount, Some(Money::kes(dec!(2000))));
        assert!(claim.approval_date.is_some());
        assert!(claim.rejection_reason.is_none());
    }

    #[test]
    fn test_rejected_records_reason() {
        let mut claim = submitted_claim();
        assert!(apply_sha_status(&mut claim, &response("REJECTED"), Utc::now()));
        assert_eq!(claim.status, ClaimStatus::Rejected);
        assert_eq!(claim.rejection_reason.as_deref(), Some("Member not eligible"));
        assert!(claim.approval_date.is_none());
    }

    #[test]
    fn test_pending_and_unknown_leave_claim_alone() {
        let mut claim = submitted_claim();
        assert!(!apply_sha_status(&mut claim, &response("pending"), Utc::now()));
        assert!(!apply_sha_status(&mut claim, &response("queued"), Utc::now()));
        assert_eq!(claim.status, ClaimStatus::Submitted);
        assert!(claim.last_reconciled_at.is_some());
    }

    #[test]
    fn test_approved_then_paid() {
        let mut claim = submitted_claim();
        apply_sha_status(&mut claim, &response("approved"), Utc::now());
        let approved_on = claim.approval_date;
        assert!(apply_sha_status(&mut claim, &response("paid"), Utc::now()));
        assert_eq!(claim.status, ClaimStatus::Paid);
        assert_eq!(claim.approval_date, approved_on);
    }
}
