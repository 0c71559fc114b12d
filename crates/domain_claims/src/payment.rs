//! Payment tracking for submitted claims

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClaimId, InvoiceId, Money, TrackingId, WorkflowId};
use crate::claim::{ClaimStatus, ShaClaim};

/// Interval between automatic payment checks
pub const CHECK_INTERVAL_HOURS: i64 = 24;

text_enum! {
    /// Payment state as last seen from SHA
    pub enum PaymentStatus {
        Pending => "pending",
        Approved => "approved",
        Paid => "paid",
        Rejected => "rejected",
    }
}

impl From<ClaimStatus> for PaymentStatus {
    fn from(status: ClaimStatus) -> Self {
        match status {
            ClaimStatus::Approved => PaymentStatus::Approved,
            ClaimStatus::Paid => PaymentStatus::Paid,
            ClaimStatus::Rejected => PaymentStatus::Rejected,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Periodic payment check for a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTracking {
    pub id: TrackingId,
    pub claim_id: ClaimId,
    pub invoice_id: Option<InvoiceId>,
    pub workflow_id: Option<WorkflowId>,
    pub expected_amount: Money,
    pub approved_amount: Option<Money>,
    pub payment_status: PaymentStatus,
    pub auto_check_enabled: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub next_check_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PaymentTracking {
    /// Starts tracking with the first check one interval from now
    pub fn start(
        claim: &ShaClaim,
        invoice_id: Option<InvoiceId>,
        workflow_id: Option<WorkflowId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TrackingId::new_v7(),
            claim_id: claim.id,
            invoice_id,
            workflow_id,
            expected_amount: claim.claim_amount,
            approved_amount: claim.approved_amount,
            payment_status: claim.status.into(),
            auto_check_enabled: true,
            last_checked_at: None,
            next_check_at: Some(now + Duration::hours(CHECK_INTERVAL_HOURS)),
            created_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.auto_check_enabled && self.next_check_at.is_some_and(|at| at <= now)
    }

    /// Records a check against the claim's current state
    ///
    /// Settled claims stop being checked; everything else is rescheduled.
    pub fn record_check(&mut self, claim: &ShaClaim, now: DateTime<Utc>) {
        self.payment_status = claim.status.into();
        self.approved_amount = claim.approved_amount;
        self.last_checked_at = Some(now);
        if claim.status.is_settled() {
            self.auto_check_enabled = false;
            self.next_check_at = None;
        } else {
            self.next_check_at = Some(now + Duration::hours(CHECK_INTERVAL_HOURS));
        }
    }
}
