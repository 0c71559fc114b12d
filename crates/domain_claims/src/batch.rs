//! Claim batches submitted to SHA together

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, ClaimId, Currency, Money};
use crate::claim::ShaClaim;
use crate::error::ClaimError;

text_enum! {
    /// How the batch window is chosen
    pub enum BatchType {
        Weekly => "weekly",
        Monthly => "monthly",
        Custom => "custom",
    }
}

text_enum! {
    /// Batch status
    pub enum BatchStatus {
        Draft => "draft",
        Submitted => "submitted",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Which claims a new batch picks up
///
/// Only `ReadyToSubmit` claims without a batch are ever eligible; the
/// selection narrows that set further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchSelection {
    /// Claims created in `[from, to)`
    CreatedBetween {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// Exactly these claims, where eligible
    Explicit(Vec<ClaimId>),
}

impl BatchSelection {
    /// Resolves the selection window for a batch type
    ///
    /// Weekly covers the seven days before the batch date, monthly runs from
    /// the first of the batch month. Custom batches use the given ids or, with
    /// none given, the last 24 hours.
    pub fn for_batch(
        batch_type: BatchType,
        batch_date: NaiveDate,
        claim_ids: Vec<ClaimId>,
        now: DateTime<Utc>,
    ) -> Self {
        let end_of_day = start_of(batch_date + Duration::days(1));
        match batch_type {
            BatchType::Weekly => BatchSelection::CreatedBetween {
                from: start_of(batch_date - Duration::days(7)),
                to: end_of_day,
            },
            BatchType::Monthly => BatchSelection::CreatedBetween {
                from: start_of(batch_date.with_day(1).unwrap_or(batch_date)),
                to: end_of_day,
            },
            BatchType::Custom if !claim_ids.is_empty() => BatchSelection::Explicit(claim_ids),
            BatchType::Custom => BatchSelection::CreatedBetween {
                from: now - Duration::hours(24),
                to: now,
            },
        }
    }

    /// Returns true if the claim belongs in the batch
    pub fn matches(&self, claim: &ShaClaim) -> bool {
        if !claim.is_batch_eligible() {
            return false;
        }
        match self {
            BatchSelection::CreatedBetween { from, to } => {
                claim.created_at >= *from && claim.created_at < *to
            }
            BatchSelection::Explicit(ids) => ids.contains(&claim.id),
        }
    }
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Input for creating a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBatch {
    pub batch_type: BatchType,
    pub batch_date: NaiveDate,
    #[serde(default)]
    pub claim_ids: Vec<ClaimId>,
    pub created_by: String,
}

/// A group of claims submitted to SHA together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimBatch {
    pub id: BatchId,
    pub batch_number: String,
    pub batch_date: NaiveDate,
    pub batch_type: BatchType,
    pub status: BatchStatus,
    pub total_claims: u32,
    pub total_amount: Money,
    pub is_printed: bool,
    pub printed_by: Option<String>,
    pub printed_at: Option<DateTime<Utc>>,
    pub sha_batch_reference: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClaimBatch {
    /// Creates a draft batch over the selected claims
    pub fn create(
        batch_number: String,
        input: &NewBatch,
        claims: &[ShaClaim],
        now: DateTime<Utc>,
    ) -> Result<Self, ClaimError> {
        if claims.is_empty() {
            return Err(ClaimError::EmptyBatch);
        }
        let currency = claims.first().map(|c| c.currency()).unwrap_or(Currency::KES);
        let total_amount = Money::sum(currency, claims.iter().map(|c| &c.claim_amount))?;

        Ok(Self {
            id: BatchId::new_v7(),
            batch_number,
            batch_date: input.batch_date,
            batch_type: input.batch_type,
            status: BatchStatus::Draft,
            total_claims: claims.len() as u32,
            total_amount,
            is_printed: false,
            printed_by: None,
            printed_at: None,
            sha_batch_reference: None,
            submitted_at: None,
            created_by: input.created_by.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Fails unless the batch is still a draft
    pub fn ensure_draft(&self) -> Result<(), ClaimError> {
        if self.status == BatchStatus::Draft {
            Ok(())
        } else {
            Err(ClaimError::BatchNotDraft {
                batch_number: self.batch_number.clone(),
                status: self.status.to_string(),
            })
        }
    }

    pub fn mark_submitted(&mut self, reference: Option<String>, now: DateTime<Utc>) -> Result<(), ClaimError> {
        self.ensure_draft()?;
        self.status = BatchStatus::Submitted;
        self.sha_batch_reference = reference;
        self.submitted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_printed(&mut self, by: impl Into<String>, now: DateTime<Utc>) {
        self.is_printed = true;
        self.printed_by = Some(by.into());
        self.printed_at = Some(now);
        self.updated_at = now;
    }
}
