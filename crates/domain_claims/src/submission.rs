//! SHA wire payloads and the submission log

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, ClaimId, SubmissionLogId};
use crate::batch::ClaimBatch;
use crate::claim::{Diagnosis, ShaClaim};

/// Service line as SHA expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaServiceLine {
    pub code: Option<String>,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

/// Body of `POST /claims/submit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaClaimPayload {
    pub claim_number: String,
    pub member_number: String,
    pub visit_date: NaiveDate,
    pub diagnosis: Diagnosis,
    pub services: Vec<ShaServiceLine>,
    pub total_amount: Decimal,
    pub provider_code: String,
}

impl ShaClaimPayload {
    pub fn from_claim(claim: &ShaClaim, provider_code: &str) -> Self {
        Self {
            claim_number: claim.claim_number.clone(),
            member_number: claim.member_number.clone(),
            visit_date: claim.visit_date,
            diagnosis: claim.primary_diagnosis.clone(),
            services: claim
                .services
                .iter()
                .map(|s| ShaServiceLine {
                    code: s.service_code.clone(),
                    description: s.description.clone(),
                    quantity: s.quantity,
                    unit_price: s.unit_price.round_to_currency().amount(),
                    total: s.total.round_to_currency().amount(),
                })
                .collect(),
            total_amount: claim.claim_amount.round_to_currency().amount(),
            provider_code: provider_code.to_string(),
        }
    }
}

/// Body of `POST /claims/batch-submit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaBatchPayload {
    pub batch_number: String,
    pub batch_date: NaiveDate,
    pub provider_code: String,
    pub claims: Vec<ShaClaimPayload>,
    pub total_claims: u32,
    pub total_amount: Decimal,
}

impl ShaBatchPayload {
    /// Builds the payload over the given claims; totals follow the claims sent
    pub fn from_batch(batch: &ClaimBatch, claims: &[ShaClaim], provider_code: &str) -> Self {
        Self {
            batch_number: batch.batch_number.clone(),
            batch_date: batch.batch_date,
            provider_code: provider_code.to_string(),
            claims: claims
                .iter()
                .map(|c| ShaClaimPayload::from_claim(c, provider_code))
                .collect(),
            total_claims: claims.len() as u32,
            total_amount: claims.iter().map(|c| c.claim_amount.round_to_currency().amount()).sum(),
        }
    }
}

/// Response of the submit endpoints
///
/// SHA has returned the reference under different keys over time, so all
/// of them are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaSubmissionResponse {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub claim_reference: Option<String>,
    #[serde(default)]
    pub batch_reference: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ShaSubmissionResponse {
    pub fn claim_reference(&self) -> Option<String> {
        self.reference.clone().or_else(|| self.claim_reference.clone())
    }

    pub fn batch_reference(&self) -> Option<String> {
        self.batch_reference.clone().or_else(|| self.reference.clone())
    }
}

/// Response of the status endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaStatusResponse {
    pub status: String,
    #[serde(default)]
    pub approved_amount: Option<Decimal>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

text_enum! {
    pub enum SubmissionType {
        Single => "single",
        Batch => "batch",
    }
}

text_enum! {
    pub enum SubmissionStatus {
        Pending => "pending",
        Success => "success",
        Failed => "failed",
    }
}

/// Audit record of one outbound submission attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionLog {
    pub id: SubmissionLogId,
    pub claim_id: Option<ClaimId>,
    pub batch_id: Option<BatchId>,
    pub submission_type: SubmissionType,
    pub status: SubmissionStatus,
    pub request_payload: serde_json::Value,
    pub response_payload: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SubmissionLog {
    pub fn pending(
        submission_type: SubmissionType,
        claim_id: Option<ClaimId>,
        batch_id: Option<BatchId>,
        request_payload: serde_json::Value,
        retry_count: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SubmissionLogId::new_v7(),
            claim_id,
            batch_id,
            submission_type,
            status: SubmissionStatus::Pending,
            request_payload,
            response_payload: None,
            error_message: None,
            retry_count,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn succeed(&mut self, response: serde_json::Value, now: DateTime<Utc>) {
        self.status = SubmissionStatus::Success;
        self.response_payload = Some(response);
        self.completed_at = Some(now);
    }

    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = SubmissionStatus::Failed;
        self.error_message = Some(error.into());
        self.completed_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_fallbacks() {
        let response: ShaSubmissionResponse =
            serde_json::from_str(r#"{"claim_reference":"SHA-REF-9"}"#).unwrap();
        assert_eq!(response.claim_reference().as_deref(), Some("SHA-REF-9"));
        assert_eq!(response.batch_reference(), None);

        let response: ShaSubmissionResponse =
            serde_json::from_str(r#"{"reference":"R1","batch_reference":"B1"}"#).unwrap();
        assert_eq!(response.claim_reference().as_deref(), Some("R1"));
        assert_eq!(response.batch_reference().as_deref(), Some("B1"));
    }

    #[test]
    fn test_log_lifecycle() {
        let now = Utc::now();
        let mut log = SubmissionLog::pending(
            SubmissionType::Single,
            Some(ClaimId::new()),
            None,
            serde_json::json!({"claim_number": "SHA-202401-000001"}),
            0,
            now,
        );
        assert_eq!(log.status, SubmissionStatus::Pending);

        log.fail("Service unavailable: sha", now);
        assert_eq!(log.status, SubmissionStatus::Failed);
        assert_eq!(log.completed_at, Some(now));
    }
}
