//! Batch DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain_claims::{ClaimBatch, ShaClaim};

use crate::dto::claims::ClaimResponse;

#[derive(Debug, Deserialize)]
pub struct CreateBatchRequest {
    /// `weekly`, `monthly` or `custom`
    pub batch_type: String,
    /// Defaults to today
    pub batch_date: Option<NaiveDate>,
    #[serde(default)]
    pub claim_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchListQuery {
    pub status: Option<String>,
}

/// Batch date range for `GET /sha-batches/stats/summary`
#[derive(Debug, Default, Deserialize)]
pub struct BatchStatsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    #[serde(flatten)]
    pub batch: ClaimBatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<Vec<ClaimResponse>>,
}

impl BatchResponse {
    pub fn summary(batch: ClaimBatch) -> Self {
        Self { batch, claims: None }
    }

    pub fn with_claims(batch: ClaimBatch, claims: Vec<ShaClaim>) -> Self {
        Self {
            batch,
            claims: Some(claims.into_iter().map(ClaimResponse::from).collect()),
        }
    }
}
