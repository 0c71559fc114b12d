//! Workflow DTOs

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub claim_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkflowListQuery {
    pub status: Option<String>,
    pub claim_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteStepRequest {
    pub notes: Option<String>,
    /// Run the automated steps that follow; on by default
    pub auto_advance: Option<bool>,
}

/// Body for skip and cancel
#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}
