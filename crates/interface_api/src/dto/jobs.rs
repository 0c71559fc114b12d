//! Job DTOs

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use domain_jobs::{JobRecord, JobState};

/// A queued job as seen by API clients
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub queue: String,
    pub name: String,
    pub state: JobState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub available_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<JobRecord> for JobResponse {
    fn from(job: JobRecord) -> Self {
        Self {
            id: *job.id.as_uuid(),
            queue: job.queue.as_str().to_string(),
            name: job.payload.name().to_string(),
            state: job.state,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            available_at: job.available_at,
            last_error: job.last_error,
            result: job.result,
            created_at: job.created_at,
            finished_at: job.finished_at,
        }
    }
}
