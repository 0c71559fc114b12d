//! Job payloads and persisted job records

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use core_kernel::{BatchId, ClaimId, JobId};

use crate::queue::QueueName;
use crate::retry::RetryPolicy;

/// Recipient and text of an outbound notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Value,
}

impl Notification {
    pub fn new(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            message: message.into(),
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Structured payload per job type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    SubmitSingleClaim { claim_id: ClaimId },
    SubmitClaimBatch { batch_id: BatchId },
    ReconcileClaims,

    CheckLowStock,
    CheckExpiringItems,
    GenerateReorderReport,

    SendSms(Notification),
    SendEmail(Notification),
    SendOverdueReminder(Notification),

    DatabaseBackup {
        #[serde(default)]
        destination: Option<String>,
    },
    FileBackup {
        #[serde(default)]
        destination: Option<String>,
    },
}

impl JobPayload {
    pub fn queue(&self) -> QueueName {
        match self {
            JobPayload::SubmitSingleClaim { .. }
            | JobPayload::SubmitClaimBatch { .. }
            | JobPayload::ReconcileClaims => QueueName::Claims,
            JobPayload::CheckLowStock
            | JobPayload::CheckExpiringItems
            | JobPayload::GenerateReorderReport => QueueName::Inventory,
            JobPayload::SendSms(_)
            | JobPayload::SendEmail(_)
            | JobPayload::SendOverdueReminder(_) => QueueName::Notification,
            JobPayload::DatabaseBackup { .. } | JobPayload::FileBackup { .. } => QueueName::Backup,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobPayload::SubmitSingleClaim { .. } => "submit_single_claim",
            JobPayload::SubmitClaimBatch { .. } => "submit_claim_batch",
            JobPayload::ReconcileClaims => "reconcile_claims",
            JobPayload::CheckLowStock => "check_low_stock",
            JobPayload::CheckExpiringItems => "check_expiring_items",
            JobPayload::GenerateReorderReport => "generate_reorder_report",
            JobPayload::SendSms(_) => "send_sms",
            JobPayload::SendEmail(_) => "send_email",
            JobPayload::SendOverdueReminder(_) => "send_overdue_reminder",
            JobPayload::DatabaseBackup { .. } => "database_backup",
            JobPayload::FileBackup { .. } => "file_backup",
        }
    }

    /// Key shared by jobs that must not be queued twice at the same time
    pub fn unique_key(&self) -> Option<String> {
        match self {
            JobPayload::SubmitSingleClaim { claim_id } => Some(format!("{}:{}", self.name(), claim_id.as_uuid())),
            JobPayload::SubmitClaimBatch { batch_id } => Some(format!("{}:{}", self.name(), batch_id.as_uuid())),
            _ => None,
        }
    }
}

impl fmt::Display for JobPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.queue(), self.name())
    }
}

/// Queue-visible job states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    /// Attempts exhausted; kept on the dead-letter list
    Failed,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// A job as stored by the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub queue: QueueName,
    pub payload: JobPayload,
    pub state: JobState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub available_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub result: Option<Value>,
    pub worker: Option<String>,
    /// Deadline after which an active job is considered abandoned
    #[serde(default)]
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Held while the job is unfinished when enqueued as unique
    #[serde(default)]
    pub unique_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(payload: JobPayload, max_attempts: u32, available_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let state = if available_at > now {
            JobState::Delayed
        } else {
            JobState::Waiting
        };
        Self {
            id: JobId::new_v7(),
            queue: payload.queue(),
            payload,
            state,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            available_at,
            last_error: None,
            result: None,
            worker: None,
            lease_expires_at: None,
            unique_key: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state, JobState::Waiting | JobState::Delayed) && self.available_at <= now
    }

    /// Marks the job as picked up by a worker and counts the attempt
    pub fn activate(&mut self, worker: &str, now: DateTime<Utc>, lease: Duration) {
        self.state = JobState::Active;
        self.attempts += 1;
        self.worker = Some(worker.to_string());
        self.lease_expires_at = Some(now + lease);
        self.updated_at = now;
    }

    /// An active job whose worker stopped reporting before the lease ran out
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Active && self.lease_expires_at.is_some_and(|at| at <= now)
    }

    pub fn complete(&mut self, result: Option<Value>, now: DateTime<Utc>) {
        self.lease_expires_at = None;
        self.state = JobState::Completed;
        self.result = result;
        self.last_error = None;
        self.updated_at = now;
        self.finished_at = Some(now);
    }

    /// Records a failed attempt, scheduling a retry while attempts remain
    ///
    /// Returns true when the job was dead-lettered.
    pub fn fail(&mut self, error: &str, policy: &RetryPolicy, now: DateTime<Utc>) -> bool {
        self.last_error = Some(error.to_string());
        self.updated_at = now;
        self.worker = None;
        self.lease_expires_at = None;

        let limit = RetryPolicy {
            max_attempts: self.max_attempts.min(policy.max_attempts),
            ..*policy
        };
        match limit.next_attempt_at(self.attempts, now) {
            Some(at) => {
                self.state = JobState::Delayed;
                self.available_at = at;
                false
            }
            None => {
                self.state = JobState::Failed;
                self.finished_at = Some(now);
                true
            }
        }
    }
}

/// Per-state job counts for one queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue: String,
    pub display_name: String,
    pub waiting: u64,
    pub delayed: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

impl QueueStats {
    pub fn empty(queue: QueueName) -> Self {
        Self {
            queue: queue.as_str().to_string(),
            display_name: queue.display_name().to_string(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, state: JobState) {
        match state {
            JobState::Waiting => self.waiting += 1,
            JobState::Delayed => self.delayed += 1,
            JobState::Active => self.active += 1,
            JobState::Completed => self.completed += 1,
            JobState::Failed => self.failed += 1,
        }
    }
}
