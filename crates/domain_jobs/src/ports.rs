//! Job Queue Ports
//!
//! The worker runtime depends only on these traits. The Redis queue lives in
//! `infra_queue`, the PostgreSQL inventory and audit adapters in `infra_db`,
//! and in-memory fakes in `test_utils`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use core_kernel::{AuditEventId, DomainPort, JobId, PortError};

use crate::error::JobError;
use crate::job::{JobPayload, JobRecord, Notification, QueueStats};
use crate::queue::QueueName;
use crate::retry::RetryPolicy;

/// Durable queue of background jobs
#[async_trait]
pub trait JobQueue: DomainPort {
    /// Adds a job that is available immediately
    async fn enqueue(&self, payload: JobPayload) -> Result<JobRecord, PortError>;

    /// Adds a job that becomes available at `at`
    async fn enqueue_at(&self, payload: JobPayload, at: DateTime<Utc>) -> Result<JobRecord, PortError>;

    /// Adds a job unless an unfinished job holds the same
    /// [`JobPayload::unique_key`]; returns `None` in that case. Payloads
    /// without a key are always added.
    async fn enqueue_unique(&self, payload: JobPayload) -> Result<Option<JobRecord>, PortError>;

    /// Atomically takes the oldest due job of the queue and marks it active
    /// under a lease
    async fn dequeue(&self, queue: QueueName, worker: &str) -> Result<Option<JobRecord>, PortError>;

    /// Returns active jobs whose lease ran out to the queue, counting the
    /// abandoned run as a failed attempt under `policy`
    async fn requeue_expired(&self, queue: QueueName, policy: &RetryPolicy) -> Result<Vec<JobRecord>, PortError>;

    async fn complete(&self, id: JobId, result: Option<Value>) -> Result<JobRecord, PortError>;

    /// Records a failed attempt; the job is rescheduled or dead-lettered
    async fn fail(&self, id: JobId, error: &str, policy: &RetryPolicy) -> Result<JobRecord, PortError>;

    async fn stats(&self, queue: QueueName) -> Result<QueueStats, PortError>;

    /// Returns true for exactly one caller per recurring job and fire time
    async fn claim_recurring_fire(&self, name: &str, fire_time: DateTime<Utc>) -> Result<bool, PortError>;

    /// Gives up a claimed fire so the next tick can enqueue it again
    async fn release_recurring_fire(&self, name: &str, fire_time: DateTime<Utc>) -> Result<(), PortError>;

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, PortError>;
}

/// Executes jobs taken off a queue
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Runs the job, returning an optional result stored on the record
    async fn handle(&self, job: &JobRecord) -> Result<Option<Value>, JobError>;
}

/// An inventory item at or below its reorder level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockItem {
    pub item_id: Uuid,
    pub name: String,
    pub current_stock: i64,
    pub reorder_level: i64,
}

/// A stocked batch that expires soon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiringBatch {
    pub batch_id: Uuid,
    pub item_id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub expiry_date: NaiveDate,
}

/// Read-only view of the clinic inventory tables
#[async_trait]
pub trait InventoryMonitor: DomainPort {
    /// Items whose unexpired stock is at or below the reorder level, or absent
    async fn low_stock_items(&self, today: NaiveDate) -> Result<Vec<LowStockItem>, PortError>;

    /// Batches with stock left that expire between `today` and `today + within_days`
    async fn expiring_batches(&self, today: NaiveDate, within_days: u32) -> Result<Vec<ExpiringBatch>, PortError>;
}

/// A row for the shared audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEventId,
    pub user_id: Option<String>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, target_type: impl Into<String>, details: Value, now: DateTime<Utc>) -> Self {
        Self {
            id: AuditEventId::new(),
            user_id: None,
            action: action.into(),
            target_type: target_type.into(),
            target_id: None,
            details,
            created_at: now,
        }
    }
}

#[async_trait]
pub trait AuditLog: DomainPort {
    async fn record(&self, entry: &AuditEntry) -> Result<(), PortError>;
}

/// Delivery channel of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

/// Outbound email and SMS delivery
#[async_trait]
pub trait Notifier: DomainPort {
    async fn deliver(&self, channel: Channel, notification: &Notification) -> Result<(), PortError>;
}
