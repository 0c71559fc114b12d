//! Background Jobs Domain
//!
//! Queue-based processing for the clinic: SHA claim submission and
//! reconciliation, inventory alerts, notifications and backups.
//!
//! Jobs are enqueued through the [`JobQueue`] port, picked up by the
//! [`WorkerRuntime`] and retried with capped exponential backoff until
//! their attempts run out. Recurring jobs are declared with cron
//! expressions and enqueued by the runtime's [`Scheduler`].

pub mod queue;
pub mod job;
pub mod retry;
pub mod schedule;
pub mod ports;
pub mod runtime;
pub mod error;

pub use queue::{QueueName, Retention};
pub use job::{JobPayload, JobRecord, JobState, Notification, QueueStats};
pub use retry::RetryPolicy;
pub use schedule::{default_recurring_jobs, CronSchedule, RecurringJob};
pub use ports::{
    AuditEntry, AuditLog, Channel, ExpiringBatch, InventoryMonitor, JobHandler, JobQueue,
    LowStockItem, Notifier,
};
pub use runtime::{RuntimeConfig, Scheduler, WorkerRuntime};
pub use error::JobError;
