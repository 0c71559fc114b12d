//! Background Worker
//!
//! Job handlers for the clinic's four queues and the wiring for the
//! `clinic-worker` binary.
//!
//! # Queues
//!
//! | Queue          | Jobs                                                        |
//! |----------------|-------------------------------------------------------------|
//! | `claims`       | SHA claim and batch submission, claims reconciliation       |
//! | `inventory`    | low stock and expiry alerts, reorder report                 |
//! | `notification` | email, SMS and overdue reminders                            |
//! | `backup`       | `pg_dump` database dumps, archives of uploaded files        |
//!
//! The [`domain_jobs::WorkerRuntime`] polls each queue and hands jobs to
//! [`ClinicJobHandler`]; recurring jobs come from
//! [`domain_jobs::default_recurring_jobs`].
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_worker::{ClinicJobHandler, CommandBackupTool, LoggingNotifier};
//!
//! let handler = ClinicJobHandler::new(
//!     claims, queue.clone(), inventory, Arc::new(LoggingNotifier), audit,
//!     Arc::new(CommandBackupTool), config.handler_settings(),
//! );
//! let runtime = Arc::new(WorkerRuntime::new(queue, Arc::new(handler), config.runtime()));
//! runtime.run(scheduler, shutdown_rx).await;
//! ```

pub mod backup;
pub mod config;
pub mod handler;
pub mod notifier;

pub use backup::{BackupError, BackupTool, CommandBackupTool};
pub use config::WorkerConfig;
pub use handler::{ClinicJobHandler, HandlerSettings, EXPIRY_WINDOW_DAYS};
pub use notifier::LoggingNotifier;
