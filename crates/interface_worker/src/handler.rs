//! Job dispatch for the clinic worker
//!
//! [`ClinicJobHandler`] routes every [`JobPayload`] to the service or port
//! that does the work and returns a small JSON result for the job record.
//!
//! Failures are classified for the runtime:
//!
//! | Source                       | Retried                             |
//! |------------------------------|-------------------------------------|
//! | SHA submission / reconciling | when the gateway error is transient |
//! | Notifier, audit log, queue   | when the port error is transient    |
//! | `pg_dump` / `tar`            | unless the binary is missing        |

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use core_kernel::{BatchId, ClaimId};
use domain_claims::{ClaimError, ClaimsService};
use domain_jobs::{
    AuditEntry, AuditLog, Channel, InventoryMonitor, JobError, JobHandler, JobPayload, JobQueue, JobRecord,
    Notification, Notifier,
};

use crate::backup::{database_backup_file, file_backup_file, BackupError, BackupTool};

/// Days ahead an inventory batch counts as expiring
pub const EXPIRY_WINDOW_DAYS: u32 = 30;

/// Settings the handler needs besides its ports
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Recipient of inventory alerts
    pub admin_email: String,
    /// Database dumped by `database_backup`
    pub database_url: String,
    /// Default directory for database dumps
    pub backup_path: PathBuf,
    /// Directory archived by `file_backup`
    pub uploads_path: PathBuf,
    pub expiry_window_days: u32,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            admin_email: "admin@sethclinic.com".to_string(),
            database_url: "postgres://localhost/clinic".to_string(),
            backup_path: PathBuf::from("/tmp"),
            uploads_path: PathBuf::from("./uploads"),
            expiry_window_days: EXPIRY_WINDOW_DAYS,
        }
    }
}

fn claim_failure(error: ClaimError) -> JobError {
    if error.is_transient() {
        JobError::retryable(error.to_string())
    } else {
        JobError::permanent(error.to_string())
    }
}

fn backup_failure(error: BackupError) -> JobError {
    if error.is_retryable() {
        JobError::retryable(error.to_string())
    } else {
        JobError::permanent(error.to_string())
    }
}

/// Overdue reminders go by email when the recipient looks like an address
fn reminder_channel(notification: &Notification) -> Channel {
    if notification.recipient.contains('@') {
        Channel::Email
    } else {
        Channel::Sms
    }
}

/// Runs every job type known to the clinic worker
pub struct ClinicJobHandler {
    claims: Arc<ClaimsService>,
    queue: Arc<dyn JobQueue>,
    inventory: Arc<dyn InventoryMonitor>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditLog>,
    backups: Arc<dyn BackupTool>,
    settings: HandlerSettings,
}

impl ClinicJobHandler {
    pub fn new(
        claims: Arc<ClaimsService>,
        queue: Arc<dyn JobQueue>,
        inventory: Arc<dyn InventoryMonitor>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditLog>,
        backups: Arc<dyn BackupTool>,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            claims,
            queue,
            inventory,
            notifier,
            audit,
            backups,
            settings,
        }
    }

    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    // ---- claims ----

    async fn submit_claim(&self, claim_id: ClaimId, attempt: u32) -> Result<Value, JobError> {
        let claim = self
            .claims
            .submit_single_claim(claim_id, attempt.saturating_sub(1))
            .await
            .map_err(claim_failure)?;
        Ok(json!({
            "claim_number": claim.claim_number,
            "sha_reference": claim.sha_reference,
        }))
    }

    async fn submit_batch(&self, batch_id: BatchId, attempt: u32) -> Result<Value, JobError> {
        let batch = self
            .claims
            .submit_batch(batch_id, attempt.saturating_sub(1))
            .await
            .map_err(claim_failure)?;
        Ok(json!({
            "batch_number": batch.batch_number,
            "sha_batch_reference": batch.sha_batch_reference,
            "total_claims": batch.total_claims,
        }))
    }

    /// Polls SHA for submitted claims, then runs the due payment checks
    async fn reconcile(&self, now: DateTime<Utc>) -> Result<Value, JobError> {
        let claims = self.claims.reconcile_claims().await.map_err(claim_failure)?;
        let payments = self.claims.run_payment_checks(now).await.map_err(claim_failure)?;
        info!(
            checked = claims.checked,
            updated = claims.updated,
            failed = claims.failed,
            payments_checked = payments.checked,
            "claims reconciliation completed"
        );
        Ok(json!({ "claims": claims, "payments": payments }))
    }

    // ---- inventory ----

    async fn alert_admin(&self, message: String, metadata: Value) -> Result<(), JobError> {
        let notification = Notification::new(&self.settings.admin_email, message).with_metadata(metadata);
        self.queue.enqueue(JobPayload::SendEmail(notification)).await?;
        Ok(())
    }

    async fn check_low_stock(&self, now: DateTime<Utc>) -> Result<Value, JobError> {
        let items = self.inventory.low_stock_items(now.date_naive()).await?;
        for item in &items {
            self.alert_admin(
                format!(
                    "Low stock alert: {} (Current: {}, Reorder Level: {})",
                    item.name, item.current_stock, item.reorder_level
                ),
                json!({ "item_id": item.item_id, "alert_type": "low_stock" }),
            )
            .await?;
        }
        if !items.is_empty() {
            warn!(count = items.len(), "low stock alerts queued");
        }
        Ok(json!({ "low_stock_count": items.len() }))
    }

    async fn check_expiring_items(&self, now: DateTime<Utc>) -> Result<Value, JobError> {
        let window = self.settings.expiry_window_days;
        let batches = self.inventory.expiring_batches(now.date_naive(), window).await?;
        if !batches.is_empty() {
            self.alert_admin(
                format!("{} items expiring within {window} days", batches.len()),
                json!({ "alert_type": "expiring_items", "items": batches }),
            )
            .await?;
            warn!(count = batches.len(), "expiring items alert queued");
        }
        Ok(json!({ "expiring_count": batches.len() }))
    }

    async fn reorder_report(&self, now: DateTime<Utc>) -> Result<Value, JobError> {
        let items = self.inventory.low_stock_items(now.date_naive()).await?;
        for item in &items {
            info!(
                item = %item.name,
                current_stock = item.current_stock,
                reorder_level = item.reorder_level,
                "reorder needed"
            );
        }
        info!(count = items.len(), "reorder report generated");
        Ok(json!({ "items": items }))
    }

    // ---- notifications ----

    async fn send_notification(&self, channel: Channel, notification: &Notification) -> Result<Value, JobError> {
        self.notifier.deliver(channel, notification).await?;
        let entry = AuditEntry::new(
            "send_notification",
            channel.as_str(),
            json!({
                "recipient": notification.recipient,
                "message": notification.message,
                "metadata": notification.metadata,
            }),
            Utc::now(),
        );
        self.audit.record(&entry).await?;
        Ok(json!({ "channel": channel, "recipient": notification.recipient }))
    }

    // ---- backups ----

    async fn database_backup(&self, destination: Option<&str>, now: DateTime<Utc>) -> Result<Value, JobError> {
        let backup_path = destination
            .map(PathBuf::from)
            .unwrap_or_else(|| self.settings.backup_path.clone());
        let backup_file = database_backup_file(now);
        self.backups
            .dump_database(&self.settings.database_url, &backup_path.join(&backup_file))
            .await
            .map_err(backup_failure)?;

        let details = json!({
            "backup_file": backup_file,
            "backup_path": backup_path.display().to_string(),
        });
        self.audit
            .record(&AuditEntry::new("database_backup", "system", details.clone(), now))
            .await?;
        info!(file = %backup_file, path = %backup_path.display(), "database backup created");
        Ok(details)
    }

    async fn file_backup(&self, destination: Option<&str>, now: DateTime<Utc>) -> Result<Value, JobError> {
        let backup_path = destination
            .map(PathBuf::from)
            .unwrap_or_else(|| self.settings.backup_path.clone());
        let backup_file = file_backup_file(now);
        self.backups
            .archive_directory(&self.settings.uploads_path, &backup_path.join(&backup_file))
            .await
            .map_err(backup_failure)?;

        let details = json!({
            "backup_file": backup_file,
            "backup_path": backup_path.display().to_string(),
            "source": self.settings.uploads_path.display().to_string(),
        });
        self.audit
            .record(&AuditEntry::new("file_backup", "system", details.clone(), now))
            .await?;
        info!(file = %backup_file, path = %backup_path.display(), "file backup created");
        Ok(details)
    }
}

#[async_trait]
impl JobHandler for ClinicJobHandler {
    #[instrument(skip(self, job), fields(job_id = %job.id, job = %job.payload, attempt = job.attempts))]
    async fn handle(&self, job: &JobRecord) -> Result<Option<Value>, JobError> {
        let now = Utc::now();
        let result = match &job.payload {
            JobPayload::SubmitSingleClaim { claim_id } => self.submit_claim(*claim_id, job.attempts).await?,
            JobPayload::SubmitClaimBatch { batch_id } => self.submit_batch(*batch_id, job.attempts).await?,
            JobPayload::ReconcileClaims => self.reconcile(now).await?,
            JobPayload::CheckLowStock => self.check_low_stock(now).await?,
            JobPayload::CheckExpiringItems => self.check_expiring_items(now).await?,
            JobPayload::GenerateReorderReport => self.reorder_report(now).await?,
            JobPayload::SendEmail(notification) => self.send_notification(Channel::Email, notification).await?,
            JobPayload::SendSms(notification) => self.send_notification(Channel::Sms, notification).await?,
            JobPayload::SendOverdueReminder(notification) => {
                self.send_notification(reminder_channel(notification), notification).await?
            }
            JobPayload::DatabaseBackup { destination } => self.database_backup(destination.as_deref(), now).await?,
            JobPayload::FileBackup { destination } => self.file_backup(destination.as_deref(), now).await?,
        };
        Ok(Some(result))
    }
}
