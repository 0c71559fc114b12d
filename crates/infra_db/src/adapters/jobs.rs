//! PostgreSQL adapters for the worker's audit log and inventory checks

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use sqlx::PgPool;
use tracing::debug;

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_jobs::{AuditEntry, AuditLog, ExpiringBatch, InventoryMonitor, LowStockItem};

use crate::adapters::claims::ping;
use crate::error::DatabaseError;
use crate::repositories::audit::{AuditRepository, AuditRow};
use crate::repositories::inventory::{ExpiringBatchRow, InventoryRepository, LowStockRow};

/// Writes worker audit entries to `audit_logs`
#[derive(Debug, Clone)]
pub struct PgAuditLog {
    repository: AuditRepository,
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: AuditRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn repository(&self) -> &AuditRepository {
        &self.repository
    }
}

impl DomainPort for PgAuditLog {}

#[async_trait]
impl HealthCheckable for PgAuditLog {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-audit-adapter").await
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn record(&self, entry: &AuditEntry) -> Result<(), PortError> {
        let row = AuditRow {
            id: entry.id.into(),
            user_id: entry.user_id.clone(),
            action: entry.action.clone(),
            target_type: entry.target_type.clone(),
            target_id: entry.target_id.clone(),
            details: entry.details.clone(),
            created_at: entry.created_at,
        };
        self.repository.insert(&row).await?;
        Ok(())
    }
}

/// Reads stock levels and expiry dates from the inventory tables
#[derive(Debug, Clone)]
pub struct PgInventoryMonitor {
    repository: InventoryRepository,
    pool: PgPool,
}

impl PgInventoryMonitor {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: InventoryRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PgInventoryMonitor {}

#[async_trait]
impl HealthCheckable for PgInventoryMonitor {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-inventory-adapter").await
    }
}

#[async_trait]
impl InventoryMonitor for PgInventoryMonitor {
    async fn low_stock_items(&self, today: NaiveDate) -> Result<Vec<LowStockItem>, PortError> {
        let rows = self.repository.low_stock(today).await?;
        debug!(count = rows.len(), "Low stock items found");
        Ok(rows.into_iter().map(low_stock_item).collect())
    }

    async fn expiring_batches(&self, today: NaiveDate, within_days: u32) -> Result<Vec<ExpiringBatch>, PortError> {
        let until = today
            .checked_add_days(Days::new(u64::from(within_days)))
            .ok_or_else(|| DatabaseError::decode(format!("{today} + {within_days} days is out of range")))?;
        let rows = self.repository.expiring(today, until).await?;
        Ok(rows.into_iter().map(expiring_batch).collect())
    }
}

fn low_stock_item(row: LowStockRow) -> LowStockItem {
    LowStockItem {
        item_id: row.item_id,
        name: row.name,
        current_stock: row.current_stock.unwrap_or(0),
        reorder_level: i64::from(row.reorder_level),
    }
}

fn expiring_batch(row: ExpiringBatchRow) -> ExpiringBatch {
    ExpiringBatch {
        batch_id: row.batch_id,
        item_id: row.item_id,
        name: row.name,
        quantity: i64::from(row.quantity),
        expiry_date: row.expiry_date,
    }
}
