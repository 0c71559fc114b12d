//! Inventory queries used by the worker's stock checks
//!
//! Stock is the sum of unexpired batch quantities per item.

use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct LowStockRow {
    pub item_id: Uuid,
    pub name: String,
    pub current_stock: Option<i64>,
    pub reorder_level: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct ExpiringBatchRow {
    pub batch_id: Uuid,
    pub item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub expiry_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active items whose unexpired stock is at or below the reorder level
    ///
    /// Items without any unexpired batch count as out of stock.
    pub async fn low_stock(&self, today: NaiveDate) -> Result<Vec<LowStockRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, LowStockRow>(
            r#"
            SELECT ii.id AS item_id,
                   ii.name,
                   SUM(ib.quantity)::BIGINT AS current_stock,
                   ii.reorder_level
            FROM inventory_items ii
            LEFT JOIN inventory_batches ib
                   ON ii.id = ib.item_id AND ib.expiry_date > $1
            WHERE ii.is_active
            GROUP BY ii.id, ii.name, ii.reorder_level
            HAVING SUM(ib.quantity) <= ii.reorder_level OR SUM(ib.quantity) IS NULL
            ORDER BY ii.name
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Batches with stock left that expire after `today` and on or before `until`
    pub async fn expiring(&self, today: NaiveDate, until: NaiveDate) -> Result<Vec<ExpiringBatchRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ExpiringBatchRow>(
            r#"
            SELECT ib.id AS batch_id,
                   ib.item_id,
                   ii.name,
                   ib.quantity,
                   ib.expiry_date
            FROM inventory_batches ib
            JOIN inventory_items ii ON ii.id = ib.item_id
            WHERE ib.expiry_date <= $2
              AND ib.expiry_date > $1
              AND ib.quantity > 0
            ORDER BY ib.expiry_date ASC, ii.name
            "#,
        )
        .bind(today)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
