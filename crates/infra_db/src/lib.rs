//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the clinic's SHA claims, claims workflows,
//! audit log and inventory checks, using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: [`repositories`] hold the SQL
//! and row types, [`adapters`] implement the domain ports on top of them.
//! Multi-row changes (batch creation, batch submission, workflow
//! transitions) run in a single transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PgClaimStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/clinic")).await?;
//! run_migrations(&pool).await?;
//! let store = PgClaimStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use adapters::{PgAuditLog, PgClaimStore, PgInventoryMonitor, PgWorkflowStore};
