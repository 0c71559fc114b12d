//! Repository implementations
//!
//! Repositories own the SQL. Each one exposes `FromRow` row types that
//! mirror its tables; the adapters in [`crate::adapters`] map those rows
//! onto domain types.
//!
//! Writes that take part in multi-table transactions are associated
//! functions generic over `PgExecutor`, so the same statement runs against
//! the pool or a `&mut Transaction`.

pub mod claims;
pub mod workflow;
pub mod audit;
pub mod inventory;

pub use claims::ClaimsRepository;
pub use workflow::WorkflowRepository;
pub use audit::AuditRepository;
pub use inventory::InventoryRepository;
