//! Domain Adapters
//!
//! PostgreSQL implementations of the domain ports. Each adapter:
//! - implements the domain's port trait
//! - translates between domain models and repository row types
//! - reports database connectivity through `HealthCheckable`
//!
//! ```rust,ignore
//! use infra_db::adapters::{PgClaimStore, PgWorkflowStore};
//!
//! let claims = Arc::new(ClaimsService::new(Arc::new(PgClaimStore::new(pool.clone())), gateway));
//! let workflows = WorkflowService::new(claims.clone(), Arc::new(PgWorkflowStore::new(pool)));
//! ```

pub mod claims;
pub mod workflow;
pub mod jobs;

pub use claims::PgClaimStore;
pub use workflow::PgWorkflowStore;
pub use jobs::{PgAuditLog, PgInventoryMonitor};
