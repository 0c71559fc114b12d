//! Core Kernel - Foundational types shared by the SHA claims workspace
//!
//! This crate provides the building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Strongly typed identifiers
//! - Port error and health-check types for adapters

pub mod money;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use identifiers::{
    PatientId, VisitId, UserId, ClaimId, DocumentId, InvoiceId, BatchId,
    SubmissionLogId, TrackingId, WorkflowId, WorkflowStepId, ActivityId,
    JobId, AuditEventId,
};
pub use ports::{
    PortError, DomainPort, CircuitBreakerConfig, AdapterHealth,
    HealthCheckResult, HealthCheckable,
};
