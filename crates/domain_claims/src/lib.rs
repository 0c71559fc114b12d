//! SHA Claims Domain
//!
//! This crate implements the Social Health Authority claims lifecycle for the
//! clinic, from claim creation through reconciliation with SHA.
//!
//! # Claim Lifecycle
//!
//! ```text
//! Draft -> (documents verified) -> invoice generated -> printed
//!       -> ReadyToSubmit -> Submitted (single or batch) -> Approved/Rejected -> Paid
//! Rejected -> rework -> Draft (invoice voided, documents re-verified)
//! ```
//!
//! The per-claim workflow engine in [`workflow`] tracks the same journey as
//! nine named steps, three of which run automatically.

#[macro_use]
mod macros;

pub mod claim;
pub mod document;
pub mod invoice;
pub mod batch;
pub mod numbering;
pub mod submission;
pub mod reconciliation;
pub mod payment;
pub mod workflow;
pub mod statistics;
pub mod ports;
pub mod adapters;
pub mod services;
pub mod error;

pub use claim::{
    ClaimStatus, ClaimUpdate, ComplianceStatus, Diagnosis, NewClaim, ServiceItem, ServiceType, ShaClaim,
};
pub use document::{
    ChecklistItem, ChecklistStatus, ChecklistSummary, ComplianceReport, DocumentAttachment,
    DocumentChecklist, DocumentType,
};
pub use invoice::{InvoiceStatus, ShaInvoice};
pub use batch::{BatchSelection, BatchStatus, BatchType, ClaimBatch, NewBatch};
pub use numbering::NumberKind;
pub use submission::{
    ShaBatchPayload, ShaClaimPayload, ShaStatusResponse, ShaSubmissionResponse, SubmissionLog,
    SubmissionStatus, SubmissionType,
};
pub use reconciliation::ReconciliationSummary;
pub use payment::{PaymentStatus, PaymentTracking};
pub use workflow::{
    ActivityAction, StepName, StepStatus, WorkflowActivity, WorkflowFilter, WorkflowInstance,
    WorkflowStatus, WorkflowStep, SYSTEM_ACTOR,
};
pub use statistics::{BatchStatistics, WorkflowStatistics};
pub use ports::{ClaimFilter, ClaimStore, InvoiceFilter, ShaGateway, StepEffect, WorkflowStore};
pub use services::{ClaimsService, NewDocument, WorkflowService};
pub use error::ClaimError;
