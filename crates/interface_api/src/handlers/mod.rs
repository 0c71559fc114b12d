//! Request handlers, one module per resource

pub mod health;
pub mod claims;
pub mod invoices;
pub mod batches;
pub mod workflows;
pub mod jobs;
