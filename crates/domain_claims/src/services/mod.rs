//! Application services orchestrating the claims ports

pub mod claims;
pub mod workflow;

pub use claims::{ClaimsService, NewDocument};
pub use workflow::WorkflowService;
