//! Adapters for external systems used by the claims domain

pub mod sha_api;

pub use sha_api::{ShaApiClient, ShaApiConfig};
