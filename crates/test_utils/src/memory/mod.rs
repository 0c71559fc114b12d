//! In-Memory Port Implementations
//!
//! Fakes for every domain port, used by service and runtime tests that do
//! not need PostgreSQL or Redis. They enforce the same uniqueness and
//! optimistic locking rules as the real adapters.

mod claims;
mod jobs;
mod sha;

pub use claims::InMemoryClaimsDb;
pub use jobs::{FakeInventory, InMemoryAuditLog, InMemoryJobQueue, RecordingNotifier};
pub use sha::{FakeShaGateway, TEST_PROVIDER_CODE};

use std::sync::{Mutex, MutexGuard};

/// Locks the mutex, recovering the data if a panicking test poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
