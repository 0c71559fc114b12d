//! Retry policy with capped exponential backoff

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Attempts and backoff for failed jobs
///
/// The delay before attempt `n + 1` is `base * 2^(n - 1)`, never more than
/// `backoff_max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff_base_ms: base.as_millis() as u64,
            backoff_max_ms: max.as_millis() as u64,
        }
    }

    /// A policy that dead-letters on the first failure
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Delay after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let millis = self
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_max_ms);
        Duration::from_millis(millis)
    }

    /// When the next attempt should run, or `None` once attempts are exhausted
    pub fn next_attempt_at(&self, attempts: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if attempts >= self.max_attempts {
            return None;
        }
        let delay = chrono::Duration::milliseconds(self.delay_for(attempts).as_millis() as i64);
        Some(now + delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 5_000,
            backoff_max_ms: 10 * 60 * 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(20));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(20), Duration::from_secs(600));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(600));
    }

    #[test]
    fn test_exhausted_attempts() {
        let now = Utc::now();
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.next_attempt_at(1, now),
            Some(now + chrono::Duration::seconds(5))
        );
        assert!(policy.next_attempt_at(3, now).is_none());
        assert!(RetryPolicy::none().next_attempt_at(1, now).is_none());
    }

    proptest! {
        #[test]
        fn delay_never_decreases_and_never_exceeds_cap(
            base in 1u64..60_000,
            max in 1u64..3_600_000,
            attempt in 1u32..64,
        ) {
            let policy = RetryPolicy { max_attempts: 10, backoff_base_ms: base, backoff_max_ms: max };
            let current = policy.delay_for(attempt);
            let next = policy.delay_for(attempt + 1);
            prop_assert!(current <= next);
            prop_assert!(next <= Duration::from_millis(max));
        }
    }
}
