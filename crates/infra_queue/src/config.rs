//! Redis queue configuration

use std::time::Duration;

use domain_jobs::RetryPolicy;

/// Connection and key settings for [`crate::RedisJobQueue`]
///
/// # Example
///
/// ```rust
/// use infra_queue::QueueConfig;
///
/// let config = QueueConfig::new("redis://localhost:6379")
///     .key_prefix("clinic-test:jobs")
///     .max_attempts(5)
///     .lease_ttl(std::time::Duration::from_secs(120));
/// assert_eq!(config.max_attempts, 5);
/// ```
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub url: String,
    /// Prefix shared by every key the queue writes
    pub key_prefix: String,
    /// Attempts granted to newly enqueued jobs
    pub max_attempts: u32,
    /// Lifetime of recurring fire markers
    pub fire_marker_ttl: Duration,
    /// How long a dequeued job may run before another worker may take it
    /// over; must exceed the longest job
    pub lease_ttl: Duration,
    /// Upper bound on how long a unique key outlives its job
    pub unique_ttl: Duration,
}

impl QueueConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: "clinic:jobs".to_string(),
            max_attempts: RetryPolicy::default().max_attempts,
            fire_marker_ttl: Duration::from_secs(24 * 60 * 60),
            lease_ttl: Duration::from_secs(5 * 60),
            unique_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn fire_marker_ttl(mut self, ttl: Duration) -> Self {
        self.fire_marker_ttl = ttl;
        self
    }

    pub fn lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    pub fn unique_ttl(mut self, ttl: Duration) -> Self {
        self.unique_ttl = ttl;
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new("redis://localhost:6379")
    }
}
