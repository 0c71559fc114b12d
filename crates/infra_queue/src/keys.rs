//! Redis key naming

use chrono::{DateTime, Utc};

use domain_jobs::QueueName;

/// Builds the keys of one queue namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    prefix: String,
}

impl QueueKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Hash of every job record, keyed by job id
    pub fn records(&self) -> String {
        format!("{}:records", self.prefix)
    }

    pub fn scheduled(&self, queue: QueueName) -> String {
        format!("{}:{}:scheduled", self.prefix, queue.as_str())
    }

    pub fn active(&self, queue: QueueName) -> String {
        format!("{}:{}:active", self.prefix, queue.as_str())
    }

    pub fn completed(&self, queue: QueueName) -> String {
        format!("{}:{}:completed", self.prefix, queue.as_str())
    }

    pub fn failed(&self, queue: QueueName) -> String {
        format!("{}:{}:failed", self.prefix, queue.as_str())
    }

    /// Marker held by the unfinished job enqueued under a unique key
    pub fn unique(&self, key: &str) -> String {
        format!("{}:unique:{}", self.prefix, key)
    }

    pub fn fired(&self, name: &str, fire_time: DateTime<Utc>) -> String {
        format!("{}:fired:{}:{}", self.prefix, name, fire_time.timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_queue_keys() {
        let keys = QueueKeys::new("clinic:jobs");
        assert_eq!(keys.records(), "clinic:jobs:records");
        assert_eq!(keys.scheduled(QueueName::Claims), "clinic:jobs:claims:scheduled");
        assert_eq!(keys.failed(QueueName::Backup), "clinic:jobs:backup:failed");
        assert_eq!(
            keys.unique("submit_claim_batch:42"),
            "clinic:jobs:unique:submit_claim_batch:42"
        );
    }

    #[test]
    fn test_fired_key_uses_unix_seconds() {
        let keys = QueueKeys::new("clinic:jobs");
        let fire = Utc.with_ymd_and_hms(2024, 3, 14, 2, 0, 0).unwrap();
        assert_eq!(
            keys.fired("database-backup", fire),
            format!("clinic:jobs:fired:database-backup:{}", fire.timestamp())
        );
    }
}
