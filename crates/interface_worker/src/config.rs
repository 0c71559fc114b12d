//! Worker configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use domain_claims::adapters::ShaApiConfig;
use domain_jobs::{RetryPolicy, RuntimeConfig};

use crate::handler::HandlerSettings;

/// Worker configuration
///
/// Every field has a default, so a partial environment is enough.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Identifies this process in job records; defaults to the pid
    pub worker_id: Option<String>,
    /// PostgreSQL connection string, also handed to `pg_dump`
    pub database_url: String,
    /// Redis connection string for the job queue
    pub redis_url: String,
    /// Key prefix shared with the API
    pub queue_prefix: String,
    pub log_level: String,
    pub sha_base_url: String,
    pub sha_api_key: String,
    pub sha_provider_code: String,
    pub sha_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Idle sleep between polls of an empty queue
    pub poll_interval_ms: u64,
    /// How often the recurring schedule is checked
    pub scheduler_interval_secs: u64,
    /// How long a job may run before another worker may take it over;
    /// must exceed the slowest job
    pub lease_ttl_secs: u64,
    /// Directory receiving database dumps
    pub backup_path: PathBuf,
    /// Directory archived by file backups
    pub uploads_path: PathBuf,
    /// Recipient of inventory alerts
    pub admin_email: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            worker_id: None,
            database_url: "postgres://localhost/clinic".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            queue_prefix: "clinic:jobs".to_string(),
            log_level: "info".to_string(),
            sha_base_url: "https://api.sha.go.ke".to_string(),
            sha_api_key: String::new(),
            sha_provider_code: String::new(),
            sha_timeout_secs: 30,
            max_attempts: retry.max_attempts,
            backoff_base_ms: retry.backoff_base_ms,
            backoff_max_ms: retry.backoff_max_ms,
            poll_interval_ms: 1000,
            scheduler_interval_secs: 30,
            lease_ttl_secs: 300,
            backup_path: PathBuf::from("/tmp"),
            uploads_path: PathBuf::from("./uploads"),
            admin_email: "admin@sethclinic.com".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from `WORKER_*` environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("WORKER"))
            .build()?
            .try_deserialize()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    /// Settings for the worker runtime's polling loops
    pub fn runtime(&self) -> RuntimeConfig {
        let defaults = RuntimeConfig::default();
        RuntimeConfig {
            worker_id: self.worker_id.clone().unwrap_or(defaults.worker_id),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            scheduler_interval: Duration::from_secs(self.scheduler_interval_secs),
            retry: self.retry_policy(),
            queues: defaults.queues,
        }
    }

    /// Settings for the SHA API client
    pub fn sha_api(&self) -> ShaApiConfig {
        ShaApiConfig {
            base_url: self.sha_base_url.clone(),
            api_key: self.sha_api_key.clone(),
            provider_code: self.sha_provider_code.clone(),
            timeout_secs: self.sha_timeout_secs,
            ..ShaApiConfig::default()
        }
    }

    pub fn handler_settings(&self) -> HandlerSettings {
        HandlerSettings {
            admin_email: self.admin_email.clone(),
            database_url: self.database_url.clone(),
            backup_path: self.backup_path.clone(),
            uploads_path: self.uploads_path.clone(),
            ..HandlerSettings::default()
        }
    }
}
