//! API configuration

use serde::Deserialize;

use domain_claims::adapters::ShaApiConfig;

/// API configuration
///
/// Every field has a default, so a partial environment is enough.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// PostgreSQL connection string
    pub database_url: String,
    /// Redis connection string for the job queue
    pub redis_url: String,
    /// Key prefix shared with the worker
    pub queue_prefix: String,
    /// Log level
    pub log_level: String,
    pub sha_base_url: String,
    pub sha_api_key: String,
    pub sha_provider_code: String,
    pub sha_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/clinic".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            queue_prefix: "clinic:jobs".to_string(),
            log_level: "info".to_string(),
            sha_base_url: "https://api.sha.go.ke".to_string(),
            sha_api_key: String::new(),
            sha_provider_code: String::new(),
            sha_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `API_*` environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.sha_api().timeout_secs, 30);
        assert!(config.sha_api().circuit_breaker.is_some());
    }
}
