//! SHA REST API Adapter
//!
//! Implements [`ShaGateway`] over the SHA provider API using reqwest.
//!
//! # Endpoints
//!
//! - `POST /claims/submit`
//! - `POST /claims/batch-submit`
//! - `GET /claims/status/{reference}`
//! - `GET /claims/batch-status/{reference}`
//!
//! References are appended as single percent-encoded path segments.
//!
//! Every request carries `Authorization: Bearer <api key>` and
//! `X-Provider-Code`.
//!
//! # Error Handling
//!
//! HTTP failures are mapped to `PortError` variants:
//! - 404 -> `PortError::NotFound`
//! - 401/403 -> `PortError::Unauthorized`
//! - 429 -> `PortError::RateLimited`
//! - 400/422 -> `PortError::Validation` (SHA refused the payload)
//! - 5xx -> `PortError::ServiceUnavailable`
//! - Timeouts -> `PortError::Timeout`
//! - Other -> `PortError::Internal`

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use core_kernel::{
    AdapterHealth, CircuitBreakerConfig, DomainPort, HealthCheckResult, HealthCheckable, PortError,
};

use crate::ports::ShaGateway;
use crate::submission::{ShaBatchPayload, ShaClaimPayload, ShaStatusResponse, ShaSubmissionResponse};

const SERVICE_NAME: &str = "sha-api";

/// Configuration for the SHA API adapter
#[derive(Debug, Clone)]
pub struct ShaApiConfig {
    /// Base URL of the SHA API
    pub base_url: String,

    /// API key sent as a bearer token
    pub api_key: String,

    /// Facility code registered with SHA
    pub provider_code: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Circuit breaker configuration
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for ShaApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.sha.go.ke".to_string(),
            api_key: String::new(),
            provider_code: String::new(),
            timeout_secs: 30,
            circuit_breaker: Some(CircuitBreakerConfig::default()),
        }
    }
}

/// Circuit breaker state for fault tolerance
#[derive(Debug)]
struct CircuitBreaker {
    config: CircuitBreakerConfig,
    failure_count: AtomicU64,
    success_count: AtomicU64,
    is_open: AtomicBool,
    last_failure_time: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            failure_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            is_open: AtomicBool::new(false),
            last_failure_time: RwLock::new(None),
        }
    }

    async fn is_available(&self) -> bool {
        if !self.is_open.load(Ordering::Relaxed) {
            return true;
        }

        // Half-open once the reset timeout has elapsed
        let last_failure = self.last_failure_time.read().await;
        matches!(
            *last_failure,
            Some(time) if time.elapsed() > Duration::from_secs(self.config.reset_timeout_secs)
        )
    }

    fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        if !self.is_open.load(Ordering::Relaxed) {
            return;
        }
        let success = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
        if success >= self.config.success_threshold as u64 {
            self.is_open.store(false, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
        }
    }

    async fn record_failure(&self) {
        self.success_count.store(0, Ordering::Relaxed);
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.config.failure_threshold as u64 {
            if !self.is_open.swap(true, Ordering::Relaxed) {
                warn!(failures, "SHA circuit breaker opened");
            }
            *self.last_failure_time.write().await = Some(Instant::now());
        }
    }
}

/// reqwest client for the SHA provider API
#[derive(Debug, Clone)]
pub struct ShaApiClient {
    config: ShaApiConfig,
    base: Url,
    client: reqwest::Client,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl ShaApiClient {
    pub fn new(config: ShaApiConfig) -> Result<Self, PortError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| PortError::validation(format!("invalid SHA base URL '{}': {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(PortError::validation(format!("SHA base URL '{}' cannot carry a path", config.base_url)));
        }
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| PortError::validation("SHA API key contains invalid header characters"))?;
        let provider = HeaderValue::from_str(&config.provider_code)
            .map_err(|_| PortError::validation("SHA provider code contains invalid header characters"))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("X-Provider-Code", provider);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PortError::Internal {
                message: "failed to build SHA HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;

        let circuit_breaker = config
            .circuit_breaker
            .clone()
            .map(|cb| Arc::new(CircuitBreaker::new(cb)));

        Ok(Self {
            config,
            base,
            client,
            circuit_breaker,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Checks if the circuit breaker is open (blocking requests)
    pub async fn is_circuit_open(&self) -> bool {
        match self.circuit_breaker {
            Some(ref cb) => !cb.is_available().await,
            None => false,
        }
    }

    /// Appends path segments to the base URL, encoding each one
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<R: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> Result<R, PortError> {
        if self.is_circuit_open().await {
            return Err(PortError::ServiceUnavailable {
                service: format!("{SERVICE_NAME} (circuit open)"),
            });
        }

        let started = Instant::now();
        let result = self.execute(operation, request).await;
        debug!(operation, elapsed_ms = started.elapsed().as_millis() as u64, ok = result.is_ok(), "SHA request finished");

        if let Some(ref cb) = self.circuit_breaker {
            match &result {
                Ok(_) => cb.record_success(),
                Err(e) if e.is_transient() => cb.record_failure().await,
                Err(_) => {}
            }
        }
        result
    }

    async fn execute<R: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> Result<R, PortError> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(operation, self.config.timeout_secs, e))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<R>().await.map_err(|e| PortError::Transformation {
                message: format!("{operation}: invalid SHA response body: {e}"),
            });
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        warn!(operation, status = status.as_u16(), body = %body, "SHA request rejected");
        Err(status_error(operation, status, retry_after, body))
    }
}

/// Maps a non-success HTTP status onto a port error
fn status_error(operation: &str, status: StatusCode, retry_after: Option<u64>, body: String) -> PortError {
    match status.as_u16() {
        404 => PortError::NotFound {
            entity_type: operation.to_string(),
            id: body,
        },
        401 | 403 => PortError::Unauthorized {
            message: format!("SHA rejected credentials for {operation}"),
        },
        429 => PortError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(60),
        },
        400 | 422 => PortError::Validation {
            message: format!("SHA rejected {operation}: {body}"),
            field: None,
        },
        s if s >= 500 => PortError::ServiceUnavailable {
            service: format!("{SERVICE_NAME} returned {s}"),
        },
        s => PortError::internal(format!("{operation}: unexpected SHA status {s}: {body}")),
    }
}

fn transport_error(operation: &str, timeout_secs: u64, error: reqwest::Error) -> PortError {
    if error.is_timeout() {
        PortError::Timeout {
            operation: operation.to_string(),
            duration_ms: timeout_secs * 1000,
        }
    } else if error.is_connect() || error.is_request() {
        PortError::Connection {
            message: format!("{operation}: could not reach SHA"),
            source: Some(Box::new(error)),
        }
    } else {
        PortError::Internal {
            message: format!("{operation}: SHA request failed"),
            source: Some(Box::new(error)),
        }
    }
}

impl DomainPort for ShaApiClient {}

#[async_trait]
impl ShaGateway for ShaApiClient {
    fn provider_code(&self) -> &str {
        &self.config.provider_code
    }

    async fn submit_claim(&self, payload: &ShaClaimPayload) -> Result<ShaSubmissionResponse, PortError> {
        let request = self.client.post(self.url(&["claims", "submit"])).json(payload);
        self.send("submit_claim", request).await
    }

    async fn submit_batch(&self, payload: &ShaBatchPayload) -> Result<ShaSubmissionResponse, PortError> {
        let request = self.client.post(self.url(&["claims", "batch-submit"])).json(payload);
        self.send("submit_batch", request).await
    }

    async fn claim_status(&self, reference: &str) -> Result<ShaStatusResponse, PortError> {
        let request = self.client.get(self.url(&["claims", "status", reference]));
        self.send("claim_status", request).await
    }

    async fn batch_status(&self, reference: &str) -> Result<ShaStatusResponse, PortError> {
        let request = self.client.get(self.url(&["claims", "batch-status", reference]));
        self.send("batch_status", request).await
    }
}

#[async_trait]
impl HealthCheckable for ShaApiClient {
    /// Reports the circuit state without calling SHA
    async fn health_check(&self) -> HealthCheckResult {
        let open = self.is_circuit_open().await;
        HealthCheckResult {
            adapter_id: SERVICE_NAME.to_string(),
            status: if open { AdapterHealth::Degraded } else { AdapterHealth::Healthy },
            latency_ms: 0,
            message: open.then(|| "Circuit breaker is open".to_string()),
            checked_at: Utc::now(),
        }
    }
}
