//! Clinic SHA Claims - API Server Binary
//!
//! Starts the HTTP API for SHA claims, invoices, batches and workflows.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin clinic-api
//!
//! # Run with environment variables
//! API_PORT=8080 API_DATABASE_URL=postgres://... API_REDIS_URL=redis://... cargo run --bin clinic-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` / `API_PORT` - Bind address (default: 0.0.0.0:8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_REDIS_URL` - Redis connection string for the job queue
//! * `API_SHA_BASE_URL`, `API_SHA_API_KEY`, `API_SHA_PROVIDER_CODE` - SHA API access
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::HealthCheckable;
use domain_claims::adapters::ShaApiClient;
use domain_claims::{ClaimsService, WorkflowService};
use infra_db::{create_pool, run_migrations, DatabaseConfig, PgClaimStore, PgWorkflowStore};
use infra_queue::{QueueConfig, RedisJobQueue};
use interface_api::{config::ApiConfig, create_router, AppState};

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, connects to PostgreSQL and
/// Redis, and serves until Ctrl+C or SIGTERM.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config();
    init_tracing(&config.log_level);

    tracing::info!(host = %config.host, port = %config.port, "Starting clinic API server");

    let pool = create_pool(DatabaseConfig::new(&config.database_url))
        .await
        .context("connecting to PostgreSQL")?;
    run_migrations(&pool).await.context("running migrations")?;

    let queue = Arc::new(
        RedisJobQueue::connect(QueueConfig::new(&config.redis_url).key_prefix(&config.queue_prefix))
            .await
            .context("connecting to Redis")?,
    );
    let sha = Arc::new(ShaApiClient::new(config.sha_api()).context("building SHA API client")?);

    let claim_store = Arc::new(PgClaimStore::new(pool.clone()));
    let claims = Arc::new(ClaimsService::new(claim_store.clone(), sha));
    let workflows = Arc::new(WorkflowService::new(
        claims.clone(),
        Arc::new(PgWorkflowStore::new(pool)),
    ));

    let checks: Vec<Arc<dyn HealthCheckable>> = vec![claim_store, queue.clone()];
    let state = AppState::new(claims, workflows, queue, config.clone()).with_health_checks(checks);
    let app = create_router(state);

    let addr: SocketAddr = config.server_addr().parse().context("parsing bind address")?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Loads `API_*` configuration, falling back to defaults
fn load_config() -> ApiConfig {
    ApiConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid API configuration ({e}); using defaults");
        ApiConfig::default()
    })
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// In-flight requests complete before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
