//! Clinic SHA Claims - Worker Binary
//!
//! Processes the claims, inventory, notification and backup queues and
//! enqueues the recurring jobs.
//!
//! # Usage
//!
//! ```bash
//! WORKER_DATABASE_URL=postgres://... WORKER_REDIS_URL=redis://... cargo run --bin clinic-worker
//! ```
//!
//! # Environment Variables
//!
//! * `WORKER_DATABASE_URL` - PostgreSQL connection string, also used by `pg_dump`
//! * `WORKER_REDIS_URL` / `WORKER_QUEUE_PREFIX` - Job queue location
//! * `WORKER_SHA_BASE_URL`, `WORKER_SHA_API_KEY`, `WORKER_SHA_PROVIDER_CODE` - SHA API access
//! * `WORKER_MAX_ATTEMPTS`, `WORKER_BACKOFF_BASE_MS`, `WORKER_BACKOFF_MAX_MS` - Retry policy
//! * `WORKER_POLL_INTERVAL_MS` - Idle sleep between queue polls (default: 1000)
//! * `WORKER_BACKUP_PATH` / `WORKER_UPLOADS_PATH` - Backup target and archived uploads
//! * `WORKER_ADMIN_EMAIL` - Recipient of inventory alerts
//! * `WORKER_LOG_LEVEL` - Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_claims::adapters::ShaApiClient;
use domain_claims::ClaimsService;
use domain_jobs::{default_recurring_jobs, JobQueue, Scheduler, WorkerRuntime};
use infra_db::{create_pool, run_migrations, DatabaseConfig, PgAuditLog, PgClaimStore, PgInventoryMonitor};
use infra_queue::{QueueConfig, RedisJobQueue};
use interface_worker::{ClinicJobHandler, CommandBackupTool, LoggingNotifier, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid worker configuration ({e}); using defaults");
        WorkerConfig::default()
    });
    init_tracing(&config.log_level);

    let pool = create_pool(DatabaseConfig::new(&config.database_url))
        .await
        .context("connecting to PostgreSQL")?;
    run_migrations(&pool).await.context("running migrations")?;

    let queue_config = QueueConfig::new(&config.redis_url)
        .key_prefix(&config.queue_prefix)
        .max_attempts(config.max_attempts)
        .lease_ttl(config.lease_ttl());
    let queue: Arc<dyn JobQueue> = Arc::new(
        RedisJobQueue::connect(queue_config)
            .await
            .context("connecting to Redis")?,
    );

    let sha = Arc::new(ShaApiClient::new(config.sha_api()).context("building SHA API client")?);
    let claims = Arc::new(ClaimsService::new(Arc::new(PgClaimStore::new(pool.clone())), sha));

    let handler = ClinicJobHandler::new(
        claims,
        queue.clone(),
        Arc::new(PgInventoryMonitor::new(pool.clone())),
        Arc::new(LoggingNotifier),
        Arc::new(PgAuditLog::new(pool)),
        Arc::new(CommandBackupTool),
        config.handler_settings(),
    );

    let runtime = Arc::new(WorkerRuntime::new(queue, Arc::new(handler), config.runtime()));
    let scheduler = Scheduler::new(default_recurring_jobs()?, Utc::now());
    tracing::info!(
        worker = %runtime.config().worker_id,
        recurring_jobs = scheduler.len(),
        "Starting clinic worker"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        // Receivers only go away once the runtime has stopped
        let _ = shutdown_tx.send(true);
    });

    runtime.run(scheduler, shutdown_rx).await;
    tracing::info!("Worker shutdown complete");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for Ctrl+C or SIGTERM; in-flight jobs finish before exit
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
        _ = ctrl_c => tracing::info!("Received Ctrl+C, stopping worker"),
        _ = terminate => tracing::info!("Received SIGTERM, stopping worker"),
    }
}
