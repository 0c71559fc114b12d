//! HTTP API Layer
//!
//! REST API for the clinic's SHA claims: claims and documents, invoices,
//! batches, claims workflows and job control.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers per resource, calling the domain services
//! - **Middleware**: JWT authentication, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: `ApiError` maps domain and port errors onto JSON responses
//!
//! Long-running SHA calls are never made inline: submit and reconcile
//! routes enqueue a job and answer `202 Accepted`.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(claims, workflows, jobs, config);
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post},
    middleware as axum_middleware,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use core_kernel::HealthCheckable;
use domain_claims::{ClaimsService, WorkflowService};
use domain_jobs::JobQueue;

use crate::config::ApiConfig;
use crate::middleware::{audit_middleware, auth_middleware};
use crate::handlers::{batches, claims, health, invoices, jobs, workflows};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub claims: Arc<ClaimsService>,
    pub workflows: Arc<WorkflowService>,
    pub jobs: Arc<dyn JobQueue>,
    /// Adapters consulted by the readiness check
    pub health: Arc<Vec<Arc<dyn HealthCheckable>>>,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(
        claims: Arc<ClaimsService>,
        workflows: Arc<WorkflowService>,
        jobs: Arc<dyn JobQueue>,
        config: ApiConfig,
    ) -> Self {
        Self {
            claims,
            workflows,
            jobs,
            health: Arc::new(Vec::new()),
            config,
        }
    }

    pub fn with_health_checks(mut self, checks: Vec<Arc<dyn HealthCheckable>>) -> Self {
        self.health = Arc::new(checks);
        self
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let claims_routes = Router::new()
        .route("/", post(claims::create_claim).get(claims::list_claims))
        .route(
            "/:id",
            get(claims::get_claim).put(claims::update_claim).delete(claims::delete_claim),
        )
        .route("/:id/documents", get(claims::list_documents).post(claims::add_document))
        .route("/:id/documents/checklist", get(claims::document_checklist))
        .route("/:id/documents/:doc_id", delete(claims::delete_document))
        .route("/:id/documents/:doc_id/verify", patch(claims::verify_document))
        .route("/:id/submit", post(claims::submit_claim));

    let invoice_routes = Router::new()
        .route("/", get(invoices::list_invoices))
        .route("/generate/:claim_id", post(invoices::generate_invoice))
        .route("/:id", get(invoices::get_invoice))
        .route("/:id/print", patch(invoices::print_invoice));

    let batch_routes = Router::new()
        .route("/", post(batches::create_batch).get(batches::list_batches))
        .route("/stats/summary", get(batches::statistics))
        .route("/:id", get(batches::get_batch).delete(batches::delete_batch))
        .route("/:id/submit", patch(batches::submit_batch))
        .route("/:id/mark-printed", patch(batches::mark_printed));

    let workflow_routes = Router::new()
        .route("/", post(workflows::create_workflow).get(workflows::list_workflows))
        .route("/statistics", get(workflows::statistics))
        .route("/:id", get(workflows::get_workflow))
        .route("/:id/activity", get(workflows::activity))
        .route("/:id/steps/:step/complete", post(workflows::complete_step))
        .route("/:id/steps/:step/skip", post(workflows::skip_step))
        .route("/:id/steps/:step/retry", post(workflows::retry_step))
        .route("/:id/automate", post(workflows::automate))
        .route("/:id/cancel", post(workflows::cancel));

    let job_routes = Router::new()
        .route("/reconcile", post(jobs::reconcile))
        .route("/:queue/stats", get(jobs::queue_stats))
        .route("/:queue/:id", get(jobs::get_job));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/sha-claims", claims_routes)
        .nest("/sha-invoices", invoice_routes)
        .nest("/sha-batches", batch_routes)
        .nest("/sha-workflows", workflow_routes)
        .nest("/jobs", job_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
