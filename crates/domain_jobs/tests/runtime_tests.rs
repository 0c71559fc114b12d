//! Worker Runtime Tests
//!
//! Runs the worker runtime and the recurring scheduler against the
//! in-memory job queue with a scripted handler.
//!
//! # Test Coverage
//!
//! - Successful jobs are completed with their result
//! - Retryable failures back off exponentially until attempts run out
//! - Permanent failures are dead-lettered on the first attempt
//! - Jobs whose worker lease expired are retried by another worker
//! - Recurring fires are enqueued once, even with several schedulers
//! - A fire whose enqueue failed stays due for the next tick
//! - The runtime drains queues and stops on shutdown

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use core_kernel::PortError;
use domain_jobs::{
    default_recurring_jobs, JobError, JobHandler, JobPayload, JobQueue, JobRecord, JobState, QueueName,
    RecurringJob, RetryPolicy, RuntimeConfig, Scheduler, WorkerRuntime,
};
use serde_json::{json, Value};
use test_utils::{assert_job_state, InMemoryJobQueue, NotificationFixtures};
use tokio::sync::watch;

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Handler answering from a script; unscripted jobs succeed with no result
#[derive(Default)]
struct ScriptedHandler {
    script: Mutex<VecDeque<Result<Option<Value>, JobError>>>,
    handled: Mutex<Vec<JobPayload>>,
}

impl ScriptedHandler {
    fn then(self, outcome: Result<Option<Value>, JobError>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    fn handled(&self) -> Vec<JobPayload> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobHandler for ScriptedHandler {
    async fn handle(&self, job: &JobRecord) -> Result<Option<Value>, JobError> {
        self.handled.lock().unwrap().push(job.payload.clone());
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

fn runtime(queue: &Arc<InMemoryJobQueue>, handler: &Arc<ScriptedHandler>) -> WorkerRuntime {
    let config = RuntimeConfig {
        worker_id: "test-worker".to_string(),
        poll_interval: StdDuration::from_millis(10),
        scheduler_interval: StdDuration::from_millis(10),
        ..RuntimeConfig::default()
    };
    WorkerRuntime::new(queue.clone(), handler.clone(), config)
}

fn email_job() -> JobPayload {
    JobPayload::SendEmail(NotificationFixtures::email("Low stock alert: Paracetamol 500mg"))
}

// ============================================================================
// PROCESSING
// ============================================================================

#[tokio::test]
async fn test_empty_queue_yields_nothing() {
    let queue = Arc::new(InMemoryJobQueue::new());
    let handler = Arc::new(ScriptedHandler::default());

    let processed = runtime(&queue, &handler).process_next(QueueName::Claims).await.unwrap();
    assert!(processed.is_none());
    assert!(handler.handled().is_empty());
}

#[tokio::test]
async fn test_successful_job_is_completed_with_result() {
    let queue = Arc::new(InMemoryJobQueue::new());
    let handler = Arc::new(ScriptedHandler::default().then(Ok(Some(json!({ "success": true, "lowStockCount": 2 })))));
    let job = queue.enqueue(JobPayload::CheckLowStock).await.unwrap();

    let record = runtime(&queue, &handler)
        .process_next(QueueName::Inventory)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.id, job.id);
    assert_job_state(&record, JobState::Completed, 1);
    assert_eq!(record.result, Some(json!({ "success": true, "lowStockCount": 2 })));
    assert!(record.finished_at.is_some());
    assert_eq!(handler.handled(), vec![JobPayload::CheckLowStock]);
}

#[tokio::test]
async fn test_jobs_are_taken_only_from_the_polled_queue() {
    let queue = Arc::new(InMemoryJobQueue::new());
    let handler = Arc::new(ScriptedHandler::default());
    queue.enqueue(email_job()).await.unwrap();

    let rt = runtime(&queue, &handler);
    assert!(rt.process_next(QueueName::Claims).await.unwrap().is_none());
    assert!(rt.process_next(QueueName::Notification).await.unwrap().is_some());
}

#[tokio::test]
async fn test_retryable_failure_backs_off_until_attempts_run_out() {
    let queue = Arc::new(InMemoryJobQueue::new());
    let handler = Arc::new(
        ScriptedHandler::default()
            .then(Err(JobError::retryable("SHA API timeout")))
            .then(Err(JobError::retryable("SHA API timeout")))
            .then(Err(JobError::retryable("SHA API timeout"))),
    );
    let rt = runtime(&queue, &handler);
    queue.enqueue(JobPayload::ReconcileClaims).await.unwrap();
    let start = queue.now();

    let first = rt.process_next(QueueName::Claims).await.unwrap().unwrap();
    assert_job_state(&first, JobState::Delayed, 1);
    assert_eq!(first.available_at, start + Duration::seconds(5));
    assert_eq!(first.last_error.as_deref(), Some("Job handler failed: SHA API timeout"));

    // Not due yet
    assert!(rt.process_next(QueueName::Claims).await.unwrap().is_none());

    queue.advance(Duration::seconds(5));
    let second = rt.process_next(QueueName::Claims).await.unwrap().unwrap();
    assert_job_state(&second, JobState::Delayed, 2);
    assert_eq!(second.available_at, queue.now() + Duration::seconds(10));

    queue.advance(Duration::seconds(10));
    let third = rt.process_next(QueueName::Claims).await.unwrap().unwrap();
    assert_job_state(&third, JobState::Failed, 3);

    queue.advance(Duration::minutes(30));
    assert!(rt.process_next(QueueName::Claims).await.unwrap().is_none());
    assert_eq!(queue.count(QueueName::Claims, JobState::Failed), 1);
}

#[tokio::test]
async fn test_retry_then_success() {
    let queue = Arc::new(InMemoryJobQueue::new());
    let handler = Arc::new(
        ScriptedHandler::default()
            .then(Err(JobError::retryable("smtp unavailable")))
            .then(Ok(None)),
    );
    let rt = runtime(&queue, &handler);
    queue.enqueue(email_job()).await.unwrap();

    rt.process_next(QueueName::Notification).await.unwrap();
    queue.advance(Duration::seconds(5));
    let record = rt.process_next(QueueName::Notification).await.unwrap().unwrap();

    assert_job_state(&record, JobState::Completed, 2);
    assert!(record.last_error.is_none());
}

#[tokio::test]
async fn test_permanent_failure_is_dead_lettered_immediately() {
    let queue = Arc::new(InMemoryJobQueue::new());
    let handler = Arc::new(ScriptedHandler::default().then(Err(JobError::permanent("claim not found"))));
    let rt = runtime(&queue, &handler);
    queue
        .enqueue(JobPayload::SubmitSingleClaim {
            claim_id: core_kernel::ClaimId::new(),
        })
        .await
        .unwrap();

    let record = rt.process_next(QueueName::Claims).await.unwrap().unwrap();
    assert_job_state(&record, JobState::Failed, 1);

    let stats = queue.stats(QueueName::Claims).await.unwrap();
    assert_eq!((stats.failed, stats.waiting, stats.delayed), (1, 0, 0));
}

#[tokio::test]
async fn test_delayed_job_waits_for_its_time() {
    let queue = Arc::new(InMemoryJobQueue::new());
    let handler = Arc::new(ScriptedHandler::default());
    let rt = runtime(&queue, &handler);
    let at = queue.now() + Duration::minutes(10);
    let job = queue.enqueue_at(email_job(), at).await.unwrap();
    assert_eq!(job.state, JobState::Delayed);

    assert!(rt.process_next(QueueName::Notification).await.unwrap().is_none());
    queue.advance(Duration::minutes(10));
    assert!(rt.process_next(QueueName::Notification).await.unwrap().is_some());
}

#[tokio::test]
async fn test_custom_retry_policy_is_used() {
    let queue = Arc::new(InMemoryJobQueue::with_max_attempts(5));
    let handler = Arc::new(ScriptedHandler::default().then(Err(JobError::retryable("busy"))));
    let config = RuntimeConfig {
        retry: RetryPolicy::new(5, StdDuration::from_secs(60), StdDuration::from_secs(600)),
        ..RuntimeConfig::default()
    };
    let rt = WorkerRuntime::new(queue.clone(), handler.clone(), config);
    queue.enqueue(JobPayload::CheckExpiringItems).await.unwrap();
    let start = queue.now();

    let record = rt.process_next(QueueName::Inventory).await.unwrap().unwrap();
    assert_eq!(record.available_at, start + Duration::seconds(60));
    assert_eq!(record.max_attempts, 5);
}

// ============================================================================
// RECURRING JOBS
// ============================================================================

fn six_hourly() -> Vec<RecurringJob> {
    vec![RecurringJob::new("low-stock-check", "0 */6 * * *", JobPayload::CheckLowStock).unwrap()]
}

#[tokio::test]
async fn test_failed_enqueue_keeps_fire_due() {
    let queue = InMemoryJobQueue::new();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap();
    let mut scheduler = Scheduler::new(six_hourly(), start);
    let fire = start + Duration::hours(5);
    queue.fail_next_enqueue(PortError::connection("Redis connection reset"));

    assert!(scheduler.tick(&queue, fire).await.is_err());
    assert!(!queue.is_fire_claimed("low-stock-check", fire));
    assert_eq!(scheduler.next_fire("low-stock-check"), Some(fire));
    assert!(queue.jobs().is_empty());

    let enqueued = scheduler.tick(&queue, fire + Duration::seconds(30)).await.unwrap();
    assert_eq!(enqueued.len(), 1);
    assert!(queue.is_fire_claimed("low-stock-check", fire));
    assert_eq!(scheduler.next_fire("low-stock-check"), Some(start + Duration::hours(11)));
}

#[tokio::test]
async fn test_scheduler_enqueues_at_fire_time() {
    let queue = InMemoryJobQueue::new();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap();
    let mut scheduler = Scheduler::new(six_hourly(), start);
    assert_eq!(scheduler.next_fire("low-stock-check"), Some(start + Duration::hours(5)));

    assert!(scheduler.tick(&queue, start + Duration::hours(1)).await.unwrap().is_empty());

    let enqueued = scheduler.tick(&queue, start + Duration::hours(5)).await.unwrap();
    assert_eq!(enqueued.len(), 1);
    assert_eq!(enqueued[0].payload, JobPayload::CheckLowStock);
    assert_eq!(scheduler.next_fire("low-stock-check"), Some(start + Duration::hours(11)));
}

#[tokio::test]
async fn test_missed_fires_collapse_into_one() {
    let queue = InMemoryJobQueue::new();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap();
    let mut scheduler = Scheduler::new(six_hourly(), start);

    let enqueued = scheduler.tick(&queue, start + Duration::hours(20)).await.unwrap();
    assert_eq!(enqueued.len(), 1);
    assert_eq!(queue.jobs_in(QueueName::Inventory).len(), 1);
}

#[tokio::test]
async fn test_fire_is_enqueued_once_across_workers() {
    let queue = InMemoryJobQueue::new();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap();
    let mut first = Scheduler::new(six_hourly(), start);
    let mut second = Scheduler::new(six_hourly(), start);
    let fire = start + Duration::hours(5);

    assert_eq!(first.tick(&queue, fire).await.unwrap().len(), 1);
    assert!(second.tick(&queue, fire).await.unwrap().is_empty());
    assert_eq!(queue.jobs().len(), 1);
}

#[test]
fn test_default_schedule() {
    let jobs = default_recurring_jobs().unwrap();
    let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["low-stock-check", "expiring-items-check", "claims-reconciliation", "database-backup"]
    );
}

// ============================================================================
// LEASES
// ============================================================================

#[tokio::test]
async fn test_expired_lease_is_recovered_and_retried() {
    let queue = Arc::new(InMemoryJobQueue::new().with_lease(Duration::minutes(1)));
    let handler = Arc::new(ScriptedHandler::default());
    let rt = runtime(&queue, &handler);
    let job = queue.enqueue(JobPayload::CheckLowStock).await.unwrap();

    // A worker takes the job and never reports back
    let taken = queue.dequeue(QueueName::Inventory, "crashed-worker").await.unwrap().unwrap();
    assert_job_state(&taken, JobState::Active, 1);
    assert!(rt.recover_expired(QueueName::Inventory).await.unwrap().is_empty());

    queue.advance(Duration::minutes(2));
    let recovered = rt.recover_expired(QueueName::Inventory).await.unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].id, job.id);
    assert_eq!(recovered[0].last_error.as_deref(), Some("lease expired"));
    assert!(recovered[0].lease_expires_at.is_none());

    queue.advance(Duration::hours(1));
    let done = rt.process_next(QueueName::Inventory).await.unwrap().unwrap();
    assert_job_state(&done, JobState::Completed, 2);
    assert_eq!(handler.handled(), vec![JobPayload::CheckLowStock]);
}

#[tokio::test]
async fn test_expired_lease_on_last_attempt_is_dead_lettered() {
    let queue = Arc::new(InMemoryJobQueue::with_max_attempts(1).with_lease(Duration::minutes(1)));
    let handler = Arc::new(ScriptedHandler::default());
    let rt = runtime(&queue, &handler);
    queue.enqueue(JobPayload::CheckLowStock).await.unwrap();
    queue.dequeue(QueueName::Inventory, "crashed-worker").await.unwrap();

    queue.advance(Duration::minutes(2));
    let recovered = rt.recover_expired(QueueName::Inventory).await.unwrap();

    assert_job_state(&recovered[0], JobState::Failed, 1);
    assert!(rt.process_next(QueueName::Inventory).await.unwrap().is_none());
    assert!(handler.handled().is_empty());
}

// ============================================================================
// RUN LOOP
// ============================================================================

#[tokio::test]
async fn test_run_drains_queues_and_stops_on_shutdown() {
    let queue = Arc::new(InMemoryJobQueue::new());
    let handler = Arc::new(ScriptedHandler::default());
    queue.enqueue(email_job()).await.unwrap();
    queue.enqueue(JobPayload::CheckLowStock).await.unwrap();
    queue.enqueue(JobPayload::FileBackup { destination: None }).await.unwrap();

    let rt = Arc::new(runtime(&queue, &handler));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(rt.run(Scheduler::new(Vec::new(), Utc::now()), shutdown_rx));

    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(5);
    while handler.handled().len() < 3 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(StdDuration::from_secs(5), task)
        .await
        .expect("runtime stops after shutdown")
        .unwrap();

    assert_eq!(handler.handled().len(), 3);
    assert!(queue.jobs().iter().all(|j| j.state == JobState::Completed));
}
