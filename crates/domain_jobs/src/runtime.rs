//! Worker runtime: one polling loop per queue plus the recurring scheduler

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::error::JobError;
use crate::job::{JobRecord, JobState};
use crate::ports::{JobHandler, JobQueue};
use crate::queue::QueueName;
use crate::retry::RetryPolicy;
use crate::schedule::RecurringJob;

/// Runtime settings for a worker process
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub worker_id: String,
    pub poll_interval: Duration,
    pub scheduler_interval: Duration,
    pub retry: RetryPolicy,
    pub queues: Vec<QueueName>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", std::process::id()),
            poll_interval: Duration::from_secs(1),
            scheduler_interval: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            queues: QueueName::ALL.to_vec(),
        }
    }
}

/// Pulls jobs off the queues and dispatches them to a handler
pub struct WorkerRuntime {
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    config: RuntimeConfig,
}

impl WorkerRuntime {
    pub fn new(queue: Arc<dyn JobQueue>, handler: Arc<dyn JobHandler>, config: RuntimeConfig) -> Self {
        Self { queue, handler, config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Takes one due job from the queue and runs it
    ///
    /// Returns the job as stored after completion or failure, or `None` when
    /// nothing was due.
    #[instrument(skip(self), fields(worker = %self.config.worker_id))]
    pub async fn process_next(&self, queue: QueueName) -> Result<Option<JobRecord>, JobError> {
        let Some(job) = self.queue.dequeue(queue, &self.config.worker_id).await? else {
            return Ok(None);
        };
        debug!(job_id = %job.id, job = %job.payload, attempt = job.attempts, "job started");

        let record = match self.handler.handle(&job).await {
            Ok(result) => {
                let record = self.queue.complete(job.id, result).await?;
                info!(job_id = %job.id, job = %job.payload, "job completed");
                record
            }
            Err(e) => {
                let policy = if e.is_retryable() {
                    self.config.retry
                } else {
                    RetryPolicy::none()
                };
                let record = self.queue.fail(job.id, &e.to_string(), &policy).await?;
                if record.state == JobState::Failed {
                    error!(
                        job_id = %job.id,
                        job = %job.payload,
                        attempts = record.attempts,
                        error = %e,
                        "job failed permanently"
                    );
                } else {
                    warn!(
                        job_id = %job.id,
                        job = %job.payload,
                        attempts = record.attempts,
                        retry_at = %record.available_at,
                        error = %e,
                        "job failed, retry scheduled"
                    );
                }
                record
            }
        };
        Ok(Some(record))
    }

    /// Puts jobs abandoned by a crashed or stalled worker back on the queue
    pub async fn recover_expired(&self, queue: QueueName) -> Result<Vec<JobRecord>, JobError> {
        let recovered = self.queue.requeue_expired(queue, &self.config.retry).await?;
        for record in &recovered {
            warn!(
                job_id = %record.id,
                job = %record.payload,
                attempts = record.attempts,
                state = ?record.state,
                "job lease expired"
            );
        }
        Ok(recovered)
    }

    async fn poll_loop(self: Arc<Self>, queue: QueueName, mut shutdown: watch::Receiver<bool>) {
        info!(queue = %queue, name = queue.display_name(), "queue processor started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.recover_expired(queue).await {
                error!(queue = %queue, error = %e, "expired lease recovery failed");
            }
            match self.process_next(queue).await {
                // Drain the queue before sleeping again
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!(queue = %queue, error = %e, "queue poll failed"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!(queue = %queue, "queue processor stopped");
    }

    async fn scheduler_loop(self: Arc<Self>, mut scheduler: Scheduler, mut shutdown: watch::Receiver<bool>) {
        info!(jobs = scheduler.len(), "recurring job scheduler started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = scheduler.tick(self.queue.as_ref(), Utc::now()).await {
                error!(error = %e, "recurring job scheduling failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.scheduler_interval) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!("recurring job scheduler stopped");
    }

    /// Runs until `shutdown` flips to true, then waits for in-flight jobs
    pub async fn run(self: Arc<Self>, scheduler: Scheduler, shutdown: watch::Receiver<bool>) {
        let mut tasks = JoinSet::new();
        for queue in self.config.queues.clone() {
            tasks.spawn(Arc::clone(&self).poll_loop(queue, shutdown.clone()));
        }
        tasks.spawn(Arc::clone(&self).scheduler_loop(scheduler, shutdown));

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "worker task panicked");
            }
        }
        info!(worker = %self.config.worker_id, "worker runtime stopped");
    }
}

#[derive(Debug, Clone)]
struct ScheduledEntry {
    job: RecurringJob,
    next_fire: Option<DateTime<Utc>>,
}

/// Tracks the next fire time of each recurring job
#[derive(Debug, Clone)]
pub struct Scheduler {
    entries: Vec<ScheduledEntry>,
}

impl Scheduler {
    pub fn new(jobs: Vec<RecurringJob>, now: DateTime<Utc>) -> Self {
        let entries = jobs
            .into_iter()
            .map(|job| ScheduledEntry {
                next_fire: job.schedule.next_after(now),
                job,
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Next fire time of the named job
    pub fn next_fire(&self, name: &str) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .find(|e| e.job.name == name)
            .and_then(|e| e.next_fire)
    }

    /// Enqueues every job whose fire time has passed
    ///
    /// Missed fires collapse into one. A fire already claimed by another
    /// worker is skipped. When enqueueing fails the claim is released and
    /// the fire stays due for the next tick.
    pub async fn tick(&mut self, queue: &dyn JobQueue, now: DateTime<Utc>) -> Result<Vec<JobRecord>, JobError> {
        let mut enqueued = Vec::new();
        for entry in &mut self.entries {
            let Some(fire) = entry.next_fire else { continue };
            if fire > now {
                continue;
            }
            if queue.claim_recurring_fire(&entry.job.name, fire).await? {
                let record = match queue.enqueue(entry.job.payload.clone()).await {
                    Ok(record) => record,
                    Err(e) => {
                        if let Err(release) = queue.release_recurring_fire(&entry.job.name, fire).await {
                            error!(job = %entry.job.name, fire = %fire, error = %release, "could not release recurring fire");
                        }
                        return Err(e.into());
                    }
                };
                info!(job = %entry.job.name, job_id = %record.id, fire = %fire, "recurring job enqueued");
                enqueued.push(record);
            } else {
                debug!(job = %entry.job.name, fire = %fire, "recurring fire claimed elsewhere");
            }
            entry.next_fire = entry.job.schedule.next_after(now);
        }
        Ok(enqueued)
    }
}
