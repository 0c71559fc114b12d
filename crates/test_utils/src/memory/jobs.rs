use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use serde_json::Value;

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, JobId, PortError};
use domain_jobs::{
    AuditEntry, AuditLog, Channel, ExpiringBatch, InventoryMonitor, JobPayload, JobQueue, JobRecord, JobState,
    LowStockItem, Notification, Notifier, QueueName, QueueStats, RetryPolicy,
};

use super::lock;

#[derive(Default)]
struct QueueState {
    jobs: BTreeMap<JobId, JobRecord>,
    fired: HashSet<(String, DateTime<Utc>)>,
}

/// In-memory `JobQueue`
///
/// The clock is injectable so tests can move time forward to make delayed
/// retries due or leases run out. Scripted failures are returned, in order,
/// by the next enqueues.
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    now: Mutex<DateTime<Utc>>,
    max_attempts: u32,
    lease: Duration,
    enqueue_failures: Mutex<VecDeque<PortError>>,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::with_max_attempts(RetryPolicy::default().max_attempts)
    }

    /// Queue whose new jobs allow `max_attempts` attempts
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            now: Mutex::new(Utc::now()),
            max_attempts,
            lease: Duration::minutes(5),
            enqueue_failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Sets how long a dequeued job may run before it counts as abandoned
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn fail_next_enqueue(&self, error: PortError) {
        lock(&self.enqueue_failures).push_back(error);
    }

    /// Whether a recurring fire is currently claimed
    pub fn is_fire_claimed(&self, name: &str, fire_time: DateTime<Utc>) -> bool {
        lock(&self.state).fired.contains(&(name.to_string(), fire_time))
    }

    pub fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }

    pub fn jobs(&self) -> Vec<JobRecord> {
        lock(&self.state).jobs.values().cloned().collect()
    }

    pub fn jobs_in(&self, queue: QueueName) -> Vec<JobRecord> {
        lock(&self.state)
            .jobs
            .values()
            .filter(|j| j.queue == queue)
            .cloned()
            .collect()
    }

    fn insert(&self, payload: JobPayload, at: DateTime<Utc>) -> Result<JobRecord, PortError> {
        if let Some(error) = lock(&self.enqueue_failures).pop_front() {
            return Err(error);
        }
        let record = JobRecord::new(payload, self.max_attempts, at, self.now());
        lock(&self.state).jobs.insert(record.id, record.clone());
        Ok(record)
    }
}

impl DomainPort for InMemoryJobQueue {}

#[async_trait]
impl HealthCheckable for InMemoryJobQueue {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("memory-job-queue")
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, payload: JobPayload) -> Result<JobRecord, PortError> {
        let now = self.now();
        self.insert(payload, now)
    }

    async fn enqueue_at(&self, payload: JobPayload, at: DateTime<Utc>) -> Result<JobRecord, PortError> {
        self.insert(payload, at)
    }

    async fn enqueue_unique(&self, payload: JobPayload) -> Result<Option<JobRecord>, PortError> {
        let Some(key) = payload.unique_key() else {
            return self.enqueue(payload).await.map(Some);
        };
        if let Some(error) = lock(&self.enqueue_failures).pop_front() {
            return Err(error);
        }
        let now = self.now();
        let mut state = lock(&self.state);
        let held = state
            .jobs
            .values()
            .any(|j| j.unique_key.as_deref() == Some(key.as_str()) && !j.state.is_finished());
        if held {
            return Ok(None);
        }
        let mut record = JobRecord::new(payload, self.max_attempts, now, now);
        record.unique_key = Some(key);
        state.jobs.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn dequeue(&self, queue: QueueName, worker: &str) -> Result<Option<JobRecord>, PortError> {
        let now = self.now();
        let mut state = lock(&self.state);
        let next = state
            .jobs
            .values_mut()
            .filter(|j| j.queue == queue && j.is_due(now))
            .min_by_key(|j| (j.available_at, j.id));
        Ok(next.map(|job| {
            job.activate(worker, now, self.lease);
            job.clone()
        }))
    }

    async fn requeue_expired(&self, queue: QueueName, policy: &RetryPolicy) -> Result<Vec<JobRecord>, PortError> {
        let now = self.now();
        let mut state = lock(&self.state);
        let mut recovered = Vec::new();
        for job in state.jobs.values_mut().filter(|j| j.queue == queue && j.lease_expired(now)) {
            job.fail("lease expired", policy, now);
            recovered.push(job.clone());
        }
        Ok(recovered)
    }

    async fn complete(&self, id: JobId, result: Option<Value>) -> Result<JobRecord, PortError> {
        let now = self.now();
        let mut state = lock(&self.state);
        let job = state.jobs.get_mut(&id).ok_or_else(|| PortError::not_found("Job", id))?;
        job.complete(result, now);
        Ok(job.clone())
    }

    async fn fail(&self, id: JobId, error: &str, policy: &RetryPolicy) -> Result<JobRecord, PortError> {
        let now = self.now();
        let mut state = lock(&self.state);
        let job = state.jobs.get_mut(&id).ok_or_else(|| PortError::not_found("Job", id))?;
        job.fail(error, policy, now);
        Ok(job.clone())
    }

    async fn stats(&self, queue: QueueName) -> Result<QueueStats, PortError> {
        let state = lock(&self.state);
        let mut stats = QueueStats::empty(queue);
        for job in state.jobs.values().filter(|j| j.queue == queue) {
            stats.record(job.state);
        }
        Ok(stats)
    }

    async fn claim_recurring_fire(&self, name: &str, fire_time: DateTime<Utc>) -> Result<bool, PortError> {
        Ok(lock(&self.state).fired.insert((name.to_string(), fire_time)))
    }

    async fn release_recurring_fire(&self, name: &str, fire_time: DateTime<Utc>) -> Result<(), PortError> {
        lock(&self.state).fired.remove(&(name.to_string(), fire_time));
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, PortError> {
        Ok(lock(&self.state).jobs.get(&id).cloned())
    }
}

impl InMemoryJobQueue {
    /// Number of jobs of the queue in the given state
    pub fn count(&self, queue: QueueName, job_state: JobState) -> usize {
        lock(&self.state)
            .jobs
            .values()
            .filter(|j| j.queue == queue && j.state == job_state)
            .count()
    }
}

/// Collects audit entries in memory
#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        lock(&self.entries).clone()
    }

    pub fn with_action(&self, action: &str) -> Vec<AuditEntry> {
        lock(&self.entries).iter().filter(|e| e.action == action).cloned().collect()
    }
}

impl DomainPort for InMemoryAuditLog {}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn record(&self, entry: &AuditEntry) -> Result<(), PortError> {
        lock(&self.entries).push(entry.clone());
        Ok(())
    }
}

/// Inventory fake answering from fixed item and batch lists
///
/// Filtering follows the PostgreSQL queries: only unexpired batches count
/// towards stock, and expiring batches need stock left.
#[derive(Default)]
pub struct FakeInventory {
    items: Mutex<Vec<(LowStockItem, Vec<(i64, NaiveDate)>)>>,
    batches: Mutex<Vec<ExpiringBatch>>,
}

impl FakeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item with its batches as `(quantity, expiry_date)` pairs
    pub fn add_item(&self, name: &str, reorder_level: i64, batches: &[(i64, NaiveDate)]) -> uuid::Uuid {
        let item_id = uuid::Uuid::new_v4();
        let item = LowStockItem {
            item_id,
            name: name.to_string(),
            current_stock: 0,
            reorder_level,
        };
        lock(&self.items).push((item, batches.to_vec()));
        let mut stored = lock(&self.batches);
        for (quantity, expiry_date) in batches {
            stored.push(ExpiringBatch {
                batch_id: uuid::Uuid::new_v4(),
                item_id,
                name: name.to_string(),
                quantity: *quantity,
                expiry_date: *expiry_date,
            });
        }
        item_id
    }
}

impl DomainPort for FakeInventory {}

#[async_trait]
impl InventoryMonitor for FakeInventory {
    async fn low_stock_items(&self, today: NaiveDate) -> Result<Vec<LowStockItem>, PortError> {
        let items = lock(&self.items);
        Ok(items
            .iter()
            .filter_map(|(item, batches)| {
                let stock: i64 = batches.iter().filter(|(_, expiry)| *expiry > today).map(|(q, _)| q).sum();
                (stock <= item.reorder_level).then(|| LowStockItem {
                    current_stock: stock,
                    ..item.clone()
                })
            })
            .collect())
    }

    async fn expiring_batches(&self, today: NaiveDate, within_days: u32) -> Result<Vec<ExpiringBatch>, PortError> {
        let until = today
            .checked_add_days(Days::new(u64::from(within_days)))
            .ok_or_else(|| PortError::validation("expiry window out of range"))?;
        let mut batches: Vec<ExpiringBatch> = lock(&self.batches)
            .iter()
            .filter(|b| b.expiry_date > today && b.expiry_date <= until && b.quantity > 0)
            .cloned()
            .collect();
        batches.sort_by_key(|b| b.expiry_date);
        Ok(batches)
    }
}

/// Records notifications instead of delivering them
///
/// Scripted failures are returned, in order, by the next deliveries.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Channel, Notification)>>,
    failures: Mutex<VecDeque<PortError>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: PortError) {
        lock(&self.failures).push_back(error);
    }

    pub fn sent(&self) -> Vec<(Channel, Notification)> {
        lock(&self.sent).clone()
    }
}

impl DomainPort for RecordingNotifier {}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, channel: Channel, notification: &Notification) -> Result<(), PortError> {
        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }
        lock(&self.sent).push((channel, notification.clone()));
        Ok(())
    }
}
