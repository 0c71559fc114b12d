//! Redis Job Queue Adapter
//!
//! Implements `JobQueue` on the key layout described in the crate docs.
//! Transitions touching more than one key go through the Lua scripts in
//! `scripts`; enqueueing uses an atomic pipeline.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, JobId, PortError};
use domain_jobs::{JobPayload, JobQueue, JobRecord, JobState, QueueName, QueueStats, RetryPolicy};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::keys::QueueKeys;
use crate::scripts::QueueScripts;

/// Redis-backed implementation of `JobQueue`
///
/// Cloning is cheap: clones share the multiplexed connection.
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
    keys: QueueKeys,
    scripts: Arc<QueueScripts>,
    max_attempts: u32,
    fire_marker_ttl: Duration,
    lease_ttl: Duration,
    unique_ttl: Duration,
}

impl fmt::Debug for RedisJobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisJobQueue")
            .field("connection", &"ConnectionManager")
            .field("prefix", &self.keys.prefix())
            .field("max_attempts", &self.max_attempts)
            .field("lease_ttl", &self.lease_ttl)
            .finish()
    }
}

impl RedisJobQueue {
    /// Opens a managed connection to the configured server
    ///
    /// # Errors
    ///
    /// Returns `QueueError::ConnectionFailed` if the server is unreachable
    pub async fn connect(config: QueueConfig) -> Result<Self, QueueError> {
        info!(prefix = %config.key_prefix, "Connecting to Redis job queue");

        let client = redis::Client::open(config.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        info!("Redis job queue connected");
        Ok(Self::with_connection(conn, &config))
    }

    pub fn with_connection(conn: ConnectionManager, config: &QueueConfig) -> Self {
        Self {
            conn,
            keys: QueueKeys::new(config.key_prefix.clone()),
            scripts: Arc::new(QueueScripts::new()),
            max_attempts: config.max_attempts,
            fire_marker_ttl: config.fire_marker_ttl,
            lease_ttl: config.lease_ttl,
            unique_ttl: config.unique_ttl,
        }
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    async fn insert(&self, payload: JobPayload, at: DateTime<Utc>) -> Result<JobRecord, QueueError> {
        let record = JobRecord::new(payload, self.max_attempts, at, Utc::now());
        self.store_new(record).await
    }

    async fn store_new(&self, record: JobRecord) -> Result<JobRecord, QueueError> {
        let json = serde_json::to_string(&record)?;
        let id = field(record.id);

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .hset(self.keys.records(), &id, json)
            .ignore()
            .zadd(self.keys.scheduled(record.queue), &id, score(record.available_at))
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(job_id = %record.id, job = %record.payload, state = ?record.state, "Job enqueued");
        Ok(record)
    }

    async fn load(&self, id: JobId) -> Result<JobRecord, QueueError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(self.keys.records(), field(id)).await?;
        let raw = raw.ok_or(QueueError::NotFound(id))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Stores a finished record on the completed or failed history list
    async fn finish(&self, record: &JobRecord, list: String, retention: usize) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.finish.key(self.keys.active(record.queue));
        invocation
            .key(list)
            .key(self.keys.records())
            .key(self.keys.scheduled(record.queue));
        if let Some(unique) = &record.unique_key {
            invocation.key(self.keys.unique(unique));
        }
        let evicted = invocation
            .arg(field(record.id))
            .arg(serde_json::to_string(record)?)
            .arg(retention)
            .invoke_async::<i64>(&mut conn)
            .await?;

        if evicted > 0 {
            debug!(queue = %record.queue, evicted, "Trimmed job history");
        }
        Ok(())
    }

    /// Writes the retry decision for a job whose lease expired
    async fn settle_expired(&self, record: &JobRecord) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let dead = record.state == JobState::Failed;
        let mut invocation = self.scripts.settle_expired.key(self.keys.scheduled(record.queue));
        invocation.key(self.keys.records()).key(self.keys.failed(record.queue));
        if let Some(unique) = &record.unique_key {
            invocation.key(self.keys.unique(unique));
        }
        let written = invocation
            .arg(field(record.id))
            .arg(serde_json::to_string(record)?)
            .arg(score(record.available_at))
            .arg(if dead { "1" } else { "0" })
            .arg(record.queue.retention().failed)
            .invoke_async::<i64>(&mut conn)
            .await?;
        debug!(job_id = %record.id, dead, written, "Expired job settled");
        Ok(written == 1)
    }
}

/// Hash field and set member for a job
fn field(id: JobId) -> String {
    id.as_uuid().to_string()
}

/// Sorted set score: due time in unix milliseconds
fn score(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

impl DomainPort for RedisJobQueue {}

#[async_trait]
impl HealthCheckable for RedisJobQueue {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let mut conn = self.conn.clone();
        let result = redis::cmd("PING").query_async::<String>(&mut conn).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(_) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Redis error: {}", e))),
        };
        HealthCheckResult {
            adapter_id: "redis-job-queue".to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, payload: JobPayload) -> Result<JobRecord, PortError> {
        Ok(self.insert(payload, Utc::now()).await?)
    }

    async fn enqueue_at(&self, payload: JobPayload, at: DateTime<Utc>) -> Result<JobRecord, PortError> {
        Ok(self.insert(payload, at).await?)
    }

    #[instrument(skip(self, payload), fields(job = %payload))]
    async fn enqueue_unique(&self, payload: JobPayload) -> Result<Option<JobRecord>, PortError> {
        let Some(unique) = payload.unique_key() else {
            return Ok(Some(self.insert(payload, Utc::now()).await?));
        };
        let now = Utc::now();
        let mut record = JobRecord::new(payload, self.max_attempts, now, now);
        record.unique_key = Some(unique.clone());
        let key = self.keys.unique(&unique);

        let mut conn = self.conn.clone();
        let claimed = redis::cmd("SET")
            .arg(&key)
            .arg(field(record.id))
            .arg("NX")
            .arg("EX")
            .arg(self.unique_ttl.as_secs().max(1))
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(QueueError::from)?;
        if claimed.is_none() {
            debug!(unique_key = %unique, "Job with the same key is still pending");
            return Ok(None);
        }

        match self.store_new(record.clone()).await {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                let released = self
                    .scripts
                    .release_unique
                    .key(&key)
                    .arg(field(record.id))
                    .invoke_async::<i64>(&mut conn)
                    .await;
                if let Err(release_error) = released {
                    warn!(unique_key = %unique, error = %release_error, "Failed to release unique key");
                }
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self), fields(queue = %queue))]
    async fn dequeue(&self, queue: QueueName, worker: &str) -> Result<Option<JobRecord>, PortError> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(self.lease_ttl).map_err(|e| PortError::validation(e.to_string()))?;
        let mut conn = self.conn.clone();
        let raw = self
            .scripts
            .dequeue
            .key(self.keys.scheduled(queue))
            .key(self.keys.active(queue))
            .key(self.keys.records())
            .arg(score(now))
            .arg(score(now + lease))
            .invoke_async::<Option<String>>(&mut conn)
            .await
            .map_err(QueueError::from)?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let mut record: JobRecord = serde_json::from_str(&raw).map_err(QueueError::from)?;
        record.activate(worker, now, lease);
        let json = serde_json::to_string(&record).map_err(QueueError::from)?;
        conn.hset::<_, _, _, ()>(self.keys.records(), field(record.id), json)
            .await
            .map_err(QueueError::from)?;

        debug!(job_id = %record.id, attempt = record.attempts, "Job dequeued");
        Ok(Some(record))
    }

    #[instrument(skip(self, policy), fields(queue = %queue))]
    async fn requeue_expired(&self, queue: QueueName, policy: &RetryPolicy) -> Result<Vec<JobRecord>, PortError> {
        let now = Utc::now();
        let mut conn = self.conn.clone();
        let ids = self
            .scripts
            .expire
            .key(self.keys.active(queue))
            .key(self.keys.scheduled(queue))
            .arg(score(now))
            .invoke_async::<Vec<String>>(&mut conn)
            .await
            .map_err(QueueError::from)?;

        let mut recovered = Vec::with_capacity(ids.len());
        for id in ids {
            let raw: Option<String> = conn.hget(self.keys.records(), &id).await.map_err(QueueError::from)?;
            let Some(raw) = raw else { continue };
            let mut record: JobRecord = serde_json::from_str(&raw).map_err(QueueError::from)?;
            if record.state != JobState::Active {
                continue;
            }
            record.fail("lease expired", policy, now);
            if self.settle_expired(&record).await? {
                recovered.push(record);
            }
        }
        Ok(recovered)
    }

    async fn complete(&self, id: JobId, result: Option<Value>) -> Result<JobRecord, PortError> {
        let mut record = self.load(id).await?;
        record.complete(result, Utc::now());
        let retention = record.queue.retention().completed;
        self.finish(&record, self.keys.completed(record.queue), retention).await?;
        Ok(record)
    }

    async fn fail(&self, id: JobId, error: &str, policy: &RetryPolicy) -> Result<JobRecord, PortError> {
        let mut record = self.load(id).await?;
        let dead = record.fail(error, policy, Utc::now());

        if dead {
            warn!(job_id = %id, job = %record.payload, attempts = record.attempts, "Job moved to failed list");
            let retention = record.queue.retention().failed;
            self.finish(&record, self.keys.failed(record.queue), retention).await?;
            return Ok(record);
        }

        let mut conn = self.conn.clone();
        let json = serde_json::to_string(&record).map_err(QueueError::from)?;
        self.scripts
            .reschedule
            .key(self.keys.active(record.queue))
            .key(self.keys.scheduled(record.queue))
            .key(self.keys.records())
            .arg(field(id))
            .arg(json)
            .arg(score(record.available_at))
            .invoke_async::<i64>(&mut conn)
            .await
            .map_err(QueueError::from)?;

        debug!(job_id = %id, retry_at = %record.available_at, "Job rescheduled");
        Ok(record)
    }

    async fn stats(&self, queue: QueueName) -> Result<QueueStats, PortError> {
        let now = score(Utc::now());
        let scheduled = self.keys.scheduled(queue);
        let mut conn = self.conn.clone();

        let (waiting, delayed, active, completed, failed): (u64, u64, u64, u64, u64) = redis::pipe()
            .zcount(&scheduled, "-inf", now)
            .zcount(&scheduled, format!("({now}"), "+inf")
            .zcard(self.keys.active(queue))
            .llen(self.keys.completed(queue))
            .llen(self.keys.failed(queue))
            .query_async(&mut conn)
            .await
            .map_err(QueueError::from)?;

        Ok(QueueStats {
            waiting,
            delayed,
            active,
            completed,
            failed,
            ..QueueStats::empty(queue)
        })
    }

    async fn claim_recurring_fire(&self, name: &str, fire_time: DateTime<Utc>) -> Result<bool, PortError> {
        let mut conn = self.conn.clone();
        let set = redis::cmd("SET")
            .arg(self.keys.fired(name, fire_time))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(self.fire_marker_ttl.as_secs().max(1))
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(QueueError::from)?;
        Ok(set.is_some())
    }

    async fn release_recurring_fire(&self, name: &str, fire_time: DateTime<Utc>) -> Result<(), PortError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.keys.fired(name, fire_time))
            .await
            .map_err(QueueError::from)?;
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, PortError> {
        match self.load(id).await {
            Ok(record) => Ok(Some(record)),
            Err(QueueError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
