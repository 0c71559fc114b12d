//! Infrastructure Queue Layer
//!
//! Redis persistence for background jobs. [`RedisJobQueue`] implements the
//! `JobQueue` port from `domain_jobs`: the worker runtime and the API only
//! ever see the port.
//!
//! # Key layout
//!
//! Every key starts with the configured prefix (`clinic:jobs` by default):
//!
//! | Key                         | Type | Contents                                  |
//! |-----------------------------|------|-------------------------------------------|
//! | `{prefix}:records`          | HASH | job id to JSON job record                 |
//! | `{prefix}:{queue}:scheduled`| ZSET | waiting and delayed ids, scored by due ms |
//! | `{prefix}:{queue}:active`   | ZSET | ids held by a worker, scored by lease ms  |
//! | `{prefix}:{queue}:completed`| LIST | most recent completed ids                 |
//! | `{prefix}:{queue}:failed`   | LIST | most recent dead-lettered ids             |
//! | `{prefix}:fired:{name}:{ts}`| STR  | recurring fire marker, set with `NX EX`   |
//! | `{prefix}:unique:{key}`     | STR  | id of the unfinished job holding the key  |
//!
//! Workers poll [`RedisJobQueue`]'s `requeue_expired` before each dequeue:
//! active ids whose lease deadline passed go back to `scheduled` and the
//! abandoned run counts as a failed attempt.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_queue::{QueueConfig, RedisJobQueue};
//!
//! let queue = RedisJobQueue::connect(QueueConfig::new("redis://localhost:6379")).await?;
//! queue.enqueue(JobPayload::ReconcileClaims).await?;
//! ```

pub mod config;
pub mod error;
pub mod keys;
pub mod redis_queue;
mod scripts;

pub use config::QueueConfig;
pub use error::QueueError;
pub use keys::QueueKeys;
pub use redis_queue::RedisJobQueue;
