//! Named work queues

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::JobError;

/// How many finished jobs a queue keeps for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    pub completed: usize,
    pub failed: usize,
}

impl Retention {
    pub const fn new(completed: usize, failed: usize) -> Self {
        Self { completed, failed }
    }
}

impl Default for Retention {
    fn default() -> Self {
        Self::new(10, 5)
    }
}

/// The worker's queues; every job payload belongs to exactly one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Claims,
    Inventory,
    Notification,
    Backup,
}

impl QueueName {
    pub const ALL: [QueueName; 4] = [
        QueueName::Claims,
        QueueName::Inventory,
        QueueName::Notification,
        QueueName::Backup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Claims => "claims",
            QueueName::Inventory => "inventory",
            QueueName::Notification => "notification",
            QueueName::Backup => "backup",
        }
    }

    /// Human readable name used in logs and stats
    pub fn display_name(&self) -> &'static str {
        match self {
            QueueName::Claims => "claims processing",
            QueueName::Inventory => "inventory alerts",
            QueueName::Notification => "notifications",
            QueueName::Backup => "database backup",
        }
    }

    pub fn retention(&self) -> Retention {
        match self {
            QueueName::Backup => Retention::new(7, 3),
            _ => Retention::default(),
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueName::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| JobError::UnknownQueue(s.to_string()))
    }
}
