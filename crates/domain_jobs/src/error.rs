//! Job processing errors

use thiserror::Error;

use core_kernel::PortError;

/// Errors raised while scheduling or running background jobs
#[derive(Debug, Error)]
pub enum JobError {
    /// A handler could not finish the job
    #[error("Job handler failed: {message}")]
    Handler { message: String, retryable: bool },

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Unknown queue '{0}'")]
    UnknownQueue(String),

    #[error("Job {0} not found")]
    NotFound(String),

    #[error("Job payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl JobError {
    /// A failure worth retrying with backoff
    pub fn retryable(message: impl Into<String>) -> Self {
        JobError::Handler {
            message: message.into(),
            retryable: true,
        }
    }

    /// A failure that goes straight to the dead-letter list
    pub fn permanent(message: impl Into<String>) -> Self {
        JobError::Handler {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_schedule(expression: &str, reason: impl Into<String>) -> Self {
        JobError::InvalidSchedule {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the queue should schedule another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::Handler { retryable, .. } => *retryable,
            JobError::Port(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(JobError::retryable("sha timeout").is_retryable());
        assert!(!JobError::permanent("bad payload").is_retryable());
        assert!(JobError::Port(PortError::ServiceUnavailable { service: "redis".into() }).is_retryable());
        assert!(!JobError::UnknownQueue("mail".into()).is_retryable());
    }
}
