//! Queue error types
//!
//! Redis and serialization failures, and their translation into the
//! `PortError` seen by the domain layer.

use thiserror::Error;

use core_kernel::{JobId, PortError};

#[derive(Debug, Error)]
pub enum QueueError {
    /// The server could not be reached or dropped the connection
    #[error("Redis connection failed: {0}")]
    ConnectionFailed(String),

    /// A command or script was rejected
    #[error("Redis command failed: {0}")]
    CommandFailed(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// A stored job record could not be read or written as JSON
    #[error("Invalid job record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QueueError {
    pub fn is_connection_error(&self) -> bool {
        matches!(self, QueueError::ConnectionFailed(_))
    }
}

impl From<redis::RedisError> for QueueError {
    fn from(error: redis::RedisError) -> Self {
        if error.is_io_error() || error.is_timeout() || error.is_connection_refusal() {
            QueueError::ConnectionFailed(error.to_string())
        } else {
            QueueError::CommandFailed(error.to_string())
        }
    }
}

impl From<QueueError> for PortError {
    fn from(error: QueueError) -> Self {
        match error {
            QueueError::ConnectionFailed(message) => PortError::connection(message),
            QueueError::NotFound(id) => PortError::not_found("Job", id),
            QueueError::Serialization(e) => PortError::Transformation { message: e.to_string() },
            QueueError::CommandFailed(message) => PortError::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_mapping() {
        let port: PortError = QueueError::ConnectionFailed("refused".into()).into();
        assert!(port.is_transient());

        let port: PortError = QueueError::NotFound(JobId::new()).into();
        assert!(port.is_not_found());

        let port: PortError = QueueError::CommandFailed("WRONGTYPE".into()).into();
        assert!(!port.is_transient());
    }

    #[test]
    fn test_serialization_error_is_not_transient() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = QueueError::from(json_error);
        assert!(!error.is_connection_error());
        let port: PortError = error.into();
        assert!(matches!(port, PortError::Transformation { .. }));
    }
}
