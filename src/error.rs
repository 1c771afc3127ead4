//! Error types for the rollout engine.
//!
//! This module defines all error types that can occur while planning,
//! running, or persisting a rolling deployment.

use thiserror::Error;

/// Result type alias for rollout operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that can occur during a rollout.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The deployment configuration was invalid (e.g. a non-positive batch size).
    #[error("invalid deployment configuration: {0}")]
    Config(String),

    /// A deployment was requested while one was already in progress on the
    /// same fleet.
    #[error("a deployment is already in progress for this fleet")]
    ConcurrentDeployment,

    /// Reading or writing a fleet, desired-state, or snapshot document failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A fleet, desired-state, or snapshot document was not valid JSON, or
    /// did not match the expected shape.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    /// Creates a configuration error for an invalid batch size.
    #[must_use]
    pub fn invalid_batch_size(batch_size: i64) -> Self {
        Self::Config(format!("batch_size must be positive, got {batch_size}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = DeployError::invalid_batch_size(0);
        assert_eq!(
            err.to_string(),
            "invalid deployment configuration: batch_size must be positive, got 0"
        );

        let err = DeployError::ConcurrentDeployment;
        assert_eq!(
            err.to_string(),
            "a deployment is already in progress for this fleet"
        );
    }

    #[test]
    fn invalid_batch_size_helper() {
        match DeployError::invalid_batch_size(-3) {
            DeployError::Config(msg) => assert!(msg.contains("-3")),
            _ => panic!("expected Config error"),
        }
    }
}
