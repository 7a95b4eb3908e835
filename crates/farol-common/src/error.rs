//! Error types for the Farol OTA deployment domain
//!
//! This module defines `FarolError`, the application-specific error enum
//! shared by the orchestrator, the health monitor, and the HTTP layer.
//! Services return `anyhow::Result` and attach a `FarolError` so handlers
//! can downcast and map variants onto HTTP status codes.

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum FarolError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("{0} '{1}' not found")]
    NotFound(&'static str, String),

    #[error("no target devices found for deployment")]
    NoTargetDevices,

    #[error("cannot {action} deployment in status '{status}'")]
    InvalidStateTransition {
        action: &'static str,
        status: String,
    },

    #[error("no previous stable release available for rollback")]
    NoPreviousRelease,

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("signing key not configured: {0}")]
    KeyNotConfigured(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl FarolError {
    /// True for errors a caller may reasonably retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, FarolError::Network(_) | FarolError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FarolError::NotFound("release", "rel-001".to_string());
        assert_eq!(format!("{}", err), "release 'rel-001' not found");

        let err = FarolError::InvalidStateTransition {
            action: "pause",
            status: "completed".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "cannot pause deployment in status 'completed'"
        );

        let err = FarolError::Configuration("rollout percentage must be between 1 and 100".into());
        assert_eq!(
            format!("{}", err),
            "invalid configuration: rollout percentage must be between 1 and 100"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(FarolError::Network("connection reset".into()).is_retryable());
        assert!(!FarolError::NoTargetDevices.is_retryable());
        assert!(!FarolError::Verification("hash mismatch".into()).is_retryable());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = FarolError::NoPreviousRelease.into();
        assert!(matches!(
            err.downcast_ref::<FarolError>(),
            Some(FarolError::NoPreviousRelease)
        ));
    }
}
