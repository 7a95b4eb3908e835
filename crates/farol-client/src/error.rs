//! Client error types
//!
//! Every failure surfaces as a structured code/message pair for the
//! application layer; the client never panics on malformed server
//! input. `NoUpdateAvailable` is a signaled condition, not an error the
//! caller should escalate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("no update available")]
    NoUpdateAvailable,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("install failed: {0}")]
    Install(String),

    #[error("invalid public key: {0}")]
    InvalidKey(String),
}

impl ClientError {
    /// Stable error code for the application layer
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::NoUpdateAvailable => "no_update",
            ClientError::Network(_) => "network",
            ClientError::InvalidResponse(_) => "invalid_response",
            ClientError::Download(_) => "download",
            ClientError::Verification(_) => "verification",
            ClientError::Install(_) => "install",
            ClientError::InvalidKey(_) => "invalid_key",
        }
    }

    /// True for errors worth retrying on the next poll cycle
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_) | ClientError::Download(_)
        )
    }
}
