//! Error types for plume-session

use thiserror::Error;

/// Errors from session credential management
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Credential store I/O failed: {0}")]
    StoreIo(String),

    #[error("Device keypair error: {0}")]
    DeviceKeypair(String),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
