//! Error types for plume-core

use thiserror::Error;

/// Errors from content identity encoding and decoding
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Malformed identity: {0}")]
    MalformedIdentity(String),

    #[error("Invalid publication address: {0}")]
    InvalidAddress(String),

    #[error("Title must not be empty")]
    EmptyTitle,
}

/// Errors surfaced by external collaborators (storage, chain RPC, signers)
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Chain RPC failed: {0}")]
    RpcFailed(String),

    #[error("Dry run rejected: {0}")]
    DryRunRejected(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;
