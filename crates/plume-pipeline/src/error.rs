//! Error types for plume-pipeline
//!
//! One aggregating enum over the subsystem errors, plus the two policies
//! the orchestrator applies to them: which kinds are retryable, and the
//! short actionable message each kind maps to for end users. Internal
//! detail stays in structured logs, never in user-facing strings.

use thiserror::Error;

use plume_access::error::AccessError;
use plume_core::error::{CollaboratorError, IdentityError};
use plume_crypto::error::CryptoError;
use plume_session::error::SessionError;

/// Errors from the pipeline orchestrator
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Data integrity mismatch: {0}")]
    DataIntegrityMismatch(String),

    #[error("Transport decoding failed: {0}")]
    TransportDecode(String),

    #[error("Decrypted content is not valid UTF-8")]
    NotUtf8,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    /// Whether retrying could change the outcome.
    ///
    /// Only network-class failures qualify. Validation and identity errors
    /// indicate a caller bug, and access denial cannot be retried into
    /// acceptance.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Crypto(
                CryptoError::InsufficientKeyServers { .. }
                | CryptoError::KeyServerUnavailable { .. }
                | CryptoError::ServerUnreachable { .. },
            ) => true,
            Self::Collaborator(
                CollaboratorError::StorageUnavailable(_) | CollaboratorError::RpcFailed(_),
            ) => true,
            Self::Access(AccessError::ChainUnavailable(_)) => true,
            _ => false,
        }
    }

    /// The one short, actionable message shown to the end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Identity(_) => {
                "Check the content, title, and publication address, then try again."
            }
            Self::Access(AccessError::Denied { .. } | AccessError::ProofRejected { .. })
            | Self::Crypto(CryptoError::ShareDenied { .. }) => {
                "You don't have access to this content."
            }
            Self::Session(SessionError::AuthenticationFailed(_))
            | Self::Crypto(
                CryptoError::AuthenticationFailed(_) | CryptoError::CredentialRejected { .. },
            )
            | Self::Collaborator(CollaboratorError::SigningFailed(_)) => {
                "Connect your wallet and try again."
            }
            Self::Crypto(
                CryptoError::InsufficientKeyServers { .. }
                | CryptoError::KeyServerUnavailable { .. }
                | CryptoError::ServerUnreachable { .. },
            )
            | Self::Collaborator(
                CollaboratorError::StorageUnavailable(_) | CollaboratorError::RpcFailed(_),
            )
            | Self::Access(AccessError::ChainUnavailable(_)) => {
                "The service is temporarily unavailable. Try again shortly."
            }
            Self::DataIntegrityMismatch(_) => {
                "This content failed an integrity check and cannot be displayed."
            }
            Self::Configuration(_) | Self::Crypto(CryptoError::Configuration(_)) => {
                "The application is misconfigured. Contact the publication."
            }
            _ => "Something went wrong while processing this content. Try again shortly.",
        }
    }
}
