//! Collaborator seams
//!
//! The pipeline talks to three external systems through narrow async
//! traits: a content-addressed blob store, a chain RPC endpoint for
//! building and dry-running authorization calls, and a signer that may be
//! an interactive wallet or a non-interactive local keypair. Implementations
//! live elsewhere; [`crate::mock`] ships in-memory stand-ins for tests.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// Identifier of a stored blob, assigned by the storage collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobId(String);

impl BlobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content-addressed, immutable blob storage.
///
/// The pipeline does not manage retention or deletion; it only puts
/// ciphertext envelopes and gets them back unchanged.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their content-derived identifier.
    async fn put(&self, bytes: Bytes) -> Result<BlobId, CollaboratorError>;

    /// Fetch bytes by identifier.
    async fn get(&self, id: &BlobId) -> Result<Bytes, CollaboratorError>;
}

/// One argument of an on-chain authorization call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallArg {
    /// Reference to an on-chain object (capability, subscription, token, ...).
    Object(String),
    /// Raw bytes passed by value.
    Bytes(Vec<u8>),
}

/// A chain call against a fixed policy package and entrypoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCall {
    /// The policy package identifier.
    pub package: String,
    /// Well-known entrypoint name for one credential type.
    pub entrypoint: String,
    /// Call arguments.
    pub args: Vec<CallArg>,
}

/// Chain RPC boundary.
///
/// The pipeline constructs authorization calls and checks whether they are
/// accepted; it never interprets the chain program's internal state.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Serialize an authorization call into transaction bytes.
    async fn build_authorization_call(
        &self,
        call: &AuthorizationCall,
    ) -> Result<Vec<u8>, CollaboratorError>;

    /// Dry-run transaction bytes. `Ok(())` means the chain accepts the call.
    async fn dry_run(&self, tx_bytes: &[u8]) -> Result<(), CollaboratorError>;
}

/// Message signer.
///
/// May be interactive (wallet prompt, suspends pending user action) or
/// non-interactive (local keypair). The pipeline only requires this single
/// method contract.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The address this signer controls, in `0x` hex form.
    fn address(&self) -> &str;

    /// Sign a message, returning an opaque signature blob.
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_id_display() {
        let id = BlobId::new("abc123");
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(format!("{}", id), "abc123");
    }

    #[test]
    fn test_authorization_call_serializes() {
        let call = AuthorizationCall {
            package: "0xpkg".to_string(),
            entrypoint: "assert_owner".to_string(),
            args: vec![
                CallArg::Object("0xcap".to_string()),
                CallArg::Bytes(vec![1, 2, 3]),
            ],
        };
        let json = serde_json::to_string(&call).unwrap();
        let back: AuthorizationCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back, call);
    }
}
