//! Mock collaborators
//!
//! In-memory implementations of the collaborator seams, used by the
//! downstream crates' tests. The blob store is genuinely content-addressed
//! (BLAKE3); the chain can be scripted to reject specific entrypoints and
//! records every call it sees.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use ed25519_dalek::Signer as _;
use ed25519_dalek::SigningKey;
use rand::RngCore;

use crate::error::CollaboratorError;
use crate::traits::{AuthorizationCall, BlobId, BlobStore, ChainRpc, Signer};

/// In-memory content-addressed blob store.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Bytes) -> Result<BlobId, CollaboratorError> {
        let id = hex::encode(blake3::hash(&bytes).as_bytes());
        self.blobs.insert(id.clone(), bytes);
        Ok(BlobId::new(id))
    }

    async fn get(&self, id: &BlobId) -> Result<Bytes, CollaboratorError> {
        self.blobs
            .get(id.as_str())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CollaboratorError::BlobNotFound(id.to_string()))
    }
}

/// Scriptable chain RPC mock.
///
/// Accepts every authorization call by default. Entrypoints added with
/// [`MockChain::reject_entrypoint`] fail their dry run, which is how tests
/// model a caller who does not actually hold a given credential on chain.
#[derive(Default)]
pub struct MockChain {
    rejected: DashMap<String, String>,
    calls: Mutex<Vec<AuthorizationCall>>,
    dry_runs: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make dry runs of `entrypoint` fail with `reason`.
    pub fn reject_entrypoint(&self, entrypoint: &str, reason: &str) {
        self.rejected
            .insert(entrypoint.to_string(), reason.to_string());
    }

    /// Accept an entrypoint again.
    pub fn accept_entrypoint(&self, entrypoint: &str) {
        self.rejected.remove(entrypoint);
    }

    /// Every call built so far, in order.
    pub fn calls(&self) -> Vec<AuthorizationCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    /// Number of dry runs executed.
    pub fn dry_run_count(&self) -> usize {
        self.dry_runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn build_authorization_call(
        &self,
        call: &AuthorizationCall,
    ) -> Result<Vec<u8>, CollaboratorError> {
        self.calls.lock().expect("call log poisoned").push(call.clone());
        serde_json::to_vec(call).map_err(|e| CollaboratorError::RpcFailed(e.to_string()))
    }

    async fn dry_run(&self, tx_bytes: &[u8]) -> Result<(), CollaboratorError> {
        self.dry_runs.fetch_add(1, Ordering::SeqCst);
        let call: AuthorizationCall = serde_json::from_slice(tx_bytes)
            .map_err(|e| CollaboratorError::RpcFailed(e.to_string()))?;
        if let Some(reason) = self.rejected.get(&call.entrypoint) {
            return Err(CollaboratorError::DryRunRejected(reason.value().clone()));
        }
        Ok(())
    }
}

/// Non-interactive Ed25519 test signer, a stand-in for a connected wallet.
pub struct Ed25519Signer {
    key: SigningKey,
    address: String,
}

impl Ed25519Signer {
    /// Generate a signer with a fresh random keypair.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    /// Deterministic signer from a fixed seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&seed);
        let address = format!("0x{}", hex::encode(key.verifying_key().to_bytes()));
        Self { key, address }
    }
}

#[async_trait]
impl Signer for Ed25519Signer {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CollaboratorError> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}

/// Signer that always fails, for exercising signing-failure paths.
pub struct FailingSigner {
    address: String,
}

impl FailingSigner {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Signer for FailingSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, CollaboratorError> {
        Err(CollaboratorError::SigningFailed(
            "wallet prompt dismissed".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::CallArg;

    #[tokio::test]
    async fn test_blob_store_round_trip() {
        let store = MemoryBlobStore::new();
        let id = store.put(Bytes::from_static(b"hello")).await.unwrap();
        let back = store.get(&id).await.unwrap();
        assert_eq!(back, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_blob_store_is_content_addressed() {
        let store = MemoryBlobStore::new();
        let a = store.put(Bytes::from_static(b"same")).await.unwrap();
        let b = store.put(Bytes::from_static(b"same")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_blob_store_missing_blob() {
        let store = MemoryBlobStore::new();
        let err = store.get(&BlobId::new("missing")).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::BlobNotFound(_)));
    }

    #[tokio::test]
    async fn test_mock_chain_accepts_by_default() {
        let chain = MockChain::new();
        let call = AuthorizationCall {
            package: "0xpkg".to_string(),
            entrypoint: "assert_owner".to_string(),
            args: vec![CallArg::Bytes(vec![1])],
        };
        let tx = chain.build_authorization_call(&call).await.unwrap();
        chain.dry_run(&tx).await.unwrap();
        assert_eq!(chain.calls().len(), 1);
        assert_eq!(chain.dry_run_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_chain_scripted_rejection() {
        let chain = MockChain::new();
        chain.reject_entrypoint("assert_subscription", "expired");
        let call = AuthorizationCall {
            package: "0xpkg".to_string(),
            entrypoint: "assert_subscription".to_string(),
            args: vec![],
        };
        let tx = chain.build_authorization_call(&call).await.unwrap();
        let err = chain.dry_run(&tx).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::DryRunRejected(_)));

        chain.accept_entrypoint("assert_subscription");
        chain.dry_run(&tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_ed25519_signer_signs() {
        let signer = Ed25519Signer::from_seed([7u8; 32]);
        assert!(signer.address().starts_with("0x"));
        let sig = signer.sign(b"challenge").await.unwrap();
        assert_eq!(sig.len(), 64);
        // Deterministic for a fixed seed and message
        assert_eq!(sig, signer.sign(b"challenge").await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_signer_fails() {
        let signer = FailingSigner::new("0xdead");
        assert!(matches!(
            signer.sign(b"challenge").await,
            Err(CollaboratorError::SigningFailed(_))
        ));
    }
}
