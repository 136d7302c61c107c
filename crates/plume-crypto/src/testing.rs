//! In-memory key servers for tests
//!
//! Shares are derived deterministically from a per-server secret and the
//! identity bytes, so a fleet built from the same endpoint ids always
//! produces the same content keys. Servers can be taken offline or
//! scripted to reject proofs, and they count the requests they serve —
//! which is how the resolver short-circuit property is observed.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use plume_core::identity::IDENTITY_LEN;
use plume_session::credential::SessionCredential;

use crate::client::{KeyServer, KeyShare};
use crate::config::{Environment, KeyServerSetConfig};
use crate::error::{CryptoError, CryptoResult};

/// Deterministic in-memory key server.
pub struct MemoryKeyServer {
    endpoint_id: String,
    secret: [u8; 32],
    offline: AtomicBool,
    rejection: Mutex<Option<String>>,
    encryption_requests: AtomicUsize,
    decryption_requests: AtomicUsize,
}

impl MemoryKeyServer {
    /// Build a server whose share secret is derived from its endpoint id.
    pub fn new(endpoint_id: impl Into<String>) -> Self {
        let endpoint_id = endpoint_id.into();
        let secret = blake3::derive_key("plume memory key server secret", endpoint_id.as_bytes());
        Self {
            endpoint_id,
            secret,
            offline: AtomicBool::new(false),
            rejection: Mutex::new(None),
            encryption_requests: AtomicUsize::new(0),
            decryption_requests: AtomicUsize::new(0),
        }
    }

    /// Take the server offline (or bring it back).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reject every authorization proof with `reason`.
    pub fn reject_proofs(&self, reason: &str) {
        *self.rejection.lock().expect("rejection lock poisoned") = Some(reason.to_string());
    }

    /// Accept proofs again.
    pub fn accept_proofs(&self) {
        *self.rejection.lock().expect("rejection lock poisoned") = None;
    }

    /// Encryption share requests served or refused so far.
    pub fn encryption_requests(&self) -> usize {
        self.encryption_requests.load(Ordering::SeqCst)
    }

    /// Decryption share requests served or refused so far.
    pub fn decryption_requests(&self) -> usize {
        self.decryption_requests.load(Ordering::SeqCst)
    }

    fn share_for(&self, identity: &[u8; IDENTITY_LEN]) -> KeyShare {
        KeyShare {
            endpoint_id: self.endpoint_id.clone(),
            share: *blake3::keyed_hash(&self.secret, identity).as_bytes(),
        }
    }

    fn check_online(&self) -> CryptoResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CryptoError::ServerUnreachable {
                server: self.endpoint_id.clone(),
                reason: "server is offline".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KeyServer for MemoryKeyServer {
    fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    async fn encryption_share(&self, identity: &[u8; IDENTITY_LEN]) -> CryptoResult<KeyShare> {
        self.encryption_requests.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self.share_for(identity))
    }

    async fn decryption_share(
        &self,
        identity: &[u8; IDENTITY_LEN],
        credential: &SessionCredential,
        _proof: &[u8],
    ) -> CryptoResult<KeyShare> {
        self.decryption_requests.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if !credential.is_signed() {
            return Err(CryptoError::CredentialRejected {
                server: self.endpoint_id.clone(),
                reason: "credential carries no signature".to_string(),
            });
        }
        if let Some(reason) = self
            .rejection
            .lock()
            .expect("rejection lock poisoned")
            .clone()
        {
            return Err(CryptoError::ShareDenied {
                server: self.endpoint_id.clone(),
                reason,
            });
        }
        Ok(self.share_for(identity))
    }
}

/// Build a fleet of `count` memory servers with a matching configuration.
pub fn memory_fleet(
    environment: Environment,
    threshold: usize,
    count: usize,
) -> (KeyServerSetConfig, Vec<Arc<MemoryKeyServer>>) {
    let mut config = KeyServerSetConfig::new(environment).with_threshold(threshold);
    let mut fleet = Vec::with_capacity(count);
    for i in 0..count {
        let endpoint_id = format!("ks-{}", i);
        config = config.with_server(&endpoint_id, 1);
        fleet.push(Arc::new(MemoryKeyServer::new(endpoint_id)));
    }
    (config, fleet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_session::credential::CredentialKind;

    fn identity_bytes() -> [u8; IDENTITY_LEN] {
        let mut bytes = [0u8; IDENTITY_LEN];
        bytes[0] = 0x01;
        bytes[1] = 0x01;
        bytes
    }

    fn signed_credential() -> SessionCredential {
        let mut cred = SessionCredential::new("0xabc", "0xpkg", CredentialKind::Device, 0, 60_000);
        cred.signature = Some(vec![0u8; 64]);
        cred
    }

    #[tokio::test]
    async fn test_shares_are_deterministic_per_server() {
        let server = MemoryKeyServer::new("ks-0");
        let a = server.encryption_share(&identity_bytes()).await.unwrap();
        let b = server.encryption_share(&identity_bytes()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(server.encryption_requests(), 2);
    }

    #[tokio::test]
    async fn test_different_servers_different_shares() {
        let a = MemoryKeyServer::new("ks-0");
        let b = MemoryKeyServer::new("ks-1");
        assert_ne!(
            a.encryption_share(&identity_bytes()).await.unwrap().share,
            b.encryption_share(&identity_bytes()).await.unwrap().share
        );
    }

    #[tokio::test]
    async fn test_offline_server_is_unreachable() {
        let server = MemoryKeyServer::new("ks-0");
        server.set_offline(true);
        assert!(matches!(
            server.encryption_share(&identity_bytes()).await,
            Err(CryptoError::ServerUnreachable { .. })
        ));
        server.set_offline(false);
        assert!(server.encryption_share(&identity_bytes()).await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_proof_rejection() {
        let server = MemoryKeyServer::new("ks-0");
        server.reject_proofs("no policy object");
        let err = server
            .decryption_share(&identity_bytes(), &signed_credential(), b"proof")
            .await
            .unwrap_err();
        assert!(matches!(err, CryptoError::ShareDenied { .. }));

        server.accept_proofs();
        assert!(
            server
                .decryption_share(&identity_bytes(), &signed_credential(), b"proof")
                .await
                .is_ok()
        );
        assert_eq!(server.decryption_requests(), 2);
    }

    #[tokio::test]
    async fn test_unsigned_credential_rejected() {
        let server = MemoryKeyServer::new("ks-0");
        let unsigned = SessionCredential::new("0xabc", "0xpkg", CredentialKind::Device, 0, 60_000);
        let err = server
            .decryption_share(&identity_bytes(), &unsigned, b"proof")
            .await
            .unwrap_err();
        assert!(matches!(err, CryptoError::CredentialRejected { .. }));
    }

    #[test]
    fn test_memory_fleet_configuration_is_valid() {
        let (config, fleet) = memory_fleet(Environment::Local, 2, 3);
        config.validate().unwrap();
        assert_eq!(fleet.len(), 3);
        assert_eq!(config.servers[0].endpoint_id, fleet[0].endpoint_id());
    }
}
