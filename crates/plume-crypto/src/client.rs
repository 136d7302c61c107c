//! Threshold crypto client
//!
//! Fan-out share collection against the configured key-server set, k-of-n
//! enforcement, and the symmetric seal/open around the derived content key.
//!
//! The client is stateless across calls except for a lazily initialized,
//! reusable connection handle. Connection setup is retried; per-request
//! threshold failures are not — retry policy lives in the pipeline
//! orchestrator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use plume_core::identity::{ContentIdentity, IDENTITY_LEN};
use plume_session::credential::SessionCredential;

use crate::config::{Environment, KeyServerSetConfig};
use crate::envelope::{EncryptedEnvelope, EnvelopeBody, NONCE_SIZE};
use crate::error::{CryptoError, CryptoResult};

/// Key share size in bytes.
pub const SHARE_SIZE: usize = 32;

/// Default per-request timeout for share requests.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection setup attempts before giving up.
const CONNECT_ATTEMPTS: u32 = 3;

/// An opaque key share released by one server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyShare {
    /// The server that released the share.
    pub endpoint_id: String,
    /// Opaque share bytes. The IBE math behind them is the server's.
    pub share: [u8; SHARE_SIZE],
}

/// One independent key-holding server.
///
/// Encryption shares are public: anyone may encrypt under any identity.
/// Decryption shares are released only after the server verifies the
/// caller's signed session credential and the chain-verifiable
/// authorization proof.
#[async_trait]
pub trait KeyServer: Send + Sync {
    /// Stable endpoint identifier, matching the configured entry.
    fn endpoint_id(&self) -> &str;

    /// Establish the server connection. Default is a no-op for transports
    /// without a handshake.
    async fn connect(&self) -> CryptoResult<()> {
        Ok(())
    }

    /// Release the encryption share for `identity`.
    async fn encryption_share(&self, identity: &[u8; IDENTITY_LEN]) -> CryptoResult<KeyShare>;

    /// Verify `credential` and `proof`, then release the decryption share
    /// for `identity`.
    async fn decryption_share(
        &self,
        identity: &[u8; IDENTITY_LEN],
        credential: &SessionCredential,
        proof: &[u8],
    ) -> CryptoResult<KeyShare>;
}

/// k-of-n threshold encryption client over a fixed key-server set.
pub struct ThresholdClient {
    config: KeyServerSetConfig,
    servers: Vec<Arc<dyn KeyServer>>,
    connection: OnceCell<()>,
    request_timeout: Duration,
}

impl std::fmt::Debug for ThresholdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdClient")
            .field("config", &self.config)
            .field("server_count", &self.servers.len())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl ThresholdClient {
    /// Build a client over `servers`, validating the configuration eagerly.
    ///
    /// `expected_environment` is the environment the session runs in; a
    /// key-server set configured for any other environment is rejected here
    /// rather than silently used.
    pub fn new(
        config: KeyServerSetConfig,
        servers: Vec<Arc<dyn KeyServer>>,
        expected_environment: Environment,
    ) -> CryptoResult<Self> {
        config.validate()?;
        if config.environment != expected_environment {
            return Err(CryptoError::Configuration(format!(
                "key-server set is configured for {} but the session expects {}",
                config.environment, expected_environment
            )));
        }
        for entry in &config.servers {
            if !servers.iter().any(|s| s.endpoint_id() == entry.endpoint_id) {
                return Err(CryptoError::Configuration(format!(
                    "no handle for configured key server {}",
                    entry.endpoint_id
                )));
            }
        }
        for server in &servers {
            if !config
                .servers
                .iter()
                .any(|entry| entry.endpoint_id == server.endpoint_id())
            {
                return Err(CryptoError::Configuration(format!(
                    "server handle {} is not in the configured set",
                    server.endpoint_id()
                )));
            }
        }
        Ok(Self {
            config,
            servers,
            connection: OnceCell::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Override the per-request timeout.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// The configured minimum threshold.
    pub fn threshold(&self) -> usize {
        self.config.threshold
    }

    /// Initialize the reusable connection to the server set, retrying
    /// setup a bounded number of times.
    async fn connect(&self) -> CryptoResult<()> {
        self.connection
            .get_or_try_init(|| async {
                let mut last_error = None;
                for attempt in 1..=CONNECT_ATTEMPTS {
                    match self.connect_all().await {
                        Ok(()) => {
                            debug!(servers = self.servers.len(), "key-server set connected");
                            return Ok(());
                        }
                        Err(e) => {
                            warn!(attempt, error = %e, "key-server connection setup failed");
                            last_error = Some(e);
                            sleep(Duration::from_millis(100 * attempt as u64)).await;
                        }
                    }
                }
                Err(last_error.unwrap_or_else(|| {
                    CryptoError::Configuration("connection setup failed".to_string())
                }))
            })
            .await
            .map(|_| ())
    }

    async fn connect_all(&self) -> CryptoResult<()> {
        for server in &self.servers {
            server.connect().await?;
        }
        Ok(())
    }

    /// Encrypt `plaintext` under `identity` with the configured threshold.
    pub async fn encrypt(
        &self,
        plaintext: &[u8],
        identity: &ContentIdentity,
    ) -> CryptoResult<EncryptedEnvelope> {
        self.encrypt_with_threshold(plaintext, identity, self.config.threshold)
            .await
    }

    /// Encrypt `plaintext` under `identity` requiring `threshold` shares.
    ///
    /// Fewer than `threshold` reachable servers is a hard failure with no
    /// partial output.
    #[instrument(skip(self, plaintext), fields(identity = %identity, size = plaintext.len(), threshold))]
    pub async fn encrypt_with_threshold(
        &self,
        plaintext: &[u8],
        identity: &ContentIdentity,
        threshold: usize,
    ) -> CryptoResult<EncryptedEnvelope> {
        if threshold == 0 || threshold > self.servers.len() {
            return Err(CryptoError::Configuration(format!(
                "threshold {} is outside 1..={}",
                threshold,
                self.servers.len()
            )));
        }
        self.connect().await?;

        let identity_bytes = identity.encode();
        let mut requests = JoinSet::new();
        for server in &self.servers {
            let server = server.clone();
            let request_timeout = self.request_timeout;
            requests.spawn(async move {
                let endpoint = server.endpoint_id().to_string();
                match timeout(request_timeout, server.encryption_share(&identity_bytes)).await {
                    Ok(Ok(share)) => Ok(share),
                    Ok(Err(e)) => Err((endpoint, e.to_string())),
                    Err(_) => Err((endpoint, "request timed out".to_string())),
                }
            });
        }

        let mut shares = Vec::new();
        while let Some(joined) = requests.join_next().await {
            match joined {
                Ok(Ok(share)) => shares.push(share),
                Ok(Err((server, reason))) => {
                    warn!(server, reason, "encryption share request failed");
                }
                Err(e) => warn!(error = %e, "share request task failed"),
            }
        }

        if shares.len() < threshold {
            return Err(CryptoError::InsufficientKeyServers {
                required: threshold,
                available: shares.len(),
            });
        }

        // Deterministic selection: the `threshold` lowest endpoint ids
        shares.sort_by(|a, b| a.endpoint_id.cmp(&b.endpoint_id));
        shares.truncate(threshold);
        let server_ids: Vec<String> = shares.iter().map(|s| s.endpoint_id.clone()).collect();

        let key = derive_content_key(&identity_bytes, &shares)?;
        let cipher = ChaCha20Poly1305::new_from_slice(key.as_ref())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        debug!(servers = ?server_ids, "content sealed");
        Ok(EncryptedEnvelope::new(
            *identity,
            EnvelopeBody {
                threshold: threshold as u8,
                server_ids,
                nonce: nonce_bytes,
                ciphertext,
            },
        ))
    }

    /// Decrypt `envelope` by collecting decryption shares from the servers
    /// recorded in it.
    ///
    /// Each recorded server must release its share: the content key was
    /// derived from exactly those shares at encryption time.
    #[instrument(skip(self, envelope, credential, proof), fields(identity = %envelope.identity()))]
    pub async fn decrypt(
        &self,
        envelope: &EncryptedEnvelope,
        credential: &SessionCredential,
        proof: &[u8],
        now_millis: u64,
    ) -> CryptoResult<Vec<u8>> {
        if !credential.is_signed() {
            return Err(CryptoError::AuthenticationFailed(
                "session credential is unsigned".to_string(),
            ));
        }
        if credential.is_expired(now_millis, 0) {
            return Err(CryptoError::AuthenticationFailed(
                "session credential has expired".to_string(),
            ));
        }
        self.connect().await?;

        let identity_bytes = envelope.identity().encode();
        let required = envelope.body().server_ids.len();

        let mut requests = JoinSet::new();
        for endpoint_id in &envelope.body().server_ids {
            let Some(server) = self
                .servers
                .iter()
                .find(|s| s.endpoint_id() == endpoint_id.as_str())
                .cloned()
            else {
                warn!(server = %endpoint_id, "recorded key server is not in the configured set");
                continue;
            };
            let credential = credential.clone();
            let proof = proof.to_vec();
            let request_timeout = self.request_timeout;
            requests.spawn(async move {
                let endpoint = server.endpoint_id().to_string();
                match timeout(
                    request_timeout,
                    server.decryption_share(&identity_bytes, &credential, &proof),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(CryptoError::ServerUnreachable {
                        server: endpoint,
                        reason: "request timed out".to_string(),
                    }),
                }
            });
        }

        let mut shares = Vec::new();
        let mut denied = None;
        let mut rejected = None;
        while let Some(joined) = requests.join_next().await {
            match joined {
                Ok(Ok(share)) => shares.push(share),
                Ok(Err(e @ CryptoError::ShareDenied { .. })) => {
                    warn!(error = %e, "decryption share denied");
                    denied.get_or_insert(e);
                }
                Ok(Err(e @ CryptoError::CredentialRejected { .. })) => {
                    warn!(error = %e, "session credential rejected");
                    rejected.get_or_insert(e);
                }
                Ok(Err(e)) => warn!(error = %e, "decryption share request failed"),
                Err(e) => warn!(error = %e, "share request task failed"),
            }
        }

        // A rejected proof dominates unavailability: retrying cannot help.
        if let Some(e) = denied {
            return Err(e);
        }
        if let Some(e) = rejected {
            return Err(e);
        }
        if shares.len() < required {
            return Err(CryptoError::KeyServerUnavailable {
                required,
                responded: shares.len(),
            });
        }

        shares.sort_by(|a, b| a.endpoint_id.cmp(&b.endpoint_id));
        let key = derive_content_key(&identity_bytes, &shares)?;
        let cipher = ChaCha20Poly1305::new_from_slice(key.as_ref())
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        let nonce = Nonce::from_slice(&envelope.body().nonce);
        cipher
            .decrypt(nonce, envelope.body().ciphertext.as_slice())
            .map_err(|_| {
                CryptoError::DecryptionFailed("ciphertext authentication failed".to_string())
            })
    }
}

/// Derive the content key from collected shares.
///
/// HKDF-SHA256 with the identity bytes as salt and the shares, in
/// endpoint-id order, as input key material. Both sides must feed shares in
/// the same order or they derive different keys.
fn derive_content_key(
    identity: &[u8; IDENTITY_LEN],
    shares: &[KeyShare],
) -> CryptoResult<Zeroizing<[u8; 32]>> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(shares.len() * SHARE_SIZE));
    for share in shares {
        ikm.extend_from_slice(&share.share);
    }
    let hkdf = Hkdf::<Sha256>::new(Some(identity), &ikm);
    let mut key = Zeroizing::new([0u8; 32]);
    hkdf.expand(b"plume-content-key", key.as_mut())
        .map_err(|e| CryptoError::EncryptionFailed(format!("key derivation failed: {}", e)))?;
    Ok(key)
}
