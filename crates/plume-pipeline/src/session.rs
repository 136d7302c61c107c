//! Pipeline session
//!
//! The single entry point for the full encrypt-for-storage and
//! decrypt-from-storage flows. One [`PipelineSession`] is constructed per
//! logical user session and passed by reference wherever the pipeline is
//! needed; it owns the threshold client, the credential manager, the
//! authorization resolver, and the collaborator handles, so there is no
//! hidden global state and concurrent sessions for different accounts
//! cannot interfere.
//!
//! The encrypt path ends at the transport encoding handed to the storage
//! collaborator; the decrypt path begins by fetching from it. Media batches
//! fan out one task per file and fan back in without letting one failure
//! abort or hide its siblings.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use plume_access::credential::AccessCredentialSet;
use plume_access::resolver::AccessResolver;
use plume_core::identity::{CONTENT_TAG, ContentIdentity, IDENTITY_LEN, PublicationAddress};
use plume_core::traits::{BlobId, BlobStore, ChainRpc, Signer};
use plume_crypto::client::{KeyServer, ThresholdClient};
use plume_crypto::config::{Environment, KeyServerSetConfig};
use plume_crypto::envelope::EncryptedEnvelope;
use plume_session::device::{DeviceKeypair, LocalSigner};
use plume_session::manager::SessionCredentialManager;
use plume_session::store::CredentialStore;

use crate::error::PipelineError;
use crate::progress::{NoProgress, PipelineStage, ProgressSink};
use crate::retry::RetryPolicy;

/// Default cap on plaintext size: 10 MiB.
pub const DEFAULT_MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024;

/// Algorithm tag recorded in encryption metadata.
pub const ALGORITHM_TAG: &str = "threshold-ibe+chacha20-poly1305";

/// Metadata returned alongside an encrypted payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptionMetadata {
    /// Plaintext size in bytes.
    pub original_size: usize,
    /// Serialized envelope size in bytes, before transport encoding.
    pub encrypted_size: usize,
    /// Cipher suite identifier.
    pub algorithm: &'static str,
    /// Whether the envelope identity-binding check passed.
    pub validated: bool,
}

/// Result of encrypting one article.
#[derive(Clone, Debug)]
pub struct EncryptedArticle {
    /// Hex form of the content identity, for application metadata.
    pub identity_hex: String,
    /// Base64 transport encoding of the envelope, for the storage handoff.
    pub payload_b64: String,
    pub metadata: EncryptionMetadata,
}

/// Result of decrypting one article.
#[derive(Clone, Debug)]
pub struct DecryptedArticle {
    /// The article markdown.
    pub content: String,
    /// Whether the envelope's embedded identity differed from the expected
    /// metadata identity. Logged as a warning; may indicate benign drift.
    pub identity_drift: bool,
}

/// One media file to encrypt.
#[derive(Clone, Debug)]
pub struct MediaFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Result of encrypting one media file.
#[derive(Clone, Debug)]
pub struct EncryptedMedia {
    pub filename: String,
    pub identity_hex: String,
    pub payload_b64: String,
    pub metadata: EncryptionMetadata,
}

/// Reference to one stored encrypted media file.
#[derive(Clone, Debug)]
pub struct MediaRef {
    pub name: String,
    pub blob: BlobId,
    /// Expected identity hex from application metadata.
    pub identity_hex: String,
}

/// Result of decrypting one media file.
#[derive(Clone, Debug)]
pub struct DecryptedMedia {
    pub name: String,
    pub bytes: Vec<u8>,
    pub identity_drift: bool,
}

/// One failed item in a batch.
#[derive(Debug)]
pub struct BatchFailure {
    pub name: String,
    pub error: PipelineError,
}

/// Outcome of a media batch: every success and every failure, in input
/// order. Partial failure stays visible; nothing is swallowed.
#[derive(Debug, Default)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BatchFailure>,
}

impl<T> BatchReport<T> {
    /// Items processed in total.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// The first error observed, if any.
    pub fn first_error(&self) -> Option<&PipelineError> {
        self.failed.first().map(|f| &f.error)
    }

    /// Whether every item succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Builder for a [`PipelineSession`].
pub struct PipelineSessionBuilder {
    environment: Option<Environment>,
    key_servers: Option<(KeyServerSetConfig, Vec<Arc<dyn KeyServer>>)>,
    blobs: Option<Arc<dyn BlobStore>>,
    chain: Option<Arc<dyn ChainRpc>>,
    wallet: Option<Arc<dyn Signer>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    package_id: Option<String>,
    progress: Arc<dyn ProgressSink>,
    max_content_size: usize,
    retry: RetryPolicy,
}

impl PipelineSessionBuilder {
    pub fn new() -> Self {
        Self {
            environment: None,
            key_servers: None,
            blobs: None,
            chain: None,
            wallet: None,
            credentials: None,
            package_id: None,
            progress: Arc::new(NoProgress),
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    /// The deployment environment this session runs in. The key-server set
    /// must be configured for the same environment.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// The key-server set configuration and one handle per configured server.
    pub fn key_servers(
        mut self,
        config: KeyServerSetConfig,
        servers: Vec<Arc<dyn KeyServer>>,
    ) -> Self {
        self.key_servers = Some((config, servers));
        self
    }

    pub fn blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn chain_rpc(mut self, chain: Arc<dyn ChainRpc>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// The interactive wallet signer for privileged decryption paths.
    pub fn wallet_signer(mut self, wallet: Arc<dyn Signer>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    /// The on-chain policy package identifier.
    pub fn package_id(mut self, package_id: impl Into<String>) -> Self {
        self.package_id = Some(package_id.into());
        self
    }

    pub fn progress_sink(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn max_content_size(mut self, max_content_size: usize) -> Self {
        self.max_content_size = max_content_size;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Validate the configuration and assemble the session.
    pub async fn build(self) -> Result<PipelineSession, PipelineError> {
        let environment = self
            .environment
            .ok_or_else(|| PipelineError::Configuration("environment is required".to_string()))?;
        let (ks_config, ks_handles) = self.key_servers.ok_or_else(|| {
            PipelineError::Configuration("key-server set is required".to_string())
        })?;
        let blobs = self
            .blobs
            .ok_or_else(|| PipelineError::Configuration("blob store is required".to_string()))?;
        let chain = self
            .chain
            .ok_or_else(|| PipelineError::Configuration("chain RPC is required".to_string()))?;
        let wallet = self
            .wallet
            .ok_or_else(|| PipelineError::Configuration("wallet signer is required".to_string()))?;
        let credentials = self.credentials.ok_or_else(|| {
            PipelineError::Configuration("credential store is required".to_string())
        })?;
        let package_id = self
            .package_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PipelineError::Configuration("policy package id is required".to_string())
            })?;

        let client = ThresholdClient::new(ks_config, ks_handles, environment)?;
        let sessions =
            SessionCredentialManager::open(credentials.clone(), package_id.clone()).await?;
        let device = DeviceKeypair::load_or_generate(credentials.as_ref())
            .await?
            .signer();
        let resolver = AccessResolver::new(chain, package_id.clone());

        info!(package = %package_id, environment = %environment, "pipeline session ready");
        Ok(PipelineSession {
            client,
            sessions,
            resolver,
            blobs,
            wallet,
            device,
            progress: self.progress,
            max_content_size: self.max_content_size,
            retry: self.retry,
        })
    }
}

impl Default for PipelineSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-user-session pipeline context.
pub struct PipelineSession {
    client: ThresholdClient,
    sessions: SessionCredentialManager,
    resolver: AccessResolver,
    blobs: Arc<dyn BlobStore>,
    wallet: Arc<dyn Signer>,
    device: LocalSigner,
    progress: Arc<dyn ProgressSink>,
    max_content_size: usize,
    retry: RetryPolicy,
}

impl std::fmt::Debug for PipelineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSession")
            .field("max_content_size", &self.max_content_size)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl PipelineSession {
    pub fn builder() -> PipelineSessionBuilder {
        PipelineSessionBuilder::new()
    }

    /// The session credential manager, for account invalidation.
    pub fn credentials(&self) -> &SessionCredentialManager {
        &self.sessions
    }

    fn stage(&self, stage: PipelineStage) {
        self.progress.on_stage(stage);
    }

    fn now_millis() -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }

    /// Encrypt one article for storage.
    #[instrument(skip(self, content), fields(title, size = content.len()))]
    pub async fn encrypt_article(
        &self,
        publication: &PublicationAddress,
        title: &str,
        content: &str,
    ) -> Result<EncryptedArticle, PipelineError> {
        let result = self.encrypt_article_inner(publication, title, content).await;
        if result.is_err() {
            self.stage(PipelineStage::Error);
        }
        result
    }

    async fn encrypt_article_inner(
        &self,
        publication: &PublicationAddress,
        title: &str,
        content: &str,
    ) -> Result<EncryptedArticle, PipelineError> {
        self.stage(PipelineStage::Validating);
        if title.is_empty() {
            return Err(PipelineError::Validation("title must not be empty".to_string()));
        }
        self.validate_size(content.len())?;

        let identity = ContentIdentity::for_article(*publication, title, Self::now_millis())?;
        let (payload_b64, metadata) = self.seal(content.as_bytes(), &identity).await?;
        self.stage(PipelineStage::Completed);

        Ok(EncryptedArticle {
            identity_hex: identity.to_hex(),
            payload_b64,
            metadata,
        })
    }

    /// Encrypt one media file for storage.
    #[instrument(skip(self, file), fields(filename = %file.filename, size = file.bytes.len()))]
    pub async fn encrypt_media(
        &self,
        publication: &PublicationAddress,
        file: &MediaFile,
    ) -> Result<EncryptedMedia, PipelineError> {
        let result = self.encrypt_media_inner(publication, file).await;
        if result.is_err() {
            self.stage(PipelineStage::Error);
        }
        result
    }

    async fn encrypt_media_inner(
        &self,
        publication: &PublicationAddress,
        file: &MediaFile,
    ) -> Result<EncryptedMedia, PipelineError> {
        self.stage(PipelineStage::Validating);
        self.validate_size(file.bytes.len())?;

        let identity = ContentIdentity::for_media(
            &file.filename,
            &file.mime_type,
            *publication,
            Self::now_millis(),
        )?;
        let (payload_b64, metadata) = self.seal(&file.bytes, &identity).await?;
        self.stage(PipelineStage::Completed);

        Ok(EncryptedMedia {
            filename: file.filename.clone(),
            identity_hex: identity.to_hex(),
            payload_b64,
            metadata,
        })
    }

    /// Encrypt a set of media files in parallel, one independent task per
    /// file. Results come back in input order; a failed file never aborts
    /// or hides its siblings.
    pub async fn encrypt_media_batch(
        self: Arc<Self>,
        publication: PublicationAddress,
        files: Vec<MediaFile>,
    ) -> BatchReport<EncryptedMedia> {
        let mut tasks = JoinSet::new();
        for (index, file) in files.into_iter().enumerate() {
            let session = self.clone();
            tasks.spawn(async move {
                let result = session.encrypt_media(&publication, &file).await;
                (index, file.filename, result)
            });
        }
        collect_batch(tasks).await
    }

    /// Decrypt one article fetched from the storage collaborator.
    #[instrument(skip(self, held), fields(blob = %blob, expected = expected_identity_hex))]
    pub async fn decrypt_article(
        &self,
        blob: &BlobId,
        expected_identity_hex: &str,
        held: &AccessCredentialSet,
    ) -> Result<DecryptedArticle, PipelineError> {
        let result = self.decrypt_article_inner(blob, expected_identity_hex, held).await;
        if result.is_err() {
            self.stage(PipelineStage::Error);
        }
        result
    }

    async fn decrypt_article_inner(
        &self,
        blob: &BlobId,
        expected_identity_hex: &str,
        held: &AccessCredentialSet,
    ) -> Result<DecryptedArticle, PipelineError> {
        let (bytes, identity_drift) = self.open(blob, expected_identity_hex, held).await?;
        let content = String::from_utf8(bytes).map_err(|_| PipelineError::NotUtf8)?;
        self.stage(PipelineStage::Completed);
        Ok(DecryptedArticle {
            content,
            identity_drift,
        })
    }

    /// Decrypt one media file fetched from the storage collaborator.
    #[instrument(skip(self, held), fields(name = %item.name, blob = %item.blob))]
    pub async fn decrypt_media(
        &self,
        item: &MediaRef,
        held: &AccessCredentialSet,
    ) -> Result<DecryptedMedia, PipelineError> {
        let result = self.decrypt_media_inner(item, held).await;
        if result.is_err() {
            self.stage(PipelineStage::Error);
        }
        result
    }

    async fn decrypt_media_inner(
        &self,
        item: &MediaRef,
        held: &AccessCredentialSet,
    ) -> Result<DecryptedMedia, PipelineError> {
        let (bytes, identity_drift) = self.open(&item.blob, &item.identity_hex, held).await?;
        self.stage(PipelineStage::Completed);
        Ok(DecryptedMedia {
            name: item.name.clone(),
            bytes,
            identity_drift,
        })
    }

    /// Decrypt a set of media files in parallel, mirroring
    /// [`Self::encrypt_media_batch`].
    pub async fn decrypt_media_batch(
        self: Arc<Self>,
        items: Vec<MediaRef>,
        held: AccessCredentialSet,
    ) -> BatchReport<DecryptedMedia> {
        let mut tasks = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            let session = self.clone();
            let held = held.clone();
            tasks.spawn(async move {
                let result = session.decrypt_media(&item, &held).await;
                (index, item.name, result)
            });
        }
        collect_batch(tasks).await
    }

    /// Shared encrypt tail: threshold exchange, identity-binding check,
    /// transport encoding.
    async fn seal(
        &self,
        plaintext: &[u8],
        identity: &ContentIdentity,
    ) -> Result<(String, EncryptionMetadata), PipelineError> {
        self.stage(PipelineStage::Encrypting);
        self.stage(PipelineStage::KeyServerExchange);

        let client = &self.client;
        let identity_copy = *identity;
        let envelope = self
            .retry
            .run("threshold encrypt", move || async move {
                client
                    .encrypt(plaintext, &identity_copy)
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;

        // The envelope must embed exactly the identity we asked for; a
        // mismatch here means corruption in flight and the output cannot
        // be trusted.
        if envelope.identity() != identity {
            return Err(PipelineError::DataIntegrityMismatch(format!(
                "requested {} but envelope embeds {}",
                identity.to_hex(),
                envelope.identity().to_hex()
            )));
        }

        self.stage(PipelineStage::Finalizing);
        let envelope_bytes = envelope.to_bytes()?;
        let metadata = EncryptionMetadata {
            original_size: plaintext.len(),
            encrypted_size: envelope_bytes.len(),
            algorithm: ALGORITHM_TAG,
            validated: true,
        };
        Ok((BASE64.encode(&envelope_bytes), metadata))
    }

    /// Shared decrypt head: fetch, transport decode, drift check,
    /// authorization.
    async fn open(
        &self,
        blob: &BlobId,
        expected_identity_hex: &str,
        held: &AccessCredentialSet,
    ) -> Result<(Vec<u8>, bool), PipelineError> {
        self.stage(PipelineStage::Validating);
        let expected = ContentIdentity::from_hex(expected_identity_hex)?;

        self.stage(PipelineStage::Fetching);
        let blobs = self.blobs.as_ref();
        let stored = self
            .retry
            .run("blob fetch", move || async move {
                blobs.get(blob).await.map_err(PipelineError::from)
            })
            .await?;

        let envelope = decode_transport(&stored)?;
        let identity_drift = envelope.identity() != &expected;
        if identity_drift {
            warn!(
                expected = %expected.to_hex(),
                embedded = %envelope.identity().to_hex(),
                "envelope identity differs from expected metadata identity"
            );
        }

        self.stage(PipelineStage::Authorizing);
        self.stage(PipelineStage::KeyServerExchange);
        let plaintext = self
            .resolver
            .decrypt(
                &self.client,
                &self.sessions,
                &envelope,
                held,
                self.wallet.as_ref(),
                &self.device,
                Self::now_millis(),
            )
            .await?;

        self.stage(PipelineStage::Finalizing);
        Ok((plaintext, identity_drift))
    }

    fn validate_size(&self, size: usize) -> Result<(), PipelineError> {
        if size == 0 {
            return Err(PipelineError::Validation("content must not be empty".to_string()));
        }
        if size > self.max_content_size {
            return Err(PipelineError::Validation(format!(
                "content size {} exceeds the maximum of {} bytes",
                size, self.max_content_size
            )));
        }
        Ok(())
    }
}

/// Decode a stored payload that may be a raw envelope or its base64
/// transport encoding; the format is the storage collaborator's choice.
fn decode_transport(stored: &[u8]) -> Result<EncryptedEnvelope, PipelineError> {
    if stored.len() > IDENTITY_LEN && stored[0] == CONTENT_TAG {
        match EncryptedEnvelope::from_bytes(stored) {
            Ok(envelope) => {
                debug!("stored payload is a raw envelope");
                return Ok(envelope);
            }
            Err(e) => {
                debug!(error = %e, "raw envelope parse failed, trying base64");
            }
        }
    }
    let text = stored.trim_ascii();
    let raw = BASE64
        .decode(text)
        .map_err(|e| PipelineError::TransportDecode(e.to_string()))?;
    let envelope = EncryptedEnvelope::from_bytes(&raw)?;
    debug!("stored payload is base64");
    Ok(envelope)
}

/// Drain a batch JoinSet into a report ordered by input index.
async fn collect_batch<T: Send + 'static>(
    mut tasks: JoinSet<(usize, String, Result<T, PipelineError>)>,
) -> BatchReport<T> {
    let mut entries = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(error = %e, "batch task failed to complete"),
        }
    }
    entries.sort_by_key(|(index, _, _)| *index);

    let mut report = BatchReport {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    for (_, name, result) in entries {
        match result {
            Ok(item) => report.succeeded.push(item),
            Err(error) => {
                warn!(name, error = %error, "batch item failed");
                report.failed.push(BatchFailure { name, error });
            }
        }
    }
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "batch complete"
    );
    report
}
