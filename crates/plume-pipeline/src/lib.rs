//! # Plume Pipeline
//!
//! The orchestrator façade over the Plume encryption pipeline: identity
//! generation → threshold encryption → transport encoding on the way into
//! storage, and fetch → decode → policy authorization → threshold
//! decryption on the way back out, with validation gates between stages.
//!
//! A [`PipelineSession`] is built once per logical user session and passed
//! by reference to every call site. Progress is observable through a
//! [`ProgressSink`]; retry policy and error-to-user-message mapping live
//! here, not in the subsystem crates.
//!
//! ```rust,ignore
//! let session = PipelineSession::builder()
//!     .environment(Environment::Testnet)
//!     .key_servers(config, servers)
//!     .blob_store(blobs)
//!     .chain_rpc(chain)
//!     .wallet_signer(wallet)
//!     .credential_store(store)
//!     .package_id("0xpolicy")
//!     .build()
//!     .await?;
//!
//! let article = session.encrypt_article(&publication, "Hello World", "# Hello").await?;
//! ```

pub mod error;
pub mod progress;
pub mod retry;
pub mod session;

// Re-exports
pub use error::PipelineError;
pub use progress::{NoProgress, PipelineStage, ProgressSink, RecordingProgress};
pub use retry::RetryPolicy;
pub use session::{
    ALGORITHM_TAG, BatchFailure, BatchReport, DEFAULT_MAX_CONTENT_SIZE, DecryptedArticle,
    DecryptedMedia, EncryptedArticle, EncryptedMedia, EncryptionMetadata, MediaFile, MediaRef,
    PipelineSession, PipelineSessionBuilder,
};
