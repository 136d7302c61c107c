//! # Plume Crypto
//!
//! Threshold encryption client for the Plume pipeline.
//!
//! Content is encrypted under its [`ContentIdentity`](plume_core::ContentIdentity)
//! with cooperation from a configured set of independent key servers: each
//! server contributes an opaque key share, the client derives the content
//! key from `threshold` shares via HKDF, and seals the payload with
//! ChaCha20-Poly1305. Decryption reverses the exchange, but each server
//! first verifies the caller's signed session credential and a
//! chain-verifiable authorization proof before releasing its share.
//!
//! The IBE mathematics live inside the key servers; this crate treats
//! shares as opaque 32-byte blobs and owns only the exchange protocol, the
//! envelope format, and the k-of-n enforcement.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod testing;

// Re-exports
pub use client::{KeyServer, KeyShare, ThresholdClient};
pub use config::{DEFAULT_THRESHOLD, Environment, KeyServerEntry, KeyServerSetConfig};
pub use envelope::{EncryptedEnvelope, EnvelopeBody};
pub use error::{CryptoError, CryptoResult};
pub use testing::MemoryKeyServer;
