//! Encrypted envelope format
//!
//! Wire layout: the 43-byte content identity, verbatim, followed by the
//! postcard-encoded body. Keeping the identity as a raw prefix lets any
//! reader recover it without decrypting, and the round trip through
//! [`ContentIdentity::decode`] validates the tag and version on parse.

use serde::{Deserialize, Serialize};

use plume_core::identity::{ContentIdentity, IDENTITY_LEN};

use crate::error::CryptoError;

/// ChaCha20-Poly1305 nonce size.
pub const NONCE_SIZE: usize = 12;

/// Postcard-encoded portion of an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeBody {
    /// Number of key shares the content key was derived from.
    pub threshold: u8,
    /// Endpoint ids of the servers whose shares contributed, in the order
    /// their shares were fed to the KDF.
    pub server_ids: Vec<String>,
    /// AEAD nonce.
    pub nonce: [u8; NONCE_SIZE],
    /// Sealed payload with authentication tag.
    pub ciphertext: Vec<u8>,
}

/// The opaque output of threshold encryption.
///
/// Immutable once created; stored externally and fetched back unchanged.
/// The embedded identity must equal the identity passed to the encryption
/// call; the pipeline treats any mismatch as tampering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    identity: ContentIdentity,
    body: EnvelopeBody,
}

impl EncryptedEnvelope {
    /// Assemble an envelope. Only the threshold client creates these.
    pub(crate) fn new(identity: ContentIdentity, body: EnvelopeBody) -> Self {
        Self { identity, body }
    }

    /// The identity this envelope was encrypted under.
    pub fn identity(&self) -> &ContentIdentity {
        &self.identity
    }

    /// The encrypted body.
    pub fn body(&self) -> &EnvelopeBody {
        &self.body
    }

    /// Serialize to bytes: identity prefix || postcard body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let body = postcard::to_allocvec(&self.body)
            .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
        let mut out = Vec::with_capacity(IDENTITY_LEN + body.len());
        out.extend_from_slice(&self.identity.encode());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Parse from bytes, validating the identity prefix.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() <= IDENTITY_LEN {
            return Err(CryptoError::MalformedEnvelope(format!(
                "expected more than {} bytes, got {}",
                IDENTITY_LEN,
                bytes.len()
            )));
        }
        let identity = ContentIdentity::decode(&bytes[..IDENTITY_LEN])
            .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
        let body: EnvelopeBody = postcard::from_bytes(&bytes[IDENTITY_LEN..])
            .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
        Ok(Self { identity, body })
    }
}
