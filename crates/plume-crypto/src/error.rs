//! Error types for plume-crypto

use thiserror::Error;

/// Errors that can occur during threshold encryption and decryption
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Insufficient key servers: {required} required, {available} available")]
    InsufficientKeyServers { required: usize, available: usize },

    #[error("Key servers unavailable: {required} shares required, {responded} responded")]
    KeyServerUnavailable { required: usize, responded: usize },

    #[error("Key server {server} unreachable: {reason}")]
    ServerUnreachable { server: String, reason: String },

    #[error("Key server {server} denied the authorization proof: {reason}")]
    ShareDenied { server: String, reason: String },

    #[error("Key server {server} rejected the session credential: {reason}")]
    CredentialRejected { server: String, reason: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_error_display() {
        let err = CryptoError::InsufficientKeyServers {
            required: 2,
            available: 1,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Insufficient key servers"));
        assert!(msg.contains('2'));
        assert!(msg.contains('1'));

        let err = CryptoError::ShareDenied {
            server: "ks-0".to_string(),
            reason: "not a subscriber".to_string(),
        };
        assert!(format!("{}", err).contains("denied the authorization proof"));

        let err = CryptoError::MalformedEnvelope("truncated".to_string());
        assert!(format!("{}", err).contains("Malformed envelope"));
    }
}
