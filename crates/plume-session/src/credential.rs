//! Session credential type
//!
//! A signed, expiring authorization token bound to one `(address, package)`
//! pair. The signature covers a canonical challenge message with
//! length-prefixed strings and fixed-width little-endian integers, so the
//! same credential always produces the same bytes to sign.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum TTL for device-local credentials: 30 minutes.
pub const DEVICE_MAX_TTL_MILLIS: u64 = 30 * 60 * 1000;

/// Default TTL for wallet-bound credentials: 12 hours.
pub const WALLET_DEFAULT_TTL_MILLIS: u64 = 12 * 60 * 60 * 1000;

/// Safety buffer applied when checking expiry from the cache, so a
/// credential that would expire mid-request is treated as already expired.
pub const EXPIRY_SAFETY_BUFFER_MILLIS: u64 = 10_000;

/// Domain separator for the challenge message.
const CHALLENGE_PREFIX: &[u8] = b"plume-session:";

/// Which signer lifecycle a credential belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialKind {
    /// Interactive wallet signing; used for privileged decryption paths.
    Wallet,
    /// Non-interactive device keypair; used only for free-access content.
    Device,
}

impl CredentialKind {
    /// Default TTL for new credentials of this kind.
    pub fn default_ttl_millis(&self) -> u64 {
        match self {
            Self::Wallet => WALLET_DEFAULT_TTL_MILLIS,
            Self::Device => DEVICE_MAX_TTL_MILLIS,
        }
    }

    /// Hard TTL cap, if this kind has one.
    pub fn max_ttl_millis(&self) -> Option<u64> {
        match self {
            Self::Wallet => None,
            Self::Device => Some(DEVICE_MAX_TTL_MILLIS),
        }
    }

    /// Human-readable label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Device => "device",
        }
    }
}

/// Ephemeral signed token proving control of an address, scoped to one
/// authorization-contract package.
///
/// A credential without a signature is unusable for decryption. A credential
/// whose `created_at_millis + ttl_millis` has elapsed is expired and must be
/// discarded, never reused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    /// Address this credential proves control of, in `0x` hex form.
    pub address: String,
    /// Authorization package the credential is scoped to.
    pub package_id: String,
    /// Creation time, Unix milliseconds.
    pub created_at_millis: u64,
    /// Time-to-live in milliseconds.
    pub ttl_millis: u64,
    /// Opaque signature over [`SessionCredential::challenge_bytes`].
    pub signature: Option<Vec<u8>>,
    /// Which signer lifecycle produced this credential.
    pub kind: CredentialKind,
}

impl SessionCredential {
    /// Build an unsigned credential.
    ///
    /// A requested TTL above the kind's cap is clamped silently; callers
    /// cannot observe the cap otherwise.
    pub fn new(
        address: impl Into<String>,
        package_id: impl Into<String>,
        kind: CredentialKind,
        created_at_millis: u64,
        requested_ttl_millis: u64,
    ) -> Self {
        let ttl_millis = match kind.max_ttl_millis() {
            Some(cap) if requested_ttl_millis > cap => {
                debug!(
                    kind = kind.label(),
                    requested = requested_ttl_millis,
                    cap,
                    "requested TTL exceeds cap, clamping"
                );
                cap
            }
            _ => requested_ttl_millis,
        };
        Self {
            address: address.into(),
            package_id: package_id.into(),
            created_at_millis,
            ttl_millis,
            signature: None,
            kind,
        }
    }

    /// Whether a signature is attached.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Absolute expiry time, Unix milliseconds.
    pub fn expires_at_millis(&self) -> u64 {
        self.created_at_millis.saturating_add(self.ttl_millis)
    }

    /// Whether the credential is expired at `now_millis`.
    ///
    /// `buffer_millis` shifts the check forward, so a credential about to
    /// expire mid-request already counts as expired.
    pub fn is_expired(&self, now_millis: u64, buffer_millis: u64) -> bool {
        now_millis.saturating_add(buffer_millis) >= self.expires_at_millis()
    }

    /// The canonical message the signer signs.
    ///
    /// Layout: prefix || len(address) u16 LE || address || len(package) u16 LE
    /// || package || created_at u64 LE || ttl u64 LE.
    pub fn challenge_bytes(&self) -> Vec<u8> {
        let address = self.address.as_bytes();
        let package = self.package_id.as_bytes();
        let mut out =
            Vec::with_capacity(CHALLENGE_PREFIX.len() + 2 + address.len() + 2 + package.len() + 16);
        out.extend_from_slice(CHALLENGE_PREFIX);
        out.extend_from_slice(&(address.len() as u16).to_le_bytes());
        out.extend_from_slice(address);
        out.extend_from_slice(&(package.len() as u16).to_le_bytes());
        out.extend_from_slice(package);
        out.extend_from_slice(&self.created_at_millis.to_le_bytes());
        out.extend_from_slice(&self.ttl_millis.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credential(kind: CredentialKind, ttl: u64) -> SessionCredential {
        SessionCredential::new("0xabc", "0xpkg", kind, 1_000_000, ttl)
    }

    #[test]
    fn test_unsigned_by_default() {
        let cred = test_credential(CredentialKind::Wallet, 60_000);
        assert!(!cred.is_signed());
    }

    #[test]
    fn test_expiry() {
        let cred = test_credential(CredentialKind::Wallet, 60_000);
        assert_eq!(cred.expires_at_millis(), 1_060_000);
        assert!(!cred.is_expired(1_000_000, 0));
        assert!(!cred.is_expired(1_059_999, 0));
        assert!(cred.is_expired(1_060_000, 0));
        assert!(cred.is_expired(2_000_000, 0));
    }

    #[test]
    fn test_expiry_buffer() {
        let cred = test_credential(CredentialKind::Wallet, 60_000);
        // 5s short of expiry, but a 10s buffer pushes it over
        assert!(!cred.is_expired(1_055_000, 0));
        assert!(cred.is_expired(1_055_000, EXPIRY_SAFETY_BUFFER_MILLIS));
    }

    #[test]
    fn test_device_ttl_clamped() {
        let cred = test_credential(CredentialKind::Device, 24 * 60 * 60 * 1000);
        assert_eq!(cred.ttl_millis, DEVICE_MAX_TTL_MILLIS);
    }

    #[test]
    fn test_wallet_ttl_not_clamped() {
        let cred = test_credential(CredentialKind::Wallet, 24 * 60 * 60 * 1000);
        assert_eq!(cred.ttl_millis, 24 * 60 * 60 * 1000);
    }

    #[test]
    fn test_challenge_bytes_canonical() {
        let a = test_credential(CredentialKind::Wallet, 60_000);
        let b = test_credential(CredentialKind::Wallet, 60_000);
        assert_eq!(a.challenge_bytes(), b.challenge_bytes());

        // Any field change alters the message
        let c = SessionCredential::new("0xabd", "0xpkg", CredentialKind::Wallet, 1_000_000, 60_000);
        assert_ne!(a.challenge_bytes(), c.challenge_bytes());
        let d = SessionCredential::new("0xabc", "0xqkg", CredentialKind::Wallet, 1_000_000, 60_000);
        assert_ne!(a.challenge_bytes(), d.challenge_bytes());
        let e = SessionCredential::new("0xabc", "0xpkg", CredentialKind::Wallet, 1_000_001, 60_000);
        assert_ne!(a.challenge_bytes(), e.challenge_bytes());
    }

    #[test]
    fn test_challenge_bytes_unambiguous_boundaries() {
        // Moving a byte between address and package must change the message
        let a = SessionCredential::new("ab", "c", CredentialKind::Wallet, 0, 0);
        let b = SessionCredential::new("a", "bc", CredentialKind::Wallet, 0, 0);
        assert_ne!(a.challenge_bytes(), b.challenge_bytes());
    }

    #[test]
    fn test_json_round_trip() {
        let mut cred = test_credential(CredentialKind::Device, 1000);
        cred.signature = Some(vec![1, 2, 3]);
        let json = serde_json::to_string(&cred).unwrap();
        let back: SessionCredential = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cred);
    }
}
