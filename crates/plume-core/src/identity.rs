//! Content identity encoding
//!
//! A [`ContentIdentity`] binds one encrypted item to a publication and a
//! nonce. The encoded form is a fixed 43-byte layout that the on-chain
//! policy program deserializes with a fixed schema, so the field order and
//! integer widths here are a hard wire contract: tag (u8), version (u16 LE),
//! publication address (32 raw bytes), nonce (u64 LE). No length prefixes,
//! no padding.

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Discriminator for article/media content. Currently the only class.
pub const CONTENT_TAG: u8 = 0x01;

/// Supported identity format version.
pub const IDENTITY_VERSION: u16 = 1;

/// Encoded identity length: 1 (tag) + 2 (version) + 32 (publication) + 8 (nonce).
pub const IDENTITY_LEN: usize = 43;

/// Publication address length in bytes.
pub const ADDRESS_LEN: usize = 32;

/// Fixed 32-byte address of the publication that owns a piece of content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicationAddress([u8; ADDRESS_LEN]);

impl PublicationAddress {
    /// Create from raw bytes.
    pub fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Parse from a hex string. The `0x` prefix is optional on input.
    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != ADDRESS_LEN * 2 {
            return Err(IdentityError::InvalidAddress(format!(
                "expected {} hex digits, got {}",
                ADDRESS_LEN * 2,
                digits.len()
            )));
        }
        let bytes = hex::decode(digits)
            .map_err(|e| IdentityError::InvalidAddress(e.to_string()))?;
        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&bytes);
        Ok(Self(address))
    }

    /// Hex form with the mandatory `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl TryFrom<&[u8]> for PublicationAddress {
    type Error = IdentityError;

    fn try_from(bytes: &[u8]) -> Result<Self, IdentityError> {
        let array: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| {
            IdentityError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }
}

impl std::fmt::Display for PublicationAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The canonical binary identity bound to one piece of encrypted content.
///
/// Created once per article or media file at encryption time, then immutable.
/// The nonce mixes the caller-supplied clock with a stable hash of the title,
/// so re-publishing the same title yields a distinct identity while the
/// function itself stays deterministic for a fixed clock value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIdentity {
    tag: u8,
    version: u16,
    publication: PublicationAddress,
    nonce: u64,
}

impl ContentIdentity {
    /// Derive the identity for an article.
    ///
    /// `now_millis` is the current time as Unix milliseconds, supplied by the
    /// caller so the derivation is deterministic under test.
    pub fn for_article(
        publication: PublicationAddress,
        title: &str,
        now_millis: u64,
    ) -> Result<Self, IdentityError> {
        if title.is_empty() {
            return Err(IdentityError::EmptyTitle);
        }
        Ok(Self {
            tag: CONTENT_TAG,
            version: IDENTITY_VERSION,
            publication,
            nonce: title_nonce(title, now_millis),
        })
    }

    /// Derive the identity for a media file.
    ///
    /// Media shares the article encoding path via a synthetic title built
    /// from the filename and MIME type.
    pub fn for_media(
        filename: &str,
        mime_type: &str,
        publication: PublicationAddress,
        now_millis: u64,
    ) -> Result<Self, IdentityError> {
        if filename.is_empty() || mime_type.is_empty() {
            return Err(IdentityError::EmptyTitle);
        }
        Self::for_article(publication, &format!("{}:{}", filename, mime_type), now_millis)
    }

    /// The content-class tag.
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// The format version.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// The owning publication.
    pub fn publication(&self) -> &PublicationAddress {
        &self.publication
    }

    /// The uniqueness nonce.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Encode to the fixed 43-byte wire layout.
    pub fn encode(&self) -> [u8; IDENTITY_LEN] {
        let mut out = [0u8; IDENTITY_LEN];
        out[0] = self.tag;
        out[1..3].copy_from_slice(&self.version.to_le_bytes());
        out[3..35].copy_from_slice(self.publication.as_bytes());
        out[35..43].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Decode from the 43-byte wire layout.
    pub fn decode(bytes: &[u8]) -> Result<Self, IdentityError> {
        if bytes.len() != IDENTITY_LEN {
            return Err(IdentityError::MalformedIdentity(format!(
                "expected {} bytes, got {}",
                IDENTITY_LEN,
                bytes.len()
            )));
        }
        let tag = bytes[0];
        if tag != CONTENT_TAG {
            return Err(IdentityError::MalformedIdentity(format!(
                "unknown content tag 0x{:02x}",
                tag
            )));
        }
        let version = u16::from_le_bytes([bytes[1], bytes[2]]);
        if version != IDENTITY_VERSION {
            return Err(IdentityError::MalformedIdentity(format!(
                "unsupported identity version {}",
                version
            )));
        }
        let publication = PublicationAddress::try_from(&bytes[3..35])
            .map_err(|e| IdentityError::MalformedIdentity(e.to_string()))?;
        let nonce = u64::from_le_bytes(bytes[35..43].try_into().unwrap_or([0u8; 8]));
        Ok(Self {
            tag,
            version,
            publication,
            nonce,
        })
    }

    /// Hex transport form with the mandatory `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.encode()))
    }

    /// Parse from the hex transport form. The `0x` prefix is optional on input.
    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() % 2 != 0 {
            return Err(IdentityError::MalformedIdentity(
                "odd-length hex string".to_string(),
            ));
        }
        let bytes = hex::decode(digits)
            .map_err(|e| IdentityError::MalformedIdentity(e.to_string()))?;
        Self::decode(&bytes)
    }
}

impl std::fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Mix the clock with a stable title hash.
///
/// Identical titles at different instants still differ; identical titles at
/// the same instant collapse to the same nonce by design (idempotent retry).
fn title_nonce(title: &str, now_millis: u64) -> u64 {
    let digest = blake3::hash(title.as_bytes());
    let hash_word = u64::from_le_bytes(digest.as_bytes()[..8].try_into().unwrap_or([0u8; 8]));
    now_millis ^ hash_word
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_address() -> PublicationAddress {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[ADDRESS_LEN - 1] = 0x01;
        PublicationAddress::new(bytes)
    }

    #[test]
    fn test_address_hex_round_trip() {
        let address = test_address();
        let hex = address.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 2 + ADDRESS_LEN * 2);
        assert_eq!(PublicationAddress::from_hex(&hex).unwrap(), address);
        // Prefix is optional on input
        assert_eq!(
            PublicationAddress::from_hex(hex.trim_start_matches("0x")).unwrap(),
            address
        );
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!(PublicationAddress::from_hex("0xabcd").is_err());
        assert!(PublicationAddress::from_hex("").is_err());
    }

    #[test]
    fn test_address_rejects_non_hex() {
        let bad = format!("0x{}", "zz".repeat(ADDRESS_LEN));
        assert!(PublicationAddress::from_hex(&bad).is_err());
    }

    #[test]
    fn test_encode_is_exactly_43_bytes() {
        let identity = ContentIdentity::for_article(test_address(), "Hello World", 1_700_000_000_000).unwrap();
        assert_eq!(identity.encode().len(), IDENTITY_LEN);
    }

    #[test]
    fn test_round_trip() {
        let identity = ContentIdentity::for_article(test_address(), "Hello World", 1_700_000_000_000).unwrap();
        let encoded = identity.encode();
        let decoded = ContentIdentity::decode(&encoded).unwrap();
        assert_eq!(decoded.tag(), CONTENT_TAG);
        assert_eq!(decoded.version(), IDENTITY_VERSION);
        assert_eq!(decoded.publication(), identity.publication());
        assert_eq!(decoded.nonce(), identity.nonce());
        // Re-encoding reproduces the original bytes exactly
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(ContentIdentity::decode(&[0u8; 42]).is_err());
        assert!(ContentIdentity::decode(&[0u8; 44]).is_err());
        assert!(ContentIdentity::decode(&[]).is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let identity = ContentIdentity::for_article(test_address(), "Hello", 1000).unwrap();
        let mut encoded = identity.encode();
        encoded[0] = 0x7f;
        assert!(matches!(
            ContentIdentity::decode(&encoded),
            Err(IdentityError::MalformedIdentity(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unsupported_version() {
        let identity = ContentIdentity::for_article(test_address(), "Hello", 1000).unwrap();
        let mut encoded = identity.encode();
        encoded[1..3].copy_from_slice(&99u16.to_le_bytes());
        assert!(ContentIdentity::decode(&encoded).is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        let identity = ContentIdentity::for_article(test_address(), "Hello", 1_700_000_000_000).unwrap();
        let hex = identity.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(ContentIdentity::from_hex(&hex).unwrap(), identity);
    }

    #[test]
    fn test_from_hex_rejects_odd_length() {
        assert!(matches!(
            ContentIdentity::from_hex("0xabc"),
            Err(IdentityError::MalformedIdentity(_))
        ));
    }

    #[test]
    fn test_from_hex_rejects_non_hex_digits() {
        let bad = format!("0x{}", "gg".repeat(IDENTITY_LEN));
        assert!(ContentIdentity::from_hex(&bad).is_err());
    }

    #[test]
    fn test_same_title_different_time_differs() {
        let a = ContentIdentity::for_article(test_address(), "Hello", 1000).unwrap();
        let b = ContentIdentity::for_article(test_address(), "Hello", 2000).unwrap();
        assert_ne!(a.nonce(), b.nonce());
    }

    #[test]
    fn test_same_inputs_same_identity() {
        let a = ContentIdentity::for_article(test_address(), "Hello", 1000).unwrap();
        let b = ContentIdentity::for_article(test_address(), "Hello", 1000).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.encode(), b.encode());
    }

    #[test]
    fn test_empty_title_rejected() {
        assert!(matches!(
            ContentIdentity::for_article(test_address(), "", 1000),
            Err(IdentityError::EmptyTitle)
        ));
    }

    #[test]
    fn test_media_delegates_to_article_path() {
        let media = ContentIdentity::for_media("photo.jpg", "image/jpeg", test_address(), 1000).unwrap();
        let article =
            ContentIdentity::for_article(test_address(), "photo.jpg:image/jpeg", 1000).unwrap();
        assert_eq!(media, article);
    }

    #[test]
    fn test_media_rejects_empty_parts() {
        assert!(ContentIdentity::for_media("", "image/jpeg", test_address(), 1000).is_err());
        assert!(ContentIdentity::for_media("photo.jpg", "", test_address(), 1000).is_err());
    }
}
