//! # Plume Session
//!
//! Session credential management for the Plume encryption pipeline.
//!
//! A [`SessionCredential`] is an ephemeral signed token proving the caller
//! controls an address, scoped to one authorization-contract package. The
//! [`SessionCredentialManager`] caches signed credentials so decryption does
//! not require a fresh interactive signature every time, and invalidates
//! them when the package is redeployed, the account changes, or they expire.
//!
//! Two credential lifecycles exist:
//!
//! - **Wallet-bound**: interactive signing, longer TTL, used for privileged
//!   decryption paths (owner, contributor, subscription, NFT).
//! - **Device-local**: backed by a locally generated keypair that is never
//!   cleared by account-scoped invalidation, auto-signed, TTL capped at
//!   30 minutes, used only for universal free-access content.

pub mod credential;
pub mod device;
pub mod error;
pub mod manager;
pub mod store;

// Re-exports
pub use credential::{
    CredentialKind, DEVICE_MAX_TTL_MILLIS, EXPIRY_SAFETY_BUFFER_MILLIS, SessionCredential,
    WALLET_DEFAULT_TTL_MILLIS,
};
pub use device::{DEVICE_KEYPAIR_KEY, DeviceKeypair, LocalSigner};
pub use error::{SessionError, SessionResult};
pub use manager::{DEVICE_CREDENTIAL_KEY, PACKAGE_ID_KEY, SessionCredentialManager};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
