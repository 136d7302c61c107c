//! # Plume Core
//!
//! Core types for the Plume encryption pipeline.
//!
//! Provides the content identity codec, the collaborator seams the
//! pipeline depends on, and mock collaborators for tests.
//!
//! ## Key Types
//!
//! - [`ContentIdentity`]: Fixed-layout binary identity binding content to a publication
//! - [`PublicationAddress`]: 32-byte address of the owning publication
//! - [`BlobStore`] / [`ChainRpc`] / [`Signer`]: External collaborator traits
//!
//! ## Wire contract
//!
//! An encoded identity is exactly 43 bytes and is deserialized on the
//! other side by an on-chain program with a fixed schema. Round-trip
//! equality (`encode` → `decode` → `encode`) is the compatibility test.

pub mod error;
pub mod identity;
pub mod mock;
pub mod traits;

// Re-exports
pub use error::{CollaboratorError, IdentityError, IdentityResult};
pub use identity::{
    ADDRESS_LEN, CONTENT_TAG, ContentIdentity, IDENTITY_LEN, IDENTITY_VERSION, PublicationAddress,
};
pub use traits::{AuthorizationCall, BlobId, BlobStore, CallArg, ChainRpc, Signer};
