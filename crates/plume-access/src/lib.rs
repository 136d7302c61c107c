//! # Plume Access
//!
//! Policy authorization resolver for the Plume pipeline.
//!
//! Given one encrypted item and the set of access credentials the caller
//! holds, the [`AccessResolver`] tries each credential type in a fixed
//! priority order — owner, subscription, NFT, contributor, free access —
//! building a chain-verifiable proof for each and attempting threshold
//! decryption with it, until one is accepted or every held type has been
//! exhausted.
//!
//! Proofs are not composable: each is checked independently by the chain
//! program, so the client probes rather than computing a single combined
//! proof. Attempts are strictly sequential; an earlier success must
//! short-circuit later ones, and wallet-bound session signing must never be
//! triggered speculatively for a credential type that will not be tried.

pub mod credential;
pub mod error;
pub mod proof;
pub mod resolver;

// Re-exports
pub use credential::{AccessCredential, AccessCredentialSet};
pub use error::{AccessError, Attempt};
pub use proof::build_proof;
pub use resolver::AccessResolver;
