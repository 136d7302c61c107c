//! Access credential variants
//!
//! A tagged union over every proof of access a caller may hold for one
//! content item. The variants are mutually non-exclusive — an owner is
//! usually also a contributor — so a caller carries a set and the resolver
//! walks it in priority order, most privileged first.

use serde::{Deserialize, Serialize};

/// One access proof the caller holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessCredential {
    /// Publication-owner capability; direct, highest-trust path.
    Owner {
        /// On-chain id of the owner capability object.
        capability: String,
    },
    /// Active subscription to the publication.
    Subscription {
        /// On-chain id of the subscription object.
        subscription: String,
        /// On-chain id of the subscription service it was bought from.
        service: String,
    },
    /// Owned NFT granting access.
    Nft {
        /// On-chain id of the access-granting token.
        token: String,
    },
    /// Contributor role on the publication.
    Contributor {
        /// On-chain id of the contributor role object.
        role: String,
    },
    /// Universal free access; requires nothing beyond the content's own
    /// public identity.
    FreeAccess,
}

impl AccessCredential {
    /// Priority rank; lower tries first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Owner { .. } => 0,
            Self::Subscription { .. } => 1,
            Self::Nft { .. } => 2,
            Self::Contributor { .. } => 3,
            Self::FreeAccess => 4,
        }
    }

    /// Label used in logs and denial reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Owner { .. } => "owner",
            Self::Subscription { .. } => "subscription",
            Self::Nft { .. } => "nft",
            Self::Contributor { .. } => "contributor",
            Self::FreeAccess => "free-access",
        }
    }

    /// Whether this credential type needs a wallet-bound session
    /// credential. Free access runs on the device-local credential and
    /// never triggers an interactive prompt.
    pub fn requires_wallet(&self) -> bool {
        !matches!(self, Self::FreeAccess)
    }

    /// Well-known entrypoint on the policy package for this type.
    pub fn entrypoint(&self) -> &'static str {
        match self {
            Self::Owner { .. } => "assert_owner",
            Self::Subscription { .. } => "assert_subscription",
            Self::Nft { .. } => "assert_token_grant",
            Self::Contributor { .. } => "assert_contributor",
            Self::FreeAccess => "assert_open_access",
        }
    }

    /// On-chain object ids the authorization call references.
    pub fn proof_objects(&self) -> Vec<String> {
        match self {
            Self::Owner { capability } => vec![capability.clone()],
            Self::Subscription {
                subscription,
                service,
            } => vec![subscription.clone(), service.clone()],
            Self::Nft { token } => vec![token.clone()],
            Self::Contributor { role } => vec![role.clone()],
            Self::FreeAccess => Vec::new(),
        }
    }
}

/// The set of access credentials a caller holds for one content item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCredentialSet {
    held: Vec<AccessCredential>,
}

impl AccessCredentialSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, credential: AccessCredential) -> Self {
        self.add(credential);
        self
    }

    /// Add a credential the caller holds.
    pub fn add(&mut self, credential: AccessCredential) {
        self.held.push(credential);
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Held credentials in attempt order, most privileged first.
    pub fn ordered(&self) -> Vec<&AccessCredential> {
        let mut ordered: Vec<&AccessCredential> = self.held.iter().collect();
        ordered.sort_by_key(|c| c.priority());
        ordered
    }
}

impl FromIterator<AccessCredential> for AccessCredentialSet {
    fn from_iter<I: IntoIterator<Item = AccessCredential>>(iter: I) -> Self {
        Self {
            held: iter.into_iter().collect(),
        }
    }
}
