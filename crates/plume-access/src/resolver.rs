//! Sequential credential-type resolution
//!
//! One ordered pass over the caller's held credentials: session credential,
//! proof, threshold decrypt. The first accepted attempt wins; every failure
//! is logged with its credential kind and accumulated into the denial
//! report. Attempts are strictly sequential so a success short-circuits the
//! rest and wallet signing is never triggered for a type that will not be
//! tried.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use plume_core::traits::{ChainRpc, Signer};
use plume_crypto::client::ThresholdClient;
use plume_crypto::envelope::EncryptedEnvelope;
use plume_session::credential::CredentialKind;
use plume_session::manager::SessionCredentialManager;

use crate::credential::AccessCredentialSet;
use crate::error::{AccessError, Attempt};
use crate::proof::build_proof;

/// Resolves the right authorization path for one decryption.
pub struct AccessResolver {
    chain: Arc<dyn ChainRpc>,
    package_id: String,
}

impl AccessResolver {
    pub fn new(chain: Arc<dyn ChainRpc>, package_id: impl Into<String>) -> Self {
        Self {
            chain,
            package_id: package_id.into(),
        }
    }

    /// The policy package proofs are built against.
    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Attempt decryption via each held credential type in priority order.
    ///
    /// Wallet-bound types use `wallet_signer`; free access uses
    /// `device_signer`. Exhausting every held type yields
    /// [`AccessError::Denied`] naming what was attempted.
    #[instrument(skip_all, fields(identity = %envelope.identity(), held = held.len()))]
    pub async fn decrypt(
        &self,
        client: &ThresholdClient,
        sessions: &SessionCredentialManager,
        envelope: &EncryptedEnvelope,
        held: &AccessCredentialSet,
        wallet_signer: &dyn Signer,
        device_signer: &dyn Signer,
        now_millis: u64,
    ) -> Result<Vec<u8>, AccessError> {
        let mut attempted = Vec::new();

        for credential in held.ordered() {
            let kind = credential.kind();

            let (signer, session_kind) = if credential.requires_wallet() {
                (wallet_signer, CredentialKind::Wallet)
            } else {
                (device_signer, CredentialKind::Device)
            };

            let session = match sessions.get_or_create(signer, session_kind, now_millis).await {
                Ok(session) => session,
                Err(e) => {
                    warn!(kind, error = %e, "session credential unavailable, trying next type");
                    attempted.push(Attempt {
                        kind,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let proof =
                match build_proof(self.chain.as_ref(), &self.package_id, credential, envelope.identity())
                    .await
                {
                    Ok(proof) => proof,
                    Err(e) => {
                        warn!(kind, error = %e, "authorization proof failed, trying next type");
                        attempted.push(Attempt {
                            kind,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };

            match client.decrypt(envelope, &session, &proof, now_millis).await {
                Ok(plaintext) => {
                    info!(kind, "decryption authorized");
                    return Ok(plaintext);
                }
                Err(e) => {
                    warn!(kind, error = %e, "threshold decrypt failed, trying next type");
                    attempted.push(Attempt {
                        kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(AccessError::Denied { attempted })
    }
}
