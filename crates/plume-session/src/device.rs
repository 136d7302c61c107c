//! Device-local keypair
//!
//! A lazily generated Ed25519 keypair tied to the device rather than to any
//! account. It signs free-access session credentials without user
//! interaction and survives account switches, disconnects, and
//! authorization-package redeploys; only deleting the store destroys it.

use async_trait::async_trait;
use ed25519_dalek::Signer as _;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroize;

use plume_core::error::CollaboratorError;
use plume_core::traits::Signer;

use crate::error::SessionError;
use crate::store::CredentialStore;

/// Store key the device keypair record lives under.
pub const DEVICE_KEYPAIR_KEY: &str = "device-keypair";

/// Persisted form of the device keypair.
#[derive(Serialize, Deserialize)]
struct StoredDeviceKey {
    seed_hex: String,
}

/// Long-lived Ed25519 keypair scoped to the device.
pub struct DeviceKeypair {
    key: SigningKey,
}

impl DeviceKeypair {
    /// Load the device keypair from the store, generating and persisting a
    /// fresh one if it is missing or the stored record is corrupt.
    pub async fn load_or_generate(store: &dyn CredentialStore) -> Result<Self, SessionError> {
        if let Some(value) = store.read(DEVICE_KEYPAIR_KEY).await? {
            match serde_json::from_value::<StoredDeviceKey>(value) {
                Ok(record) => match Self::from_seed_hex(&record.seed_hex) {
                    Ok(keypair) => {
                        debug!("loaded device keypair");
                        return Ok(keypair);
                    }
                    Err(e) => {
                        warn!(error = %e, "stored device keypair is invalid, regenerating");
                    }
                },
                Err(e) => {
                    warn!(error = %e, "device keypair record is corrupt, regenerating");
                }
            }
        }

        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        let keypair = Self {
            key: SigningKey::from_bytes(&seed),
        };
        let record = StoredDeviceKey {
            seed_hex: hex::encode(seed),
        };
        seed.zeroize();
        let value = serde_json::to_value(&record)
            .map_err(|e| SessionError::StoreIo(e.to_string()))?;
        store.write(DEVICE_KEYPAIR_KEY, value).await?;
        debug!(address = %keypair.address(), "generated device keypair");
        Ok(keypair)
    }

    fn from_seed_hex(seed_hex: &str) -> Result<Self, SessionError> {
        let bytes = hex::decode(seed_hex)
            .map_err(|e| SessionError::DeviceKeypair(e.to_string()))?;
        let mut seed: [u8; 32] = bytes.try_into().map_err(|_| {
            SessionError::DeviceKeypair("seed has wrong length".to_string())
        })?;
        let key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self { key })
    }

    /// The address this keypair controls, in `0x` hex form.
    pub fn address(&self) -> String {
        format!("0x{}", hex::encode(self.key.verifying_key().to_bytes()))
    }

    /// Build a non-interactive signer backed by this keypair.
    pub fn signer(&self) -> LocalSigner {
        LocalSigner {
            key: self.key.clone(),
            address: self.address(),
        }
    }
}

/// Non-interactive signer backed by the device keypair.
pub struct LocalSigner {
    key: SigningKey,
    address: String,
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CollaboratorError> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}
