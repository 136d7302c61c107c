//! Session credential manager
//!
//! Get-or-create over the credential store: a cached credential is served
//! only when its package matches exactly, it carries a signature, and it is
//! not expired (with a safety buffer). Everything else triggers a fresh
//! build-and-sign. The whole user-scoped cache is dropped when the stored
//! authorization-package identifier disagrees with the manager's, which is
//! how a contract redeploy invalidates every credential signed against the
//! old package; the device keypair is never touched by any invalidation.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use plume_core::traits::Signer;

use crate::credential::{CredentialKind, EXPIRY_SAFETY_BUFFER_MILLIS, SessionCredential};
use crate::error::SessionError;
use crate::store::CredentialStore;

/// Store key holding the authorization-package identifier the cache was
/// created under.
pub const PACKAGE_ID_KEY: &str = "package-id";

/// Store key for the device-local credential.
pub const DEVICE_CREDENTIAL_KEY: &str = "credential:device";

/// Prefix for wallet-bound credential keys, one per account address.
const WALLET_KEY_PREFIX: &str = "credential:wallet:";

/// Prefix shared by every credential entry (but not the device keypair).
const CREDENTIAL_KEY_PREFIX: &str = "credential:";

/// Caches signed session credentials per `(address, package)` pair.
pub struct SessionCredentialManager {
    store: Arc<dyn CredentialStore>,
    package_id: String,
    expiry_buffer_millis: u64,
}

impl SessionCredentialManager {
    /// Open a manager over `store`, scoped to `package_id`.
    ///
    /// If the store was populated under a different package identifier, all
    /// cached credentials are dropped before the manager becomes usable.
    pub async fn open(
        store: Arc<dyn CredentialStore>,
        package_id: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let package_id = package_id.into();

        let stored = store.read(PACKAGE_ID_KEY).await?;
        let matches = stored
            .as_ref()
            .and_then(|value| value.as_str())
            .is_some_and(|stored_id| stored_id == package_id);
        if !matches {
            if stored.is_some() {
                info!(
                    package = %package_id,
                    "authorization package changed, clearing cached credentials"
                );
                clear_credentials(store.as_ref()).await?;
            }
            store
                .write(PACKAGE_ID_KEY, serde_json::Value::String(package_id.clone()))
                .await?;
        }

        Ok(Self {
            store,
            package_id,
            expiry_buffer_millis: EXPIRY_SAFETY_BUFFER_MILLIS,
        })
    }

    /// The authorization package this manager is scoped to.
    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Override the expiry safety buffer.
    pub fn with_expiry_buffer_millis(mut self, buffer_millis: u64) -> Self {
        self.expiry_buffer_millis = buffer_millis;
        self
    }

    /// Return a cached credential for `(signer.address(), package)` or build,
    /// sign, and persist a fresh one.
    pub async fn get_or_create(
        &self,
        signer: &dyn Signer,
        kind: CredentialKind,
        now_millis: u64,
    ) -> Result<SessionCredential, SessionError> {
        self.get_or_create_with_ttl(signer, kind, kind.default_ttl_millis(), now_millis)
            .await
    }

    /// [`Self::get_or_create`] with an explicit TTL request.
    ///
    /// Device TTLs above the cap are clamped by the credential constructor.
    #[instrument(skip(self, signer), fields(address = signer.address(), kind = kind.label()))]
    pub async fn get_or_create_with_ttl(
        &self,
        signer: &dyn Signer,
        kind: CredentialKind,
        ttl_millis: u64,
        now_millis: u64,
    ) -> Result<SessionCredential, SessionError> {
        let key = self.cache_key(kind, signer.address());

        if let Some(cached) = self.read_credential(&key).await? {
            let usable = cached.package_id == self.package_id
                && cached.address == signer.address()
                && cached.is_signed()
                && !cached.is_expired(now_millis, self.expiry_buffer_millis);
            if usable {
                debug!("serving cached session credential");
                return Ok(cached);
            }
            debug!("cached session credential is stale");
        }

        let mut credential = SessionCredential::new(
            signer.address(),
            &self.package_id,
            kind,
            now_millis,
            ttl_millis,
        );
        let signature = signer
            .sign(&credential.challenge_bytes())
            .await
            .map_err(|e| SessionError::AuthenticationFailed(e.to_string()))?;
        credential.signature = Some(signature);

        let value = serde_json::to_value(&credential)
            .map_err(|e| SessionError::StoreIo(e.to_string()))?;
        self.store.write(&key, value).await?;
        info!("created session credential");
        Ok(credential)
    }

    /// Drop the cached wallet credential for one account.
    pub async fn invalidate_account(&self, address: &str) -> Result<(), SessionError> {
        debug!(address, "invalidating account credential");
        self.store
            .remove(&format!("{}{}", WALLET_KEY_PREFIX, address))
            .await
    }

    /// Drop every cached credential (explicit disconnect). The device
    /// keypair survives.
    pub async fn invalidate_all(&self) -> Result<(), SessionError> {
        debug!("invalidating all cached credentials");
        clear_credentials(self.store.as_ref()).await
    }

    fn cache_key(&self, kind: CredentialKind, address: &str) -> String {
        match kind {
            CredentialKind::Wallet => format!("{}{}", WALLET_KEY_PREFIX, address),
            CredentialKind::Device => DEVICE_CREDENTIAL_KEY.to_string(),
        }
    }

    /// Read and deserialize a cached credential. A record that fails to
    /// parse is discarded so the cache self-heals.
    async fn read_credential(
        &self,
        key: &str,
    ) -> Result<Option<SessionCredential>, SessionError> {
        let Some(value) = self.store.read(key).await? else {
            return Ok(None);
        };
        match serde_json::from_value::<SessionCredential>(value) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                warn!(key, error = %e, "cached credential is corrupt, discarding");
                self.store.remove(key).await?;
                Ok(None)
            }
        }
    }
}

async fn clear_credentials(store: &dyn CredentialStore) -> Result<(), SessionError> {
    for key in store.keys().await? {
        if key.starts_with(CREDENTIAL_KEY_PREFIX) {
            store.remove(&key).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DEVICE_KEYPAIR_KEY, DeviceKeypair};
    use crate::store::MemoryCredentialStore;
    use plume_core::mock::{Ed25519Signer, FailingSigner};
    use serde_json::json;

    const NOW: u64 = 1_700_000_000_000;

    async fn open_manager(store: Arc<MemoryCredentialStore>) -> SessionCredentialManager {
        SessionCredentialManager::open(store, "0xpkg").await.unwrap()
    }

    #[tokio::test]
    async fn test_creates_signed_credential() {
        let manager = open_manager(Arc::new(MemoryCredentialStore::new())).await;
        let signer = Ed25519Signer::from_seed([1u8; 32]);
        let cred = manager
            .get_or_create(&signer, CredentialKind::Wallet, NOW)
            .await
            .unwrap();
        assert!(cred.is_signed());
        assert_eq!(cred.address, signer.address());
        assert_eq!(cred.package_id, "0xpkg");
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_resign() {
        let manager = open_manager(Arc::new(MemoryCredentialStore::new())).await;
        let signer = Ed25519Signer::from_seed([1u8; 32]);
        let first = manager
            .get_or_create(&signer, CredentialKind::Wallet, NOW)
            .await
            .unwrap();

        // Second call hits the cache: a failing signer proves no re-sign
        let failing = FailingSigner::new(signer.address());
        let second = manager
            .get_or_create(&failing, CredentialKind::Wallet, NOW + 1000)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_expired_credential_is_replaced() {
        let manager = open_manager(Arc::new(MemoryCredentialStore::new())).await;
        let signer = Ed25519Signer::from_seed([1u8; 32]);
        let first = manager
            .get_or_create(&signer, CredentialKind::Wallet, NOW)
            .await
            .unwrap();

        let later = NOW + first.ttl_millis + 1;
        let second = manager
            .get_or_create(&signer, CredentialKind::Wallet, later)
            .await
            .unwrap();
        assert_eq!(second.created_at_millis, later);
        assert!(!second.is_expired(later, 0));
    }

    #[tokio::test]
    async fn test_about_to_expire_credential_is_replaced() {
        let manager = open_manager(Arc::new(MemoryCredentialStore::new())).await;
        let signer = Ed25519Signer::from_seed([1u8; 32]);
        let first = manager
            .get_or_create(&signer, CredentialKind::Wallet, NOW)
            .await
            .unwrap();

        // 5s before expiry falls inside the 10s safety buffer
        let near_expiry = first.expires_at_millis() - 5_000;
        let second = manager
            .get_or_create(&signer, CredentialKind::Wallet, near_expiry)
            .await
            .unwrap();
        assert_eq!(second.created_at_millis, near_expiry);
    }

    #[tokio::test]
    async fn test_signing_failure_is_authentication_failed() {
        let manager = open_manager(Arc::new(MemoryCredentialStore::new())).await;
        let signer = FailingSigner::new("0xdead");
        let err = manager
            .get_or_create(&signer, CredentialKind::Wallet, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_package_change_clears_cache() {
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = open_manager(store.clone()).await;
        let signer = Ed25519Signer::from_seed([1u8; 32]);
        manager
            .get_or_create(&signer, CredentialKind::Wallet, NOW)
            .await
            .unwrap();

        // Reopen under a redeployed package: the cache must be empty
        let manager = SessionCredentialManager::open(store.clone(), "0xnewpkg")
            .await
            .unwrap();
        let failing = FailingSigner::new(signer.address());
        let err = manager
            .get_or_create(&failing, CredentialKind::Wallet, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_package_change_keeps_device_keypair() {
        let store = Arc::new(MemoryCredentialStore::new());
        let _manager = open_manager(store.clone()).await;
        let keypair = DeviceKeypair::load_or_generate(store.as_ref()).await.unwrap();

        let _manager = SessionCredentialManager::open(store.clone(), "0xnewpkg")
            .await
            .unwrap();
        assert!(store.read(DEVICE_KEYPAIR_KEY).await.unwrap().is_some());
        let reloaded = DeviceKeypair::load_or_generate(store.as_ref()).await.unwrap();
        assert_eq!(reloaded.address(), keypair.address());
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_self_heals() {
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = open_manager(store.clone()).await;
        let signer = Ed25519Signer::from_seed([1u8; 32]);

        store
            .write(
                &format!("credential:wallet:{}", signer.address()),
                json!("garbage"),
            )
            .await
            .unwrap();

        let cred = manager
            .get_or_create(&signer, CredentialKind::Wallet, NOW)
            .await
            .unwrap();
        assert!(cred.is_signed());
    }

    #[tokio::test]
    async fn test_device_credential_is_account_independent() {
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = open_manager(store.clone()).await;
        let keypair = DeviceKeypair::load_or_generate(store.as_ref()).await.unwrap();
        let signer = keypair.signer();

        let cred = manager
            .get_or_create(&signer, CredentialKind::Device, NOW)
            .await
            .unwrap();
        assert_eq!(cred.kind, CredentialKind::Device);
        assert!(cred.ttl_millis <= crate::credential::DEVICE_MAX_TTL_MILLIS);

        // Account invalidation leaves the device credential alone
        manager.invalidate_account("0xsomeone").await.unwrap();
        assert!(store.read(DEVICE_CREDENTIAL_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate_all_clears_credentials_not_keypair() {
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = open_manager(store.clone()).await;
        let keypair = DeviceKeypair::load_or_generate(store.as_ref()).await.unwrap();
        let wallet = Ed25519Signer::from_seed([2u8; 32]);

        manager
            .get_or_create(&wallet, CredentialKind::Wallet, NOW)
            .await
            .unwrap();
        manager
            .get_or_create(&keypair.signer(), CredentialKind::Device, NOW)
            .await
            .unwrap();

        manager.invalidate_all().await.unwrap();

        let keys = store.keys().await.unwrap();
        assert!(!keys.iter().any(|k| k.starts_with("credential:")));
        assert!(store.read(DEVICE_KEYPAIR_KEY).await.unwrap().is_some());
    }
}
