//! Credential store backends
//!
//! Persisted state is a flat set of JSON records keyed by logical name.
//! Two backends: an in-memory store for tests and short-lived sessions, and
//! a file-backed store that persists one JSON document with atomic
//! write-then-rename. A corrupt persisted document is treated as an empty
//! cache, not a fatal error; the manager recreates entries on demand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::SessionError;

/// Flat key/value store of JSON records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the record stored under `key`, if present.
    async fn read(&self, key: &str) -> Result<Option<serde_json::Value>, SessionError>;

    /// Write a record, replacing any existing one. Writes are atomic at
    /// one-key granularity; no partial write is observable.
    async fn write(&self, key: &str, value: serde_json::Value) -> Result<(), SessionError>;

    /// Remove the record stored under `key`, if present.
    async fn remove(&self, key: &str) -> Result<(), SessionError>;

    /// All keys currently stored.
    async fn keys(&self) -> Result<Vec<String>, SessionError>;
}

/// In-memory credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: DashMap<String, serde_json::Value>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn read(&self, key: &str) -> Result<Option<serde_json::Value>, SessionError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn write(&self, key: &str, value: serde_json::Value) -> Result<(), SessionError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, SessionError> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }
}

/// File-backed credential store.
///
/// All records live in one JSON document. Every write persists the whole
/// document to a temp file and renames it into place, so readers never see
/// a half-written file.
pub struct FileCredentialStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl FileCredentialStore {
    /// Open (or create) the store at `path`.
    ///
    /// An unreadable or unparseable document self-heals as an empty cache.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::StoreIo(e.to_string()))?;
        }

        let entries = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, serde_json::Value>>(&bytes)
            {
                Ok(map) => map,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "credential store file is corrupt, starting empty"
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(SessionError::StoreIo(e.to_string())),
        };

        debug!(path = %path.display(), entries = entries.len(), "credential store opened");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn persist(
        &self,
        entries: &HashMap<String, serde_json::Value>,
    ) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| SessionError::StoreIo(e.to_string()))?;

        // Write to temp, then rename
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &bytes)
            .await
            .map_err(|e| SessionError::StoreIo(e.to_string()))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| SessionError::StoreIo(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn read(&self, key: &str) -> Result<Option<serde_json::Value>, SessionError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: serde_json::Value) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, SessionError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
