//! Key-server set configuration
//!
//! Each deployment environment carries its own key-server set; mixing sets
//! across environments is a configuration error surfaced at client
//! construction, never masked by a fallback.

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Default k for k-of-n threshold encryption.
pub const DEFAULT_THRESHOLD: usize = 2;

/// Deployment environment a key-server set belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Mainnet,
    Testnet,
    Devnet,
    Local,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
            Self::Local => "local",
        };
        write!(f, "{}", name)
    }
}

/// One configured key server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyServerEntry {
    /// Stable identifier of the server endpoint.
    pub endpoint_id: String,
    /// Relative weight, reserved for weighted server selection.
    pub weight: u32,
}

/// A per-environment key-server set with its minimum threshold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyServerSetConfig {
    /// Environment this set serves.
    pub environment: Environment,
    /// Configured servers.
    pub servers: Vec<KeyServerEntry>,
    /// Minimum number of shares required for any operation.
    pub threshold: usize,
}

impl KeyServerSetConfig {
    /// Empty set for `environment` with the default threshold.
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            servers: Vec::new(),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Add a server entry.
    pub fn with_server(mut self, endpoint_id: impl Into<String>, weight: u32) -> Self {
        self.servers.push(KeyServerEntry {
            endpoint_id: endpoint_id.into(),
            weight,
        });
        self
    }

    /// Override the threshold.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Validate the set. Called eagerly at client construction.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.servers.is_empty() {
            return Err(CryptoError::Configuration(
                "key-server set is empty".to_string(),
            ));
        }
        if self.threshold == 0 {
            return Err(CryptoError::Configuration(
                "threshold must be at least 1".to_string(),
            ));
        }
        if self.threshold > self.servers.len() {
            return Err(CryptoError::Configuration(format!(
                "threshold {} exceeds configured server count {}",
                self.threshold,
                self.servers.len()
            )));
        }
        if self.threshold > u8::MAX as usize {
            return Err(CryptoError::Configuration(format!(
                "threshold {} exceeds envelope limit {}",
                self.threshold,
                u8::MAX
            )));
        }
        for (i, entry) in self.servers.iter().enumerate() {
            if entry.endpoint_id.is_empty() {
                return Err(CryptoError::Configuration(format!(
                    "server {} has an empty endpoint id",
                    i
                )));
            }
            if self.servers[..i]
                .iter()
                .any(|other| other.endpoint_id == entry.endpoint_id)
            {
                return Err(CryptoError::Configuration(format!(
                    "duplicate endpoint id {}",
                    entry.endpoint_id
                )));
            }
        }
        Ok(())
    }
}
