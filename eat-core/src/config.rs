//! Verifier Configuration
//!
//! Describes the signing domain and the initial key state of a verifier.
//!
//! # Configuration File Format
//!
//! ```yaml
//! version: "1"
//!
//! domain:
//!   chain_id: 31337
//!   verifying_contract: "0x5fbdb2315678afecb367f032d93f642f64180aa3"
//!   # name and version default to "Ethereum Access Token" / "1"
//!
//! keys:
//!   root: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
//!   intermediate: "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"
//!   issuers:
//!     - "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc"
//! ```
//!
//! ```ignore
//! let config = VerifierConfig::from_file("verifier.yaml")?;
//! let verifier = AccessTokenVerifier::from_config(&config)?;
//! ```

use crate::codec::{Domain, DOMAIN_NAME, DOMAIN_VERSION};
use crate::error::Error;
use crate::identity::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Verifier configuration parsed from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Configuration version
    #[serde(default = "default_version")]
    pub version: String,
    /// Signing domain
    pub domain: DomainConfig,
    /// Initial key state
    pub keys: KeysConfig,
}

/// Domain section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    #[serde(default = "default_domain_name")]
    pub name: String,
    #[serde(default = "default_domain_version")]
    pub version: String,
    pub chain_id: u64,
    /// Identity of the guarded endpoint.
    pub verifying_contract: Address,
}

/// Initial key state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    pub root: Address,
    #[serde(default)]
    pub intermediate: Option<Address>,
    /// Issuers to activate, in order. Requires `intermediate`.
    #[serde(default)]
    pub issuers: Vec<Address>,
}

fn default_version() -> String {
    "1".to_string()
}

fn default_domain_name() -> String {
    DOMAIN_NAME.to_string()
}

fn default_domain_version() -> String {
    DOMAIN_VERSION.to_string()
}

impl DomainConfig {
    pub fn to_domain(&self) -> Domain {
        Domain::new(
            self.name.clone(),
            self.version.clone(),
            self.chain_id,
            self.verifying_contract,
        )
    }
}

impl VerifierConfig {
    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(ConfigError::YamlParse)
    }

    /// Load configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(path.as_ref().display().to_string(), e))?;
        Self::from_yaml(&content)
    }
}

/// Configuration parsing error.
#[derive(Debug)]
pub enum ConfigError {
    /// YAML parsing error
    YamlParse(serde_yaml::Error),
    /// File reading error
    FileRead(String, std::io::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::YamlParse(e) => write!(f, "YAML parse error: {}", e),
            ConfigError::FileRead(path, e) => write!(f, "Failed to read {}: {}", path, e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::InvalidConfiguration(e.to_string())
    }
}
