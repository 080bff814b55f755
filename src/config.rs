//! Configuration management.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attributes::CertificateAttributes;
use crate::error::{PkiError, Result};
use crate::key::KeyAlgorithm;
use crate::request::ValidityDelta;

/// Subject templates and issuance defaults.
///
/// ```toml
/// [ca]
/// CN = "Root CA"
/// O = "MyNET"
///
/// [server]
/// commonName = "server.mynet.it"
///
/// [defaults]
/// key_algorithm = { type = "ecdsa-p256" }
/// validity_years = 2
/// root_validity = { years = 10 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PkiConfig {
    /// Subject of the root certificate.
    #[serde(default)]
    pub ca: CertificateAttributes,

    /// Subject template for server certificates.
    #[serde(default)]
    pub server: CertificateAttributes,

    /// Subject template for client certificates.
    #[serde(default)]
    pub client: CertificateAttributes,

    #[serde(default)]
    pub defaults: IssuanceDefaults,
}

/// Values used when a request leaves them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuanceDefaults {
    /// Validity of leaf certificates.
    pub validity_years: u32,
    pub key_algorithm: KeyAlgorithm,
    /// Validity of the root certificate.
    pub root_validity: ValidityDelta,
}

impl Default for IssuanceDefaults {
    fn default() -> Self {
        Self {
            validity_years: 1,
            key_algorithm: KeyAlgorithm::default(),
            root_validity: ValidityDelta::years(1),
        }
    }
}

impl PkiConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PkiError::ConfigError(e.to_string()))
    }
}
