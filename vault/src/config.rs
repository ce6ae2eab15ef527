//! Vault configuration.
//!
//! Stored as YAML in ~/.vaultvoice/config.yaml. Every section is optional;
//! missing fields take their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use vaultvoice_auth::{GovernorConfig, PasswordPolicy};
use vaultvoice_voiceprint::{CaptureConfig, VerifierConfig};

use crate::VaultError;

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".vaultvoice";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Default database filename.
pub const DEFAULT_STORE_FILE: &str = "vault.redb";

/// Prompt shown to the user before each recording.
pub const DEFAULT_PASSPHRASE: &str = "My voice is my password";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file (default: ~/.vaultvoice/vault.redb).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub store: StoreConfig,
    /// Phrase the user is asked to speak. Only displayed, never recognized.
    pub passphrase: String,
    pub capture: CaptureConfig,
    pub verifier: VerifierConfig,
    pub governor: GovernorConfig,
    pub password: PasswordPolicy,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            passphrase: DEFAULT_PASSPHRASE.to_string(),
            capture: CaptureConfig::default(),
            verifier: VerifierConfig::default(),
            governor: GovernorConfig::default(),
            password: PasswordPolicy::default(),
        }
    }
}

impl VaultConfig {
    /// Returns ~/.vaultvoice.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR))
    }

    /// Returns ~/.vaultvoice/config.yaml.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Loads a config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, VaultError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, VaultError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Writes the config as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), VaultError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Resolves the database path, falling back to the default location.
    pub fn store_path(&self) -> Result<PathBuf, VaultError> {
        match &self.store.path {
            Some(p) => Ok(p.clone()),
            None => Self::default_dir()
                .map(|dir| dir.join(DEFAULT_STORE_FILE))
                .ok_or_else(|| VaultError::Config("cannot determine home directory".into())),
        }
    }

    /// Checks settings that span several sections.
    pub fn validate(&self) -> Result<(), VaultError> {
        self.governor.validate()?;
        if self.capture.sample_rate != self.verifier.mfcc.sample_rate {
            return Err(VaultError::Config(format!(
                "capture.sample_rate {} differs from verifier.mfcc.sample_rate {}",
                self.capture.sample_rate, self.verifier.mfcc.sample_rate
            )));
        }
        if self.capture.duration_secs <= 0.0 {
            return Err(VaultError::Config("capture.duration_secs must be positive".into()));
        }
        Ok(())
    }
}
