//! nostr-envelope configuration
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./nostr-envelope.yaml` (current directory - highest priority)
//! 2. `~/.config/nostr-envelope/nostr-envelope.yaml` (user config directory)
//! 3. `/etc/nostr-envelope/nostr-envelope.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority files.
//!
//! # YAML Structure
//!
//! ```yaml
//! identity:
//!   nsec: "nsec1..."
//! envelope:
//!   timestamp_jitter_secs: 172800
//!   self_copy: true
//! cache:
//!   conversation_keys: 1024
//! ```

mod sections;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::giftwrap::GiftWrapper;
use crate::identity::{IdentityError, KeyPair};
use crate::nip44::ConversationKeyCache;

pub use sections::{CacheConfig, EnvelopeConfig, IdentityConfig};

/// Default config filename.
const CONFIG_FILENAME: &str = "nostr-envelope.yaml";

/// Directory name under `/etc` and the user config dir.
const CONFIG_DIRNAME: &str = "nostr-envelope";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Signing identity (`identity.*`).
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Gift wrap behavior (`envelope.*`).
    #[serde(default)]
    pub envelope: EnvelopeConfig,

    /// Cache sizing (`cache.*`).
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Create a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Returns the merged config and the paths that were actually loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding earlier ones.
    /// Missing files are skipped.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let file_config = Self::load_file(path)?;
                config.merge(file_config);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
    }

    /// Load configuration from a single file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        paths.push(PathBuf::from("/etc").join(CONFIG_DIRNAME).join(CONFIG_FILENAME));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(CONFIG_DIRNAME).join(CONFIG_FILENAME));
        }

        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Config) {
        if other.identity.nsec.is_some() {
            self.identity.nsec = other.identity.nsec;
        }
        if other.envelope.timestamp_jitter_secs.is_some() {
            self.envelope.timestamp_jitter_secs = other.envelope.timestamp_jitter_secs;
        }
        if other.envelope.self_copy.is_some() {
            self.envelope.self_copy = other.envelope.self_copy;
        }
        if other.cache.conversation_keys.is_some() {
            self.cache.conversation_keys = other.cache.conversation_keys;
        }
    }

    /// Create signing keys from this configuration.
    ///
    /// If an nsec is configured, uses that. Otherwise, generates a new
    /// random keypair.
    pub fn create_keys(&self) -> Result<KeyPair, ConfigError> {
        match &self.identity.nsec {
            Some(nsec) => Ok(KeyPair::from_secret_str(nsec)?),
            None => Ok(KeyPair::generate()),
        }
    }

    /// Check if an identity is configured (vs. will be generated).
    pub fn has_identity(&self) -> bool {
        self.identity.nsec.is_some()
    }

    /// Build a gift wrapper with the configured jitter and cache size.
    pub fn gift_wrapper(&self) -> GiftWrapper {
        GiftWrapper::new(
            self.envelope.timestamp_jitter_secs(),
            Arc::new(ConversationKeyCache::new(self.cache.conversation_keys())),
        )
    }

    /// Serialize this configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
