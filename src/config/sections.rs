//! Configuration subsections.
//!
//! Every field is optional so a file can set only what it changes; the
//! accessor methods fill in defaults.

use serde::{Deserialize, Serialize};

use crate::giftwrap::DEFAULT_TIMESTAMP_JITTER_SECS;
use crate::nip44::DEFAULT_CONVERSATION_KEY_CACHE_SIZE;

/// Identity configuration (`identity.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Secret key in nsec (bech32) or hex format (`identity.nsec`).
    /// If not specified, a new keypair will be generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsec: Option<String>,
}

/// Gift wrap behavior (`envelope.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Max seconds seal and wrap timestamps are shifted either way
    /// (`envelope.timestamp_jitter_secs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_jitter_secs: Option<i64>,

    /// Also wrap every sent message to ourselves (`envelope.self_copy`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_copy: Option<bool>,
}

impl EnvelopeConfig {
    pub fn timestamp_jitter_secs(&self) -> i64 {
        self.timestamp_jitter_secs
            .unwrap_or(DEFAULT_TIMESTAMP_JITTER_SECS)
    }

    pub fn self_copy(&self) -> bool {
        self.self_copy.unwrap_or(true)
    }
}

/// Cache sizing (`cache.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Max cached NIP-44 conversation keys (`cache.conversation_keys`).
    /// Zero disables the cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_keys: Option<usize>,
}

impl CacheConfig {
    pub fn conversation_keys(&self) -> usize {
        self.conversation_keys
            .unwrap_or(DEFAULT_CONVERSATION_KEY_CACHE_SIZE)
    }
}
