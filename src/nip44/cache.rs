//! Conversation key cache.
//!
//! ECDH plus HKDF costs far more than the symmetric work of a single
//! payload, and the result is fixed for a given pair of keys. Keys are
//! computed outside the map and published whole, so a reader sees either no
//! entry or a finished key.

use dashmap::DashMap;
use secp256k1::{SecretKey, XOnlyPublicKey};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

use super::ConversationKey;

/// Default maximum number of cached conversation keys.
pub const DEFAULT_CONVERSATION_KEY_CACHE_SIZE: usize = 1024;

/// Cache statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of entries.
    pub entries: usize,
    /// Maximum capacity.
    pub max_entries: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that derived a new key.
    pub misses: u64,
}

impl CacheStats {
    /// Fill ratio (entries / max_entries).
    pub fn fill_ratio(&self) -> f64 {
        if self.max_entries == 0 {
            0.0
        } else {
            self.entries as f64 / self.max_entries as f64
        }
    }

    /// Fraction of lookups answered from the cache.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Concurrent map from (local pubkey, peer pubkey) to conversation key.
pub struct ConversationKeyCache {
    entries: DashMap<(XOnlyPublicKey, XOnlyPublicKey), ConversationKey>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ConversationKeyCache {
    /// Create a cache holding at most `max_entries` keys.
    ///
    /// A capacity of zero disables caching: every lookup derives.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(max_entries.min(1024)),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the key for `(secret, peer)`, deriving and caching it on a miss.
    pub fn get_or_derive(&self, secret: &SecretKey, peer: &XOnlyPublicKey) -> ConversationKey {
        let secp = secp256k1::Secp256k1::signing_only();
        let (local, _) = secret.x_only_public_key(&secp);
        let map_key = (local, *peer);

        if let Some(entry) = self.entries.get(&map_key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return entry.value().clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let derived = ConversationKey::derive(secret, peer);
        if self.max_entries == 0 {
            return derived;
        }

        if self.entries.len() >= self.max_entries {
            self.evict_one();
        }
        trace!(peer = %peer, "Cached conversation key");
        // Another thread may have published the same key meanwhile; both
        // values are identical, keep whichever landed first.
        self.entries
            .entry(map_key)
            .or_insert(derived)
            .value()
            .clone()
    }

    /// Drop every key involving `peer`.
    pub fn forget_peer(&self, peer: &XOnlyPublicKey) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, p), _| p != peer);
        before.saturating_sub(self.entries.len())
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn evict_one(&self) {
        // Any entry will do: a re-derive costs one ECDH
        let victim = self.entries.iter().next().map(|e| *e.key());
        if let Some(key) = victim {
            self.entries.remove(&key);
        }
    }
}

impl Default for ConversationKeyCache {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERSATION_KEY_CACHE_SIZE)
    }
}

impl fmt::Debug for ConversationKeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationKeyCache")
            .field("entries", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}
