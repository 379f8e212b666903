//! nostr-envelope: Nostr event signing and private message envelopes
//!
//! Builds and verifies signed Nostr events, encrypts payloads with NIP-04
//! and NIP-44 v2, wraps private messages in NIP-17/NIP-59 gift wraps, and
//! decodes the text formats around them (bech32, NIP-19 identifiers,
//! BOLT11 invoices). Relay frames, wallet connect and zaps sit on top.

pub mod bolt11;
pub mod config;
pub mod encoding;
pub mod event;
pub mod giftwrap;
pub mod identity;
pub mod message;
pub mod nip04;
pub mod nip19;
pub mod nip44;
pub mod nwc;
pub mod zap;

// Re-export identity types
pub use identity::{
    decode_npub, decode_nsec, decode_public, decode_secret, encode_npub, encode_nsec,
    IdentityError, KeyPair,
};

// Re-export config types
pub use config::{CacheConfig, Config, ConfigError, EnvelopeConfig, IdentityConfig};

// Re-export event types
pub use event::{Event, EventError, EventId, Kind, Tag, TamperKind};

// Re-export encryption types
pub use nip04::Nip04Error;
pub use nip44::{CacheStats, ConversationKey, ConversationKeyCache, Nip44Error};

// Re-export envelope types
pub use giftwrap::{GiftWrapError, GiftWrapper, UnwrappedMessage};

// Re-export codec types
pub use bolt11::{Bolt11Error, Invoice};
pub use encoding::{Bech32Error, TlvError};
pub use nip19::{Nip19Entity, Nip19Error};

// Re-export relay, wallet and zap types
pub use message::{ClientMessage, Filter, MessageError, RelayMessage};
pub use nwc::{NwcError, NwcRequest, NwcResponse, WalletConnectUri};
pub use zap::{ZapError, ZapReceipt};
