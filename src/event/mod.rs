//! Nostr events.
//!
//! An event is identified by the SHA-256 of its canonical serialization and
//! signed with BIP-340 Schnorr over that id. Events are immutable once built:
//! an unsigned event (a rumor, or one waiting on an external signer) turns
//! into a signed one through [`Event::with_signature`], which checks the
//! signature before returning.

mod id;
mod tag;

use secp256k1::schnorr::Signature;
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::identity::{verify_digest, IdentityError, KeyPair};

pub use id::{canonical_serialize, compute_id, EventId};
pub use tag::Tag;

/// Errors from building, parsing and checking events.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("tampered event: {0}")]
    Tampered(TamperKind),

    #[error("signing failed: {0}")]
    Signing(#[from] IdentityError),

    #[error("event json: {0}")]
    Json(#[from] serde_json::Error),
}

/// What failed when checking an event against its id and signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TamperKind {
    /// The id does not hash the event fields.
    IdMismatch,
    /// The signature does not verify against the id and pubkey.
    BadSignature,
    /// No signature is attached.
    MissingSignature,
}

impl fmt::Display for TamperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TamperKind::IdMismatch => "id does not match content",
            TamperKind::BadSignature => "invalid signature",
            TamperKind::MissingSignature => "missing signature",
        };
        write!(f, "{}", s)
    }
}

/// Event kind number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kind(pub u16);

impl Kind {
    pub const METADATA: Kind = Kind(0);
    pub const TEXT_NOTE: Kind = Kind(1);
    /// NIP-04 direct message.
    pub const ENCRYPTED_DIRECT_MESSAGE: Kind = Kind(4);
    /// NIP-59 seal.
    pub const SEAL: Kind = Kind(13);
    /// NIP-17 private chat message, carried as a rumor.
    pub const PRIVATE_DIRECT_MESSAGE: Kind = Kind(14);
    /// NIP-59 gift wrap.
    pub const GIFT_WRAP: Kind = Kind(1059);
    pub const ZAP_REQUEST: Kind = Kind(9734);
    pub const ZAP_RECEIPT: Kind = Kind(9735);
    /// NIP-42 relay authentication.
    pub const CLIENT_AUTH: Kind = Kind(22242);
    pub const WALLET_CONNECT_REQUEST: Kind = Kind(23194);
    pub const WALLET_CONNECT_RESPONSE: Kind = Kind(23195);

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl From<u16> for Kind {
    fn from(value: u16) -> Self {
        Kind(value)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Nostr event.
///
/// The JSON object form is the one relays exchange:
///
/// ```json
/// {
///   "id": "<64 hex>",
///   "pubkey": "<64 hex>",
///   "created_at": 1700000000,
///   "kind": 1,
///   "tags": [["p", "<64 hex>"]],
///   "content": "hello",
///   "sig": "<128 hex>"
/// }
/// ```
///
/// `sig` is omitted for unsigned events; an empty string reads as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    pubkey: XOnlyPublicKey,
    created_at: i64,
    kind: Kind,
    tags: Vec<Tag>,
    content: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_sig"
    )]
    sig: Option<Signature>,
}

impl Event {
    /// Build and sign an event. `created_at` defaults to now.
    pub fn create(
        keys: &KeyPair,
        kind: Kind,
        content: impl Into<String>,
        tags: Vec<Tag>,
        created_at: Option<i64>,
    ) -> Result<Self, EventError> {
        let created_at = created_at.unwrap_or_else(unix_now);
        let mut event = Self::new_unsigned(keys.public_key(), kind, content, tags, created_at);
        event.sig = Some(keys.sign(event.id.as_bytes())?);
        Ok(event)
    }

    /// Build an event with its id computed but no signature.
    ///
    /// Used for rumors and for handing the id to an external signer.
    pub fn new_unsigned(
        pubkey: XOnlyPublicKey,
        kind: Kind,
        content: impl Into<String>,
        tags: Vec<Tag>,
        created_at: i64,
    ) -> Self {
        let content = content.into();
        let pubkey_hex = hex::encode(pubkey.serialize());
        let id = compute_id(&pubkey_hex, created_at, kind, &tags, &content);
        Self {
            id,
            pubkey,
            created_at,
            kind,
            tags,
            content,
            sig: None,
        }
    }

    /// Attach a signature produced elsewhere.
    ///
    /// The id is recomputed and the signature verified before the signed
    /// event is returned.
    pub fn with_signature(mut self, sig: Signature) -> Result<Self, EventError> {
        self.sig = Some(sig);
        self.verify()?;
        Ok(self)
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn pubkey(&self) -> &XOnlyPublicKey {
        &self.pubkey
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn sig(&self) -> Option<&Signature> {
        self.sig.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.sig.is_some()
    }

    /// Value of the first tag with the given name.
    pub fn first_tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name() == Some(name))
            .and_then(Tag::value)
    }

    /// Values of every tag with the given name.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.name() == Some(name))
            .filter_map(Tag::value)
    }

    /// Recompute the id from the fields and compare.
    pub fn verify_id(&self) -> Result<(), EventError> {
        let pubkey_hex = hex::encode(self.pubkey.serialize());
        let expected = compute_id(
            &pubkey_hex,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        );
        if expected != self.id {
            return Err(EventError::Tampered(TamperKind::IdMismatch));
        }
        Ok(())
    }

    /// Check the id, then the signature over it.
    pub fn verify(&self) -> Result<(), EventError> {
        self.verify_id()?;
        let sig = self
            .sig
            .as_ref()
            .ok_or(EventError::Tampered(TamperKind::MissingSignature))?;
        verify_digest(&self.pubkey, self.id.as_bytes(), sig)
            .map_err(|_| EventError::Tampered(TamperKind::BadSignature))
    }

    /// Serialize to the JSON object form.
    pub fn to_json(&self) -> String {
        // Every field serializes to a JSON string, number or array
        serde_json::to_string(self).expect("event serialization cannot fail")
    }

    /// Parse the JSON object form. The id and signature are not checked.
    pub fn from_json(json: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Positional form `[id, pubkey, created_at, kind, tags, content, sig]`.
    ///
    /// An unsigned event carries an empty string in the `sig` slot.
    pub fn to_wire_array(&self) -> Value {
        Value::Array(vec![
            Value::String(self.id.to_hex()),
            Value::String(hex::encode(self.pubkey.serialize())),
            Value::from(self.created_at),
            Value::from(self.kind.as_u16()),
            Value::Array(
                self.tags
                    .iter()
                    .map(|t| {
                        Value::Array(t.as_slice().iter().cloned().map(Value::String).collect())
                    })
                    .collect(),
            ),
            Value::String(self.content.clone()),
            Value::String(
                self.sig
                    .as_ref()
                    .map(|s| hex::encode(s.to_byte_array()))
                    .unwrap_or_default(),
            ),
        ])
    }

    /// Parse the positional form. The id and signature are not checked.
    pub fn from_wire_array(value: &Value) -> Result<Self, EventError> {
        let fields = value
            .as_array()
            .ok_or_else(|| malformed("expected a JSON array"))?;
        if fields.len() != 7 {
            return Err(malformed(format!("expected 7 fields, got {}", fields.len())));
        }

        let id = EventId::from_hex(str_field(&fields[0], "id")?)?;
        let pubkey = parse_pubkey(str_field(&fields[1], "pubkey")?)?;
        let created_at = fields[2]
            .as_i64()
            .ok_or_else(|| malformed("created_at is not an integer"))?;
        let kind = fields[3]
            .as_u64()
            .and_then(|k| u16::try_from(k).ok())
            .map(Kind)
            .ok_or_else(|| malformed("kind is not an integer in 0..=65535"))?;
        let tags = parse_tags(&fields[4])?;
        let content = str_field(&fields[5], "content")?.to_string();
        let sig = parse_sig(str_field(&fields[6], "sig")?).map_err(malformed)?;

        Ok(Self {
            id,
            pubkey,
            created_at,
            kind,
            tags,
            content,
            sig,
        })
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn malformed(msg: impl Into<String>) -> EventError {
    EventError::Malformed(msg.into())
}

fn str_field<'a>(value: &'a Value, name: &str) -> Result<&'a str, EventError> {
    value
        .as_str()
        .ok_or_else(|| malformed(format!("{} is not a string", name)))
}

fn parse_pubkey(s: &str) -> Result<XOnlyPublicKey, EventError> {
    let bytes = hex::decode(s).map_err(|e| malformed(format!("pubkey is not hex: {e}")))?;
    XOnlyPublicKey::from_slice(&bytes).map_err(|e| malformed(format!("invalid pubkey: {e}")))
}

fn parse_tags(value: &Value) -> Result<Vec<Tag>, EventError> {
    let tags = value
        .as_array()
        .ok_or_else(|| malformed("tags is not an array"))?;
    tags.iter()
        .map(|tag| {
            let items = tag
                .as_array()
                .ok_or_else(|| malformed("tag is not an array"))?;
            items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| malformed("tag element is not a string"))
                })
                .collect::<Result<Vec<String>, _>>()
                .map(Tag::from)
        })
        .collect()
}

fn parse_sig(s: &str) -> Result<Option<Signature>, String> {
    if s.is_empty() {
        return Ok(None);
    }
    let bytes = hex::decode(s).map_err(|e| format!("sig is not hex: {e}"))?;
    Signature::from_slice(&bytes)
        .map(Some)
        .map_err(|e| format!("invalid sig: {e}"))
}

fn deserialize_sig<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Signature>, D::Error> {
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        None => Ok(None),
        Some(s) => parse_sig(&s).map_err(serde::de::Error::custom),
    }
}
