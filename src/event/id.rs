//! Event identifiers and the canonical form they hash.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::{EventError, Kind, Tag};
use crate::identity::sha256;

/// 32-byte event identifier: SHA-256 of the canonical serialization.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId([u8; 32]);

impl EventId {
    /// Create an EventId from a 32-byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create an EventId from a slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self, EventError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| {
            EventError::Malformed(format!("event id must be 32 bytes, got {}", slice.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Parse a 64-char hex id.
    pub fn from_hex(s: &str) -> Result<Self, EventError> {
        let bytes = hex::decode(s)
            .map_err(|e| EventError::Malformed(format!("event id is not hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Return the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Return the id as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for EventId {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for EventId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Produce the byte string an event id is computed over:
///
/// ```text
/// [0,"<pubkey>",<created_at>,<kind>,<tags>,"<content>"]
/// ```
///
/// No whitespace. Strings (content and every tag element) escape only
/// backslash, double quote, newline, carriage return and tab; every other
/// character is written as-is. Relays recompute ids the same way, so this
/// must not drift towards general JSON escaping.
pub fn canonical_serialize(
    pubkey_hex: &str,
    created_at: i64,
    kind: Kind,
    tags: &[Tag],
    content: &str,
) -> String {
    let mut out = String::with_capacity(96 + content.len());
    out.push_str("[0,");
    push_escaped(&mut out, pubkey_hex);
    out.push(',');
    out.push_str(&created_at.to_string());
    out.push(',');
    out.push_str(&kind.as_u16().to_string());
    out.push_str(",[");
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('[');
        for (j, value) in tag.as_slice().iter().enumerate() {
            if j > 0 {
                out.push(',');
            }
            push_escaped(&mut out, value);
        }
        out.push(']');
    }
    out.push_str("],");
    push_escaped(&mut out, content);
    out.push(']');
    out
}

/// SHA-256 of [`canonical_serialize`].
pub fn compute_id(
    pubkey_hex: &str,
    created_at: i64,
    kind: Kind,
    tags: &[Tag],
    content: &str,
) -> EventId {
    let canonical = canonical_serialize(pubkey_hex, created_at, kind, tags, content);
    EventId(sha256(canonical.as_bytes()))
}

fn push_escaped(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}
