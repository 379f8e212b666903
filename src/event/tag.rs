//! Event tags.

use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};

use super::EventId;

/// A tag: an ordered list of strings whose first element names the tag.
///
/// Common forms:
///
/// - `["p", <pubkey hex>, <relay?>]` references a user
/// - `["e", <event id hex>, <relay?>]` references an event
/// - `["relay", <url>]` names a relay (NIP-42 auth)
///
/// Unknown tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(Vec<String>);

impl Tag {
    /// Build a tag from any list of string-like values.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// `["p", <pubkey>]`
    pub fn pubkey(pubkey: &XOnlyPublicKey) -> Self {
        Self(vec!["p".into(), hex::encode(pubkey.serialize())])
    }

    /// `["e", <event id>]`
    pub fn event(id: &EventId) -> Self {
        Self(vec!["e".into(), id.to_hex()])
    }

    /// `["relay", <url>]`
    pub fn relay(url: &str) -> Self {
        Self(vec!["relay".into(), url.into()])
    }

    /// The tag name, if the tag is non-empty.
    pub fn name(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// The first value after the name.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    /// All elements, name included.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for Tag {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}
