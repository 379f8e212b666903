//! Subscription filters.

use secp256k1::XOnlyPublicKey;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::MessageError;
use crate::event::{Event, EventId, Kind};

/// A NIP-01 subscription filter.
///
/// Empty lists mean "no constraint" and are left out of the JSON form.
/// Single-letter tag constraints serialize as `#<letter>` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub ids: Vec<String>,
    pub authors: Vec<String>,
    pub kinds: Vec<Kind>,
    pub tags: BTreeMap<char, Vec<String>>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<u64>,
    /// NIP-50 full-text query.
    pub search: Option<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: &EventId) -> Self {
        self.ids.push(id.to_hex());
        self
    }

    pub fn author(mut self, pubkey: &XOnlyPublicKey) -> Self {
        self.authors.push(hex::encode(pubkey.serialize()));
        self
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.kinds.push(kind);
        self
    }

    /// `#e`: events referencing this event.
    pub fn event(self, id: &EventId) -> Self {
        self.tag('e', id.to_hex())
    }

    /// `#p`: events referencing this pubkey.
    pub fn pubkey(self, pubkey: &XOnlyPublicKey) -> Self {
        self.tag('p', hex::encode(pubkey.serialize()))
    }

    /// `#d`: parameterized replaceable identifier.
    pub fn identifier(self, d: impl Into<String>) -> Self {
        self.tag('d', d)
    }

    /// `#t`: hashtag.
    pub fn hashtag(self, t: impl Into<String>) -> Self {
        self.tag('t', t)
    }

    pub fn tag(mut self, letter: char, value: impl Into<String>) -> Self {
        self.tags.entry(letter).or_default().push(value.into());
        self
    }

    pub fn since(mut self, ts: i64) -> Self {
        self.since = Some(ts);
        self
    }

    pub fn until(mut self, ts: i64) -> Self {
        self.until = Some(ts);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    /// Whether an event passes every constraint except `limit` and `search`.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(&event.id().to_hex()) {
            return false;
        }
        if !self.authors.is_empty()
            && !self.authors.contains(&hex::encode(event.pubkey().serialize()))
        {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind()) {
            return false;
        }
        if self.since.is_some_and(|since| event.created_at() < since) {
            return false;
        }
        if self.until.is_some_and(|until| event.created_at() > until) {
            return false;
        }
        self.tags.iter().all(|(letter, wanted)| {
            let name = letter.to_string();
            let found = event.tag_values(&name).any(|v| wanted.iter().any(|w| w == v));
            found
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if !self.ids.is_empty() {
            map.insert("ids".into(), strings(&self.ids));
        }
        if !self.authors.is_empty() {
            map.insert("authors".into(), strings(&self.authors));
        }
        if !self.kinds.is_empty() {
            map.insert(
                "kinds".into(),
                Value::Array(self.kinds.iter().map(|k| Value::from(k.as_u16())).collect()),
            );
        }
        for (letter, values) in &self.tags {
            if !values.is_empty() {
                map.insert(format!("#{letter}"), strings(values));
            }
        }
        if let Some(since) = self.since {
            map.insert("since".into(), Value::from(since));
        }
        if let Some(until) = self.until {
            map.insert("until".into(), Value::from(until));
        }
        if let Some(limit) = self.limit {
            map.insert("limit".into(), Value::from(limit));
        }
        if let Some(search) = &self.search {
            map.insert("search".into(), Value::from(search.as_str()));
        }
        Value::Object(map)
    }

    /// Parse a filter object. Unknown keys are ignored.
    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        let obj = value
            .as_object()
            .ok_or_else(|| MessageError::Malformed("filter is not an object".into()))?;

        let mut filter = Filter::new();
        for (key, v) in obj {
            match key.as_str() {
                "ids" => filter.ids = string_list(key, v)?,
                "authors" => filter.authors = string_list(key, v)?,
                "kinds" => {
                    filter.kinds = array(key, v)?
                        .iter()
                        .map(|k| {
                            k.as_u64()
                                .and_then(|k| u16::try_from(k).ok())
                                .map(Kind)
                                .ok_or_else(|| bad_field(key))
                        })
                        .collect::<Result<_, _>>()?;
                }
                "since" => filter.since = Some(v.as_i64().ok_or_else(|| bad_field(key))?),
                "until" => filter.until = Some(v.as_i64().ok_or_else(|| bad_field(key))?),
                "limit" => filter.limit = Some(v.as_u64().ok_or_else(|| bad_field(key))?),
                "search" => {
                    filter.search = Some(v.as_str().ok_or_else(|| bad_field(key))?.to_string())
                }
                _ => {
                    let mut chars = key.chars();
                    if let (Some('#'), Some(letter), None) = (chars.next(), chars.next(), chars.next()) {
                        filter.tags.insert(letter, string_list(key, v)?);
                    }
                }
            }
        }
        Ok(filter)
    }
}

fn strings(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

fn bad_field(key: &str) -> MessageError {
    MessageError::Malformed(format!("filter field '{key}' has the wrong type"))
}

fn array<'a>(key: &str, v: &'a Value) -> Result<&'a Vec<Value>, MessageError> {
    v.as_array().ok_or_else(|| bad_field(key))
}

fn string_list(key: &str, v: &Value) -> Result<Vec<String>, MessageError> {
    array(key, v)?
        .iter()
        .map(|s| s.as_str().map(str::to_string).ok_or_else(|| bad_field(key)))
        .collect()
}
