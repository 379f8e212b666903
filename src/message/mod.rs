//! Client/relay frames.
//!
//! Frames are JSON arrays whose first element names the message:
//!
//! ```text
//! client → relay   ["EVENT", <event>]
//!                  ["REQ", <sub id>, <filter>, ...]
//!                  ["CLOSE", <sub id>]
//!                  ["AUTH", <event>]
//! relay → client   ["EVENT", <sub id>, <event>]
//!                  ["OK", <event id>, <accepted>, <message>]
//!                  ["EOSE", <sub id>]
//!                  ["CLOSED", <sub id>, <message>]
//!                  ["NOTICE", <message>]
//!                  ["AUTH", <challenge>]
//! ```
//!
//! Parsing does not verify embedded events; callers run
//! [`Event::verify`] before trusting one.

mod filter;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::event::{Event, EventError, EventId, Kind, Tag};
use crate::identity::KeyPair;

pub use filter::Filter;

/// Errors from parsing frames.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unknown frame type: {0}")]
    UnknownType(String),

    #[error("embedded event: {0}")]
    Event(#[from] EventError),
}

/// Frames a client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Event(Event),
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },
    Close(String),
    /// NIP-42 authentication response.
    Auth(Event),
}

impl ClientMessage {
    pub fn req(subscription_id: impl Into<String>, filters: Vec<Filter>) -> Self {
        ClientMessage::Req {
            subscription_id: subscription_id.into(),
            filters,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ClientMessage::Event(event) => json!(["EVENT", event]),
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                let mut frame = vec![Value::from("REQ"), Value::from(subscription_id.as_str())];
                frame.extend(filters.iter().map(Filter::to_value));
                Value::Array(frame)
            }
            ClientMessage::Close(sub) => json!(["CLOSE", sub]),
            ClientMessage::Auth(event) => json!(["AUTH", event]),
        }
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(json)?;
        let (name, rest) = split_frame(&value)?;

        match name {
            "EVENT" => Ok(ClientMessage::Event(event_at(rest, 0)?)),
            "REQ" => {
                let subscription_id = str_at(rest, 0)?.to_string();
                let filters = rest[1..]
                    .iter()
                    .map(Filter::from_value)
                    .collect::<Result<_, _>>()?;
                Ok(ClientMessage::Req {
                    subscription_id,
                    filters,
                })
            }
            "CLOSE" => Ok(ClientMessage::Close(str_at(rest, 0)?.to_string())),
            "AUTH" => Ok(ClientMessage::Auth(event_at(rest, 0)?)),
            other => Err(MessageError::UnknownType(other.to_string())),
        }
    }
}

/// Frames a relay sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    Event {
        subscription_id: String,
        event: Event,
    },
    Ok {
        event_id: EventId,
        accepted: bool,
        message: String,
    },
    Eose(String),
    Closed {
        subscription_id: String,
        message: String,
    },
    Notice(String),
    /// NIP-42 challenge.
    Auth { challenge: String },
}

impl RelayMessage {
    pub fn to_value(&self) -> Value {
        match self {
            RelayMessage::Event {
                subscription_id,
                event,
            } => json!(["EVENT", subscription_id, event]),
            RelayMessage::Ok {
                event_id,
                accepted,
                message,
            } => json!(["OK", event_id, accepted, message]),
            RelayMessage::Eose(sub) => json!(["EOSE", sub]),
            RelayMessage::Closed {
                subscription_id,
                message,
            } => json!(["CLOSED", subscription_id, message]),
            RelayMessage::Notice(message) => json!(["NOTICE", message]),
            RelayMessage::Auth { challenge } => json!(["AUTH", challenge]),
        }
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(json)?;
        let (name, rest) = split_frame(&value)?;

        match name {
            "EVENT" => Ok(RelayMessage::Event {
                subscription_id: str_at(rest, 0)?.to_string(),
                event: event_at(rest, 1)?,
            }),
            "OK" => Ok(RelayMessage::Ok {
                event_id: EventId::from_hex(str_at(rest, 0)?)?,
                accepted: rest
                    .get(1)
                    .and_then(Value::as_bool)
                    .ok_or_else(|| MessageError::Malformed("OK without accepted flag".into()))?,
                // Some relays omit the message
                message: rest.get(2).and_then(Value::as_str).unwrap_or_default().to_string(),
            }),
            "EOSE" => Ok(RelayMessage::Eose(str_at(rest, 0)?.to_string())),
            "CLOSED" => Ok(RelayMessage::Closed {
                subscription_id: str_at(rest, 0)?.to_string(),
                message: rest.get(1).and_then(Value::as_str).unwrap_or_default().to_string(),
            }),
            "NOTICE" => Ok(RelayMessage::Notice(str_at(rest, 0)?.to_string())),
            "AUTH" => Ok(RelayMessage::Auth {
                challenge: str_at(rest, 0)?.to_string(),
            }),
            other => Err(MessageError::UnknownType(other.to_string())),
        }
    }

    /// Parse a frame from the network, or `None` if it is malformed.
    pub fn parse(json: &str) -> Option<Self> {
        match Self::from_json(json) {
            Ok(msg) => Some(msg),
            Err(e) => {
                debug!(error = %e, "Dropping relay frame");
                None
            }
        }
    }
}

/// Build a NIP-42 authentication event for a relay's challenge.
pub fn auth_event(keys: &KeyPair, relay_url: &str, challenge: &str) -> Result<Event, EventError> {
    Event::create(
        keys,
        Kind::CLIENT_AUTH,
        "",
        vec![
            Tag::relay(relay_url),
            Tag::new(["challenge", challenge]),
        ],
        None,
    )
}

fn split_frame(value: &Value) -> Result<(&str, &[Value]), MessageError> {
    let arr = value
        .as_array()
        .ok_or_else(|| MessageError::Malformed("frame is not an array".into()))?;
    let name = arr
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| MessageError::Malformed("frame has no type".into()))?;
    Ok((name, &arr[1..]))
}

fn str_at(rest: &[Value], i: usize) -> Result<&str, MessageError> {
    rest.get(i)
        .and_then(Value::as_str)
        .ok_or_else(|| MessageError::Malformed(format!("expected string at position {}", i + 1)))
}

fn event_at(rest: &[Value], i: usize) -> Result<Event, MessageError> {
    let value = rest
        .get(i)
        .ok_or_else(|| MessageError::Malformed(format!("missing event at position {}", i + 1)))?;
    Ok(serde_json::from_value(value.clone()).map_err(EventError::from)?)
}
