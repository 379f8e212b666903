//! NIP-19 bech32 identifiers.
//!
//! Bare forms carry 32 raw bytes (`npub`, `nsec`, `note`). Shareable forms
//! (`nprofile`, `nevent`, `naddr`) carry TLV records:
//!
//! | type | meaning | value |
//! |------|---------|-------|
//! | 0 | special | 32-byte pubkey or event id; identifier string for `naddr` |
//! | 1 | relay | UTF-8 URL, repeatable |
//! | 2 | author | 32-byte pubkey |
//! | 3 | kind | u32 big-endian |
//!
//! Unknown TLV types are ignored on decode. A `nostr:` URI prefix is
//! accepted and stripped.

use secp256k1::{SecretKey, XOnlyPublicKey};
use thiserror::Error;

use crate::encoding::{self, parse_tlv, Bech32Error, TlvError, TlvRecord, TlvWriter};
use crate::event::EventId;

const HRP_NPUB: &str = "npub";
const HRP_NSEC: &str = "nsec";
const HRP_NOTE: &str = "note";
const HRP_NPROFILE: &str = "nprofile";
const HRP_NEVENT: &str = "nevent";
const HRP_NADDR: &str = "naddr";

const TLV_SPECIAL: u8 = 0;
const TLV_RELAY: u8 = 1;
const TLV_AUTHOR: u8 = 2;
const TLV_KIND: u8 = 3;

const URI_SCHEME: &str = "nostr:";

/// Errors from NIP-19 encoding and decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Nip19Error {
    #[error("bech32: {0}")]
    Bech32(#[from] Bech32Error),

    #[error("unknown identifier prefix: {0}")]
    UnknownPrefix(String),

    #[error("{prefix}: expected 32 bytes, got {got}")]
    InvalidLength { prefix: &'static str, got: usize },

    #[error("{prefix}: missing TLV type {tlv}")]
    MissingField { prefix: &'static str, tlv: u8 },

    #[error("{prefix}: malformed TLV type {tlv}")]
    InvalidField { prefix: &'static str, tlv: u8 },

    #[error("invalid key: {0}")]
    Key(#[from] secp256k1::Error),

    #[error("tlv: {0}")]
    Tlv(#[from] TlvError),
}

/// A profile reference with relay hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePointer {
    pub pubkey: XOnlyPublicKey,
    pub relays: Vec<String>,
}

/// An event reference with optional relay hints, author and kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPointer {
    pub id: EventId,
    pub relays: Vec<String>,
    pub author: Option<XOnlyPublicKey>,
    pub kind: Option<u32>,
}

/// A parameterized replaceable event coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPointer {
    /// The `d` tag value; may be empty.
    pub identifier: String,
    pub pubkey: XOnlyPublicKey,
    pub kind: u32,
    pub relays: Vec<String>,
}

/// Anything a NIP-19 string can name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nip19Entity {
    Pubkey(XOnlyPublicKey),
    Secret(SecretKey),
    Note(EventId),
    Profile(ProfilePointer),
    Event(EventPointer),
    Address(AddressPointer),
}

impl Nip19Entity {
    /// The bech32 prefix this entity encodes under.
    pub fn prefix(&self) -> &'static str {
        match self {
            Nip19Entity::Pubkey(_) => HRP_NPUB,
            Nip19Entity::Secret(_) => HRP_NSEC,
            Nip19Entity::Note(_) => HRP_NOTE,
            Nip19Entity::Profile(_) => HRP_NPROFILE,
            Nip19Entity::Event(_) => HRP_NEVENT,
            Nip19Entity::Address(_) => HRP_NADDR,
        }
    }
}

/// Encode an entity.
///
/// Fails only when a TLV value is longer than 255 bytes (an overlong relay
/// URL or identifier). Relay hints are never truncated or skipped, so drop
/// hints over 255 bytes before encoding.
pub fn encode(entity: &Nip19Entity) -> Result<String, Nip19Error> {
    let hrp = entity.prefix();
    let payload = match entity {
        Nip19Entity::Pubkey(pk) => pk.serialize().to_vec(),
        Nip19Entity::Secret(sk) => {
            let mut bytes = sk.secret_bytes();
            let out = encoding::encode(hrp, &bytes);
            encoding::wipe(&mut bytes);
            return Ok(out?);
        }
        Nip19Entity::Note(id) => id.as_bytes().to_vec(),
        Nip19Entity::Profile(p) => {
            let mut w = TlvWriter::new();
            w.add(TLV_SPECIAL, &p.pubkey.serialize())?;
            add_relays(&mut w, &p.relays)?;
            w.into_bytes()
        }
        Nip19Entity::Event(e) => {
            let mut w = TlvWriter::new();
            w.add(TLV_SPECIAL, e.id.as_bytes())?;
            add_relays(&mut w, &e.relays)?;
            if let Some(author) = &e.author {
                w.add(TLV_AUTHOR, &author.serialize())?;
            }
            if let Some(kind) = e.kind {
                w.add(TLV_KIND, &kind.to_be_bytes())?;
            }
            w.into_bytes()
        }
        Nip19Entity::Address(a) => {
            let mut w = TlvWriter::new();
            w.add(TLV_SPECIAL, a.identifier.as_bytes())?;
            add_relays(&mut w, &a.relays)?;
            w.add(TLV_AUTHOR, &a.pubkey.serialize())?;
            w.add(TLV_KIND, &a.kind.to_be_bytes())?;
            w.into_bytes()
        }
    };
    Ok(encoding::encode(hrp, &payload)?)
}

/// Decode any NIP-19 string.
pub fn decode(s: &str) -> Result<Nip19Entity, Nip19Error> {
    let s = s.trim();
    let s = match s.get(..URI_SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(URI_SCHEME) => &s[URI_SCHEME.len()..],
        _ => s,
    };
    let (hrp, mut data) = encoding::decode(s)?;

    let entity = match hrp.as_str() {
        HRP_NPUB => Nip19Entity::Pubkey(XOnlyPublicKey::from_slice(&fixed32(HRP_NPUB, &data)?)?),
        HRP_NSEC => {
            let secret = fixed32(HRP_NSEC, &data).and_then(|mut bytes| {
                let sk = SecretKey::from_slice(&bytes);
                encoding::wipe(&mut bytes);
                Ok(sk?)
            });
            encoding::wipe(&mut data);
            Nip19Entity::Secret(secret?)
        }
        HRP_NOTE => Nip19Entity::Note(EventId::from_bytes(fixed32(HRP_NOTE, &data)?)),
        HRP_NPROFILE => decode_profile(&parse_tlv(&data))?,
        HRP_NEVENT => decode_event(&parse_tlv(&data))?,
        HRP_NADDR => decode_address(&parse_tlv(&data))?,
        _ => return Err(Nip19Error::UnknownPrefix(hrp)),
    };
    Ok(entity)
}

fn decode_profile(records: &[TlvRecord]) -> Result<Nip19Entity, Nip19Error> {
    let special = required(HRP_NPROFILE, records, TLV_SPECIAL)?;
    let pubkey = pubkey_field(HRP_NPROFILE, TLV_SPECIAL, special)?;
    Ok(Nip19Entity::Profile(ProfilePointer {
        pubkey,
        relays: relays(records),
    }))
}

fn decode_event(records: &[TlvRecord]) -> Result<Nip19Entity, Nip19Error> {
    let special = required(HRP_NEVENT, records, TLV_SPECIAL)?;
    let id = special
        .try_into()
        .map(EventId::from_bytes)
        .map_err(|_| Nip19Error::InvalidField {
            prefix: HRP_NEVENT,
            tlv: TLV_SPECIAL,
        })?;
    let author = first(records, TLV_AUTHOR)
        .map(|v| pubkey_field(HRP_NEVENT, TLV_AUTHOR, v))
        .transpose()?;
    let kind = first(records, TLV_KIND)
        .map(|v| kind_field(HRP_NEVENT, v))
        .transpose()?;
    Ok(Nip19Entity::Event(EventPointer {
        id,
        relays: relays(records),
        author,
        kind,
    }))
}

fn decode_address(records: &[TlvRecord]) -> Result<Nip19Entity, Nip19Error> {
    let identifier = String::from_utf8(required(HRP_NADDR, records, TLV_SPECIAL)?.to_vec())
        .map_err(|_| Nip19Error::InvalidField {
            prefix: HRP_NADDR,
            tlv: TLV_SPECIAL,
        })?;
    let pubkey = pubkey_field(HRP_NADDR, TLV_AUTHOR, required(HRP_NADDR, records, TLV_AUTHOR)?)?;
    let kind = kind_field(HRP_NADDR, required(HRP_NADDR, records, TLV_KIND)?)?;
    Ok(Nip19Entity::Address(AddressPointer {
        identifier,
        pubkey,
        kind,
        relays: relays(records),
    }))
}

fn add_relays(w: &mut TlvWriter, relays: &[String]) -> Result<(), TlvError> {
    for relay in relays {
        w.add(TLV_RELAY, relay.as_bytes())?;
    }
    Ok(())
}

fn first(records: &[TlvRecord], tlv: u8) -> Option<&[u8]> {
    records
        .iter()
        .find(|r| r.tag == tlv)
        .map(|r| r.value.as_slice())
}

fn required<'a>(
    prefix: &'static str,
    records: &'a [TlvRecord],
    tlv: u8,
) -> Result<&'a [u8], Nip19Error> {
    first(records, tlv).ok_or(Nip19Error::MissingField { prefix, tlv })
}

/// Relay hints in order; entries that are not UTF-8 are dropped.
fn relays(records: &[TlvRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.tag == TLV_RELAY)
        .filter_map(|r| String::from_utf8(r.value.clone()).ok())
        .collect()
}

fn pubkey_field(prefix: &'static str, tlv: u8, value: &[u8]) -> Result<XOnlyPublicKey, Nip19Error> {
    if value.len() != 32 {
        return Err(Nip19Error::InvalidField { prefix, tlv });
    }
    XOnlyPublicKey::from_slice(value).map_err(|_| Nip19Error::InvalidField { prefix, tlv })
}

fn kind_field(prefix: &'static str, value: &[u8]) -> Result<u32, Nip19Error> {
    let bytes: [u8; 4] = value.try_into().map_err(|_| Nip19Error::InvalidField {
        prefix,
        tlv: TLV_KIND,
    })?;
    Ok(u32::from_be_bytes(bytes))
}

fn fixed32(prefix: &'static str, data: &[u8]) -> Result<[u8; 32], Nip19Error> {
    data.try_into().map_err(|_| Nip19Error::InvalidLength {
        prefix,
        got: data.len(),
    })
}
