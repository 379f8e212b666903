//! NIP-57 zaps.
//!
//! A zap request (kind 9734) is signed by the payer and handed to the
//! recipient's LNURL server, never published. Once the invoice is paid the
//! server publishes a zap receipt (kind 9735) carrying the invoice in a
//! `bolt11` tag and the original request JSON in a `description` tag.

use secp256k1::XOnlyPublicKey;
use thiserror::Error;

use crate::bolt11::{self, Bolt11Error, Invoice};
use crate::event::{Event, EventError, EventId, Kind, Tag};
use crate::identity::{self, KeyPair};

/// Errors from reading zap receipts.
#[derive(Debug, Error)]
pub enum ZapError {
    #[error("expected kind {expected}, got {got}")]
    UnexpectedKind { expected: Kind, got: Kind },

    #[error("receipt is missing the '{0}' tag")]
    MissingTag(&'static str),

    #[error("invoice: {0}")]
    Invoice(#[from] Bolt11Error),

    #[error("event: {0}")]
    Event(#[from] EventError),

    #[error("invoice description hash does not commit to the zap request")]
    DescriptionHashMismatch,

    #[error("invoice amount {invoice:?} msats differs from requested {requested} msats")]
    AmountMismatch { invoice: Option<u64>, requested: u64 },
}

/// Build a kind 9734 zap request.
///
/// `comment` becomes the content. `event` zaps a specific note rather than
/// just the profile.
pub fn zap_request(
    keys: &KeyPair,
    recipient: &XOnlyPublicKey,
    amount_msats: u64,
    relays: &[String],
    event: Option<&EventId>,
    comment: &str,
) -> Result<Event, EventError> {
    let mut relay_tag = Vec::with_capacity(relays.len() + 1);
    relay_tag.push("relays".to_string());
    relay_tag.extend(relays.iter().cloned());

    let mut tags = vec![
        Tag::new(relay_tag),
        Tag::new(["amount".to_string(), amount_msats.to_string()]),
        Tag::pubkey(recipient),
    ];
    if let Some(id) = event {
        tags.push(Tag::event(id));
    }
    Event::create(keys, Kind::ZAP_REQUEST, comment, tags, None)
}

/// A checked zap receipt.
#[derive(Debug, Clone)]
pub struct ZapReceipt {
    /// The kind 9735 event itself.
    pub receipt: Event,
    /// The payer's kind 9734 request.
    pub request: Event,
    pub invoice: Invoice,
    pub recipient: Option<XOnlyPublicKey>,
    pub zapped_event: Option<EventId>,
    pub preimage: Option<String>,
}

impl ZapReceipt {
    /// Parse and check a receipt.
    ///
    /// The embedded request must be a validly signed kind 9734. If the
    /// invoice carries a description hash it must be the SHA-256 of the
    /// request JSON, and if the request names an amount the invoice must
    /// be for exactly that amount. The receipt's own signature is checked;
    /// whether its signer is the recipient's LNURL server is up to the caller.
    pub fn from_event(receipt: &Event) -> Result<Self, ZapError> {
        if receipt.kind() != Kind::ZAP_RECEIPT {
            return Err(ZapError::UnexpectedKind {
                expected: Kind::ZAP_RECEIPT,
                got: receipt.kind(),
            });
        }
        receipt.verify()?;

        let bolt11 = receipt
            .first_tag_value("bolt11")
            .ok_or(ZapError::MissingTag("bolt11"))?;
        let invoice = bolt11::parse(bolt11)?;

        let description = receipt
            .first_tag_value("description")
            .ok_or(ZapError::MissingTag("description"))?;
        if let Some(hash) = invoice.description_hash {
            if identity::sha256(description.as_bytes()) != hash {
                return Err(ZapError::DescriptionHashMismatch);
            }
        }

        let request = Event::from_json(description)?;
        if request.kind() != Kind::ZAP_REQUEST {
            return Err(ZapError::UnexpectedKind {
                expected: Kind::ZAP_REQUEST,
                got: request.kind(),
            });
        }
        request.verify()?;

        if let Some(requested) = request
            .first_tag_value("amount")
            .and_then(|a| a.parse::<u64>().ok())
        {
            if invoice.amount_msats != Some(requested) {
                return Err(ZapError::AmountMismatch {
                    invoice: invoice.amount_msats,
                    requested,
                });
            }
        }

        let recipient = receipt
            .first_tag_value("p")
            .and_then(|p| identity::decode_public(p).ok());
        let zapped_event = receipt
            .first_tag_value("e")
            .and_then(|e| EventId::from_hex(e).ok());
        let preimage = receipt.first_tag_value("preimage").map(str::to_string);

        Ok(Self {
            receipt: receipt.clone(),
            request,
            invoice,
            recipient,
            zapped_event,
            preimage,
        })
    }

    /// The payer, as signed in the request.
    pub fn sender(&self) -> &XOnlyPublicKey {
        self.request.pubkey()
    }

    pub fn amount_msats(&self) -> Option<u64> {
        self.invoice.amount_msats
    }

    pub fn comment(&self) -> &str {
        self.request.content()
    }
}
