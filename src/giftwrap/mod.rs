//! NIP-17 private messages over NIP-59 gift wraps.
//!
//! Three nested events:
//!
//! - **rumor** (kind 14): the message itself, unsigned, carrying the real
//!   author and time
//! - **seal** (kind 13): the rumor NIP-44 encrypted to the recipient, signed
//!   by the author, no tags
//! - **gift wrap** (kind 1059): the seal NIP-44 encrypted again under a
//!   one-time key, signed by that key, tagged only with the recipient
//!
//! Seal and wrap timestamps each get independent random jitter so relays
//! cannot correlate them with the send time. The one-time key is generated
//! per wrap and dropped when `wrap` returns.
//!
//! Unwrapping is expected to fail for most wraps a client sees (they are
//! addressed to someone else), so [`unwrap`] returns `Option` and logs the
//! reason at debug; [`try_unwrap`] exposes it.

use rand::Rng;
use secp256k1::XOnlyPublicKey;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::event::{unix_now, Event, EventError, Kind, Tag};
use crate::identity::KeyPair;
use crate::nip44::{self, ConversationKey, ConversationKeyCache, Nip44Error};

/// Default timestamp jitter: two days either side of now.
pub const DEFAULT_TIMESTAMP_JITTER_SECS: i64 = 2 * 24 * 60 * 60;

/// Upper bound on configured jitter: one year either side.
pub const MAX_TIMESTAMP_JITTER_SECS: i64 = 365 * 24 * 60 * 60;

/// Errors from wrapping and unwrapping.
#[derive(Debug, Error)]
pub enum GiftWrapError {
    #[error("expected a gift wrap (kind 1059), got kind {0}")]
    NotGiftWrap(Kind),

    #[error("expected a seal (kind 13), got kind {0}")]
    NotSeal(Kind),

    #[error("expected a private message (kind 14), got kind {0}")]
    NotRumor(Kind),

    #[error("rumor author does not match seal signer")]
    Impersonation,

    #[error("encryption: {0}")]
    Encryption(#[from] Nip44Error),

    #[error("event: {0}")]
    Event(#[from] EventError),
}

/// A message recovered from a gift wrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwrappedMessage {
    /// The inner kind 14 event.
    pub rumor: Event,
    /// The seal it arrived in.
    pub seal: Event,
    /// The seal signer, which is the authenticated author.
    pub sender: XOnlyPublicKey,
}

impl UnwrappedMessage {
    pub fn content(&self) -> &str {
        self.rumor.content()
    }

    /// The author's own timestamp, without jitter.
    pub fn created_at(&self) -> i64 {
        self.rumor.created_at()
    }
}

/// Gift wrapping with configured jitter and a conversation key cache.
///
/// Only the seal layer goes through the cache; one-time wrap keys are used
/// once and never stored.
#[derive(Debug, Clone)]
pub struct GiftWrapper {
    jitter_secs: i64,
    cache: Arc<ConversationKeyCache>,
}

impl GiftWrapper {
    pub fn new(jitter_secs: i64, cache: Arc<ConversationKeyCache>) -> Self {
        Self {
            jitter_secs: jitter_secs.clamp(0, MAX_TIMESTAMP_JITTER_SECS),
            cache,
        }
    }

    pub fn jitter_secs(&self) -> i64 {
        self.jitter_secs
    }

    pub fn cache(&self) -> &ConversationKeyCache {
        &self.cache
    }

    /// Wrap `text` from `sender` to `recipient`.
    pub fn wrap(
        &self,
        sender: &KeyPair,
        recipient: &XOnlyPublicKey,
        text: &str,
        extra_tags: Vec<Tag>,
    ) -> Result<Event, GiftWrapError> {
        let rumor = create_rumor(sender.public_key(), recipient, text, extra_tags, unix_now());
        self.wrap_rumor(sender, recipient, &rumor)
    }

    /// Wrap to the recipient, plus a copy wrapped to the sender.
    ///
    /// Both wraps carry the same rumor, so the sender's other devices can
    /// show the sent message in the conversation.
    pub fn wrap_with_self_copy(
        &self,
        sender: &KeyPair,
        recipient: &XOnlyPublicKey,
        text: &str,
        extra_tags: Vec<Tag>,
    ) -> Result<(Event, Event), GiftWrapError> {
        let rumor = create_rumor(sender.public_key(), recipient, text, extra_tags, unix_now());
        let to_recipient = self.wrap_rumor(sender, recipient, &rumor)?;
        let to_self = self.wrap_rumor(sender, &sender.public_key(), &rumor)?;
        Ok((to_recipient, to_self))
    }

    /// Seal and wrap an already built rumor.
    pub fn wrap_rumor(
        &self,
        sender: &KeyPair,
        recipient: &XOnlyPublicKey,
        rumor: &Event,
    ) -> Result<Event, GiftWrapError> {
        let seal_key = self.cache.get_or_derive(&sender.secret_key(), recipient);
        let seal = create_seal(sender, &seal_key, rumor, self.jittered_now())?;
        let wrap = create_gift_wrap(&seal, recipient, self.jittered_now())?;
        debug!(
            wrap_id = %wrap.id(),
            recipient = %recipient,
            "Created gift wrap"
        );
        Ok(wrap)
    }

    /// Open a gift wrap, returning `None` if it is not for us or is broken.
    pub fn unwrap(&self, recipient: &KeyPair, gift: &Event) -> Option<UnwrappedMessage> {
        match self.try_unwrap(recipient, gift) {
            Ok(message) => Some(message),
            Err(e) => {
                debug!(wrap_id = %gift.id(), error = %e, "Cannot unwrap gift wrap");
                None
            }
        }
    }

    /// Open a gift wrap, reporting why it failed.
    pub fn try_unwrap(
        &self,
        recipient: &KeyPair,
        gift: &Event,
    ) -> Result<UnwrappedMessage, GiftWrapError> {
        if gift.kind() != Kind::GIFT_WRAP {
            return Err(GiftWrapError::NotGiftWrap(gift.kind()));
        }
        gift.verify()?;

        // The wrap pubkey is a one-time key; do not cache
        let wrap_key = ConversationKey::derive(&recipient.secret_key(), gift.pubkey());
        let seal_json = nip44::decrypt(gift.content(), &wrap_key)?;
        let seal = Event::from_json(&seal_json)?;
        if seal.kind() != Kind::SEAL {
            return Err(GiftWrapError::NotSeal(seal.kind()));
        }
        seal.verify()?;

        let seal_key = self.cache.get_or_derive(&recipient.secret_key(), seal.pubkey());
        let rumor_json = nip44::decrypt(seal.content(), &seal_key)?;
        let rumor = Event::from_json(&rumor_json)?;
        if rumor.kind() != Kind::PRIVATE_DIRECT_MESSAGE {
            return Err(GiftWrapError::NotRumor(rumor.kind()));
        }
        if rumor.pubkey() != seal.pubkey() {
            return Err(GiftWrapError::Impersonation);
        }
        rumor.verify_id()?;

        let sender = *seal.pubkey();
        Ok(UnwrappedMessage {
            rumor,
            seal,
            sender,
        })
    }

    fn jittered_now(&self) -> i64 {
        jittered(unix_now(), self.jitter_secs)
    }
}

impl Default for GiftWrapper {
    fn default() -> Self {
        Self::new(
            DEFAULT_TIMESTAMP_JITTER_SECS,
            Arc::new(ConversationKeyCache::default()),
        )
    }
}

/// Build the kind 14 rumor: unsigned, `p`-tagged with the recipient.
pub fn create_rumor(
    sender: XOnlyPublicKey,
    recipient: &XOnlyPublicKey,
    text: &str,
    extra_tags: Vec<Tag>,
    created_at: i64,
) -> Event {
    let mut tags = Vec::with_capacity(1 + extra_tags.len());
    tags.push(Tag::pubkey(recipient));
    tags.extend(extra_tags);
    Event::new_unsigned(sender, Kind::PRIVATE_DIRECT_MESSAGE, text, tags, created_at)
}

/// Encrypt a rumor into a kind 13 seal signed by the sender.
pub fn create_seal(
    sender: &KeyPair,
    conversation_key: &ConversationKey,
    rumor: &Event,
    created_at: i64,
) -> Result<Event, GiftWrapError> {
    let content = nip44::encrypt(&rumor.to_json(), conversation_key)?;
    Ok(Event::create(
        sender,
        Kind::SEAL,
        content,
        Vec::new(),
        Some(created_at),
    )?)
}

/// Encrypt a seal into a kind 1059 gift wrap under a fresh one-time key.
pub fn create_gift_wrap(
    seal: &Event,
    recipient: &XOnlyPublicKey,
    created_at: i64,
) -> Result<Event, GiftWrapError> {
    let one_time = KeyPair::generate();
    let wrap_key = ConversationKey::derive(&one_time.secret_key(), recipient);
    let content = nip44::encrypt(&seal.to_json(), &wrap_key)?;
    Ok(Event::create(
        &one_time,
        Kind::GIFT_WRAP,
        content,
        vec![Tag::pubkey(recipient)],
        Some(created_at),
    )?)
}

/// Wrap with default jitter and no shared cache.
pub fn wrap(
    sender: &KeyPair,
    recipient: &XOnlyPublicKey,
    text: &str,
    extra_tags: Vec<Tag>,
) -> Result<Event, GiftWrapError> {
    GiftWrapper::new(
        DEFAULT_TIMESTAMP_JITTER_SECS,
        Arc::new(ConversationKeyCache::new(0)),
    )
    .wrap(sender, recipient, text, extra_tags)
}

/// Unwrap without a shared cache. See [`GiftWrapper::unwrap`].
pub fn unwrap(recipient: &KeyPair, gift: &Event) -> Option<UnwrappedMessage> {
    GiftWrapper::new(0, Arc::new(ConversationKeyCache::new(0))).unwrap(recipient, gift)
}

/// Unwrap without a shared cache. See [`GiftWrapper::try_unwrap`].
pub fn try_unwrap(recipient: &KeyPair, gift: &Event) -> Result<UnwrappedMessage, GiftWrapError> {
    GiftWrapper::new(0, Arc::new(ConversationKeyCache::new(0))).try_unwrap(recipient, gift)
}

/// `now` shifted by a uniform offset in `[-jitter, +jitter]`, saturating at
/// the ends of the `i64` range.
pub(crate) fn jittered(now: i64, jitter_secs: i64) -> i64 {
    let jitter_secs = jitter_secs.min(MAX_TIMESTAMP_JITTER_SECS);
    if jitter_secs <= 0 {
        return now;
    }
    now.saturating_add(rand::thread_rng().gen_range(-jitter_secs..=jitter_secs))
}
