//! NIP-44 v2 payload encryption.
//!
//! ```text
//! conversation_key = HKDF-Extract(salt = "nip44-v2", ikm = ecdh_x)
//! chacha_key || chacha_nonce || hmac_key = HKDF-Expand(conversation_key, info = nonce, 76)
//! payload = base64(0x02 || nonce || ChaCha20(pad(plaintext)) || HMAC-SHA256(hmac_key, nonce || ciphertext))
//! ```
//!
//! The conversation key is symmetric between the two parties and can be
//! cached (see [`ConversationKeyCache`]). Message keys are fresh for every
//! payload because every payload carries a fresh random nonce.

mod cache;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use secp256k1::{SecretKey, XOnlyPublicKey};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::encoding::constant_time_eq;
use crate::identity::ecdh_xonly;

pub use cache::{CacheStats, ConversationKeyCache, DEFAULT_CONVERSATION_KEY_CACHE_SIZE};

type HmacSha256 = Hmac<Sha256>;

/// Payload version byte.
pub const VERSION: u8 = 0x02;

/// HKDF salt for the conversation key.
const SALT: &[u8] = b"nip44-v2";

pub const NONCE_SIZE: usize = 32;
pub const MAC_SIZE: usize = 32;

/// Plaintext length bounds, in bytes.
pub const MIN_PLAINTEXT_SIZE: usize = 1;
pub const MAX_PLAINTEXT_SIZE: usize = 65535;

/// Smallest decoded payload: version, nonce, 2-byte length, 32 bytes of
/// padded plaintext, MAC.
pub const MIN_PAYLOAD_SIZE: usize = 1 + NONCE_SIZE + 2 + 32 + MAC_SIZE;

/// Largest decoded payload. A 65535-byte plaintext pads to 65536 bytes.
pub const MAX_PAYLOAD_SIZE: usize = 1 + NONCE_SIZE + 2 + MAX_PADDED_SIZE + MAC_SIZE;

/// `calc_padded_len(MAX_PLAINTEXT_SIZE)`.
const MAX_PADDED_SIZE: usize = 65536;

/// Errors from NIP-44 encryption and decryption.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Nip44Error {
    #[error("plaintext must be 1..=65535 bytes, got {0}")]
    Range(usize),

    #[error("payload too short: {0} bytes")]
    ShortPayload(usize),

    #[error("payload too long: {0} bytes")]
    LongPayload(usize),

    #[error("unknown encryption version {0:#04x}")]
    Version(u8),

    #[error("unsupported payload encoding")]
    UnsupportedEncoding,

    #[error("invalid base64: {0}")]
    Base64(String),

    #[error("invalid MAC")]
    Mac,

    #[error("invalid padding")]
    Padding,

    #[error("plaintext is not valid UTF-8")]
    Utf8,
}

/// Long-term key shared by two parties.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ConversationKey([u8; 32]);

impl ConversationKey {
    /// Derive from our secret and the peer's public key.
    pub fn derive(secret: &SecretKey, peer: &XOnlyPublicKey) -> Self {
        let shared_x = ecdh_xonly(secret, peer);
        Self::from_shared_x(&shared_x)
    }

    /// Derive from a raw ECDH x-coordinate.
    pub fn from_shared_x(shared_x: &[u8; 32]) -> Self {
        let (prk, _) = Hkdf::<Sha256>::extract(Some(SALT), shared_x);
        let mut key = [0u8; 32];
        key.copy_from_slice(&prk);
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl PartialEq for ConversationKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for ConversationKey {}

impl fmt::Debug for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConversationKey([redacted])")
    }
}

/// Per-message keys expanded from the conversation key and a nonce.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MessageKeys {
    chacha_key: [u8; 32],
    chacha_nonce: [u8; 12],
    hmac_key: [u8; 32],
}

impl MessageKeys {
    pub fn derive(conversation_key: &ConversationKey, nonce: &[u8; NONCE_SIZE]) -> Self {
        // A 32-byte PRK is always long enough for SHA-256
        let hk = Hkdf::<Sha256>::from_prk(conversation_key.as_bytes())
            .expect("32-byte PRK is valid for HKDF-SHA256");
        let mut okm = Zeroizing::new([0u8; 76]);
        hk.expand(nonce, &mut okm[..])
            .expect("76 bytes is a valid HKDF-SHA256 output length");

        let mut keys = Self {
            chacha_key: [0u8; 32],
            chacha_nonce: [0u8; 12],
            hmac_key: [0u8; 32],
        };
        keys.chacha_key.copy_from_slice(&okm[0..32]);
        keys.chacha_nonce.copy_from_slice(&okm[32..44]);
        keys.hmac_key.copy_from_slice(&okm[44..76]);
        keys
    }

    pub fn chacha_key(&self) -> &[u8; 32] {
        &self.chacha_key
    }

    pub fn chacha_nonce(&self) -> &[u8; 12] {
        &self.chacha_nonce
    }

    pub fn hmac_key(&self) -> &[u8; 32] {
        &self.hmac_key
    }

    fn apply_keystream(&self, buf: &mut [u8]) {
        let mut cipher = ChaCha20::new(&self.chacha_key.into(), &self.chacha_nonce.into());
        cipher.apply_keystream(buf);
    }

    fn mac(&self, nonce: &[u8], ciphertext: &[u8]) -> [u8; MAC_SIZE] {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.hmac_key)
            .expect("HMAC accepts keys of any length");
        mac.update(nonce);
        mac.update(ciphertext);
        mac.finalize().into_bytes().into()
    }
}

/// Padded length for a plaintext of `len` bytes.
///
/// Up to 32 bytes pads to 32. Beyond that the plaintext rounds up to a
/// multiple of a chunk: 32 bytes while the next power of two is at most 256,
/// one eighth of that power above it.
pub fn calc_padded_len(len: usize) -> usize {
    if len <= 32 {
        return 32;
    }
    let next_power = 1usize << (usize::BITS - (len - 1).leading_zeros());
    let chunk = if next_power <= 256 { 32 } else { next_power / 8 };
    chunk * ((len - 1) / chunk + 1)
}

/// Length-prefix and zero-pad a plaintext.
pub fn pad(plaintext: &[u8]) -> Result<Vec<u8>, Nip44Error> {
    let len = plaintext.len();
    if !(MIN_PLAINTEXT_SIZE..=MAX_PLAINTEXT_SIZE).contains(&len) {
        return Err(Nip44Error::Range(len));
    }
    let mut padded = Vec::with_capacity(2 + calc_padded_len(len));
    padded.extend_from_slice(&(len as u16).to_be_bytes());
    padded.extend_from_slice(plaintext);
    padded.resize(2 + calc_padded_len(len), 0);
    Ok(padded)
}

/// Strip the length prefix and padding.
///
/// The buffer size must be exactly what [`pad`] produces for the declared
/// length, and the fill bytes must be zero.
pub fn unpad(padded: &[u8]) -> Result<&[u8], Nip44Error> {
    if padded.len() < 2 {
        return Err(Nip44Error::Padding);
    }
    let len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    if len < MIN_PLAINTEXT_SIZE || padded.len() != 2 + calc_padded_len(len) {
        return Err(Nip44Error::Padding);
    }
    let (plaintext, fill) = padded[2..].split_at(len);
    if fill.iter().any(|&b| b != 0) {
        return Err(Nip44Error::Padding);
    }
    Ok(plaintext)
}

/// Encrypt with a fresh random nonce.
pub fn encrypt(plaintext: &str, conversation_key: &ConversationKey) -> Result<String, Nip44Error> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    encrypt_with_nonce(plaintext, conversation_key, &nonce)
}

/// Encrypt with a caller-chosen nonce.
///
/// Reusing a nonce under the same conversation key reuses the keystream.
/// Outside of reproducing reference vectors, call [`encrypt`].
pub fn encrypt_with_nonce(
    plaintext: &str,
    conversation_key: &ConversationKey,
    nonce: &[u8; NONCE_SIZE],
) -> Result<String, Nip44Error> {
    let mut buf = Zeroizing::new(pad(plaintext.as_bytes())?);
    let keys = MessageKeys::derive(conversation_key, nonce);
    keys.apply_keystream(&mut buf);
    let mac = keys.mac(nonce, &buf);

    let mut payload = Vec::with_capacity(1 + NONCE_SIZE + buf.len() + MAC_SIZE);
    payload.push(VERSION);
    payload.extend_from_slice(nonce);
    payload.extend_from_slice(&buf);
    payload.extend_from_slice(&mac);
    Ok(BASE64.encode(payload))
}

/// Decrypt a base64 payload.
///
/// The MAC is checked in constant time before the ciphertext is touched.
pub fn decrypt(payload: &str, conversation_key: &ConversationKey) -> Result<String, Nip44Error> {
    // '#' marks a non-base64 encoding reserved for future versions
    if payload.starts_with('#') {
        return Err(Nip44Error::UnsupportedEncoding);
    }
    let data = BASE64
        .decode(payload)
        .map_err(|e| Nip44Error::Base64(e.to_string()))?;
    if data.len() < MIN_PAYLOAD_SIZE {
        return Err(Nip44Error::ShortPayload(data.len()));
    }
    if data.len() > MAX_PAYLOAD_SIZE {
        return Err(Nip44Error::LongPayload(data.len()));
    }
    if data[0] != VERSION {
        return Err(Nip44Error::Version(data[0]));
    }

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&data[1..1 + NONCE_SIZE]);
    let mac_start = data.len() - MAC_SIZE;
    let ciphertext = &data[1 + NONCE_SIZE..mac_start];
    let mac = &data[mac_start..];

    let keys = MessageKeys::derive(conversation_key, &nonce);
    let expected = keys.mac(&nonce, ciphertext);
    if !constant_time_eq(&expected, mac) {
        return Err(Nip44Error::Mac);
    }

    let mut buf = Zeroizing::new(ciphertext.to_vec());
    keys.apply_keystream(&mut buf);
    let plaintext = unpad(&buf)?;
    String::from_utf8(plaintext.to_vec()).map_err(|_| Nip44Error::Utf8)
}

/// Encrypt for a peer in one step.
pub fn encrypt_to(
    secret: &SecretKey,
    peer: &XOnlyPublicKey,
    plaintext: &str,
) -> Result<String, Nip44Error> {
    encrypt(plaintext, &ConversationKey::derive(secret, peer))
}

/// Decrypt from a peer in one step.
pub fn decrypt_from(
    secret: &SecretKey,
    peer: &XOnlyPublicKey,
    payload: &str,
) -> Result<String, Nip44Error> {
    decrypt(payload, &ConversationKey::derive(secret, peer))
}
