//! NIP-04 legacy direct-message encryption.
//!
//! AES-256-CBC with PKCS#7 padding, keyed directly by the raw ECDH
//! x-coordinate with no KDF in between. Payloads are
//! `base64(ciphertext) + "?iv=" + base64(iv)`.
//!
//! Kept for wallet-connect and older clients; new messaging uses NIP-44.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use secp256k1::{SecretKey, XOnlyPublicKey};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::identity::ecdh_xonly;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_SEPARATOR: &str = "?iv=";
const IV_SIZE: usize = 16;

/// Errors from NIP-04 encryption and decryption.
#[derive(Debug, Error)]
pub enum Nip04Error {
    #[error("payload is not of the form <ciphertext>?iv=<iv>")]
    Format,

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("iv must be 16 bytes, got {0}")]
    InvalidIv(usize),

    #[error("decryption failed")]
    Decrypt,

    #[error("plaintext is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// The AES key shared by two parties: the raw ECDH x-coordinate.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey([redacted])")
    }
}

/// Derive the shared key between our secret and a peer's public key.
pub fn derive_key(secret: &SecretKey, peer: &XOnlyPublicKey) -> SharedKey {
    SharedKey(*ecdh_xonly(secret, peer))
}

/// Encrypt with a fresh random IV.
pub fn encrypt(plaintext: &str, key: &SharedKey) -> String {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    encrypt_with_iv(plaintext, key, &iv)
}

pub(crate) fn encrypt_with_iv(plaintext: &str, key: &SharedKey, iv: &[u8; IV_SIZE]) -> String {
    let ciphertext = Aes256CbcEnc::new(key.as_bytes().into(), iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    format!(
        "{}{}{}",
        BASE64.encode(ciphertext),
        IV_SEPARATOR,
        BASE64.encode(iv)
    )
}

/// Decrypt a `base64(ct)?iv=base64(iv)` payload.
pub fn decrypt(payload: &str, key: &SharedKey) -> Result<String, Nip04Error> {
    let parts: Vec<&str> = payload.split(IV_SEPARATOR).collect();
    if parts.len() != 2 {
        return Err(Nip04Error::Format);
    }

    let ciphertext = BASE64.decode(parts[0].trim())?;
    let iv = BASE64.decode(parts[1].trim())?;
    let iv: [u8; IV_SIZE] = iv
        .as_slice()
        .try_into()
        .map_err(|_| Nip04Error::InvalidIv(iv.len()))?;

    let plaintext = Aes256CbcDec::new(key.as_bytes().into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| Nip04Error::Decrypt)?;
    Ok(String::from_utf8(plaintext)?)
}

/// Encrypt for a peer in one step.
pub fn encrypt_to(secret: &SecretKey, peer: &XOnlyPublicKey, plaintext: &str) -> String {
    encrypt(plaintext, &derive_key(secret, peer))
}

/// Decrypt from a peer in one step.
pub fn decrypt_from(
    secret: &SecretKey,
    peer: &XOnlyPublicKey,
    payload: &str,
) -> Result<String, Nip04Error> {
    decrypt(payload, &derive_key(secret, peer))
}
