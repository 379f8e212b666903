//! Key Management
//!
//! secp256k1 keypairs as used by Nostr: x-only public keys, BIP-340 Schnorr
//! signatures over 32-byte digests, and the raw-x ECDH the encryption schemes
//! build on.
//!
//! ECDH here returns the unhashed x-coordinate of `secret * peer`. The stock
//! `secp256k1::ecdh::SharedSecret` hashes the point with SHA-256 and would
//! produce keys no other Nostr client agrees with.

mod encoding;
mod keys;

use secp256k1::ecdh::shared_secret_point;
use secp256k1::schnorr::Signature;
use secp256k1::{Parity, PublicKey, Secp256k1, SecretKey, XOnlyPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

pub use encoding::{decode_npub, decode_nsec, decode_public, decode_secret, encode_npub, encode_nsec};
pub use keys::KeyPair;

/// Size of a Schnorr signature digest.
pub const DIGEST_SIZE: usize = 32;

/// Size of a compressed secp256k1 public key.
pub const COMPRESSED_PUBKEY_SIZE: usize = 33;

/// Errors that can occur in key operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid key material: {0}")]
    InvalidSecretKey(#[from] secp256k1::Error),

    #[error("invalid input: expected {expected} bytes, got {got}")]
    InvalidInput { expected: usize, got: usize },

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("bech32 error: {0}")]
    Bech32(#[from] crate::encoding::Bech32Error),

    #[error("invalid npub: expected 'npub' prefix, got '{0}'")]
    InvalidNpubPrefix(String),

    #[error("invalid npub: expected 32 bytes, got {0}")]
    InvalidNpubLength(usize),

    #[error("invalid nsec: expected 'nsec' prefix, got '{0}'")]
    InvalidNsecPrefix(String),

    #[error("invalid nsec: expected 32 bytes, got {0}")]
    InvalidNsecLength(usize),

    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Raw ECDH: the x-coordinate of `secret * peer`, not hashed.
pub fn ecdh_raw(secret: &SecretKey, peer: &PublicKey) -> Zeroizing<[u8; 32]> {
    let mut point = shared_secret_point(peer, secret);
    let mut x = Zeroizing::new([0u8; 32]);
    x.copy_from_slice(&point[..32]);
    point.zeroize();
    x
}

/// Raw ECDH against a 33-byte compressed public key.
pub fn ecdh_compressed(secret: &SecretKey, peer: &[u8]) -> Result<Zeroizing<[u8; 32]>, IdentityError> {
    if peer.len() != COMPRESSED_PUBKEY_SIZE {
        return Err(IdentityError::InvalidInput {
            expected: COMPRESSED_PUBKEY_SIZE,
            got: peer.len(),
        });
    }
    let peer = PublicKey::from_slice(peer)?;
    Ok(ecdh_raw(secret, &peer))
}

/// Raw ECDH against an x-only public key.
///
/// The key is lifted with even parity. `P` and `-P` give products with the
/// same x-coordinate, so the parity choice does not change the result.
pub fn ecdh_xonly(secret: &SecretKey, peer: &XOnlyPublicKey) -> Zeroizing<[u8; 32]> {
    ecdh_raw(secret, &peer.public_key(Parity::Even))
}

/// Verify a Schnorr signature over a 32-byte digest.
pub fn verify_digest(
    pubkey: &XOnlyPublicKey,
    digest: &[u8],
    signature: &Signature,
) -> Result<(), IdentityError> {
    if digest.len() != DIGEST_SIZE {
        return Err(IdentityError::InvalidInput {
            expected: DIGEST_SIZE,
            got: digest.len(),
        });
    }
    let secp = Secp256k1::verification_only();
    secp.verify_schnorr(signature, digest, pubkey)
        .map_err(|_| IdentityError::SignatureVerificationFailed)
}

/// Compute SHA-256 hash of data.
pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests;
