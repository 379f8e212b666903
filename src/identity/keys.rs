//! A signing keypair for Nostr events.

use rand::RngCore;
use secp256k1::schnorr::Signature;
use secp256k1::{Keypair, PublicKey, Secp256k1, SecretKey, XOnlyPublicKey};
use std::fmt;
use std::hash::{Hash, Hasher};
use zeroize::Zeroizing;

use super::encoding::{decode_secret, encode_npub, encode_nsec};
use super::{ecdh_xonly, IdentityError, DIGEST_SIZE};

/// A secp256k1 keypair.
///
/// Equality and hashing look at the public key only. The secret half is
/// erased when the value is dropped and never appears in `Debug` output.
pub struct KeyPair {
    keypair: Keypair,
}

impl KeyPair {
    /// Create a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = Zeroizing::new([0u8; 32]);
        // A uniformly random 32-byte string is outside [1, n) with
        // probability about 2^-128; draw again in that case.
        loop {
            rng.fill_bytes(&mut bytes[..]);
            if let Ok(secret_key) = SecretKey::from_slice(&bytes[..]) {
                return Self::from_secret_key(secret_key);
            }
        }
    }

    /// Create a keypair from a secret key.
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &secret_key);
        Self { keypair }
    }

    /// Create a keypair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        if bytes.len() != 32 {
            return Err(IdentityError::InvalidInput {
                expected: 32,
                got: bytes.len(),
            });
        }
        let secret_key = SecretKey::from_slice(bytes)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Create a keypair from an nsec string or 64-char hex secret.
    pub fn from_secret_str(s: &str) -> Result<Self, IdentityError> {
        let secret_key = decode_secret(s)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Return the x-only public key.
    pub fn public_key(&self) -> XOnlyPublicKey {
        self.keypair.x_only_public_key().0
    }

    /// Return the full public key (includes parity).
    pub fn public_key_full(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Return the x-only public key as lowercase hex.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key().serialize())
    }

    /// Return the public key as a bech32 npub string.
    pub fn npub(&self) -> String {
        encode_npub(&self.public_key())
    }

    /// Return the secret key as a bech32 nsec string.
    pub fn nsec(&self) -> String {
        encode_nsec(&self.secret_key())
    }

    /// Return the secret key.
    pub fn secret_key(&self) -> SecretKey {
        self.keypair.secret_key()
    }

    /// Return the raw secret key bytes.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.keypair.secret_bytes())
    }

    /// Sign a 32-byte digest with BIP-340 Schnorr.
    pub fn sign(&self, digest: &[u8]) -> Result<Signature, IdentityError> {
        if digest.len() != DIGEST_SIZE {
            return Err(IdentityError::InvalidInput {
                expected: DIGEST_SIZE,
                got: digest.len(),
            });
        }
        let secp = Secp256k1::new();
        Ok(secp.sign_schnorr(digest, &self.keypair))
    }

    /// Raw ECDH x-coordinate shared with an x-only peer key.
    pub fn shared_x(&self, peer: &XOnlyPublicKey) -> Zeroizing<[u8; 32]> {
        let mut secret_key = self.keypair.secret_key();
        let out = ecdh_xonly(&secret_key, peer);
        secret_key.non_secure_erase();
        out
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self {
            keypair: self.keypair,
        }
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.keypair.non_secure_erase();
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for KeyPair {}

impl Hash for KeyPair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.public_key().hash(state);
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}
