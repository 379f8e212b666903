//! npub / nsec text forms for keys.

use secp256k1::{SecretKey, XOnlyPublicKey};

use super::IdentityError;
use crate::encoding;

const NPUB_HRP: &str = "npub";
const NSEC_HRP: &str = "nsec";

/// Encode an x-only public key as a bech32 npub string.
pub fn encode_npub(pubkey: &XOnlyPublicKey) -> String {
    encoding::encode(NPUB_HRP, &pubkey.serialize()).expect("npub encoding cannot fail")
}

/// Decode an npub string to an x-only public key.
pub fn decode_npub(npub: &str) -> Result<XOnlyPublicKey, IdentityError> {
    let (hrp, data) = encoding::decode(npub)?;

    if hrp != NPUB_HRP {
        return Err(IdentityError::InvalidNpubPrefix(hrp));
    }
    if data.len() != 32 {
        return Err(IdentityError::InvalidNpubLength(data.len()));
    }

    Ok(XOnlyPublicKey::from_slice(&data)?)
}

/// Encode a secret key as a bech32 nsec string.
pub fn encode_nsec(secret_key: &SecretKey) -> String {
    let mut bytes = secret_key.secret_bytes();
    let out = encoding::encode(NSEC_HRP, &bytes).expect("nsec encoding cannot fail");
    encoding::wipe(&mut bytes);
    out
}

/// Decode an nsec string to a secret key.
pub fn decode_nsec(nsec: &str) -> Result<SecretKey, IdentityError> {
    let (hrp, mut data) = encoding::decode(nsec)?;

    if hrp != NSEC_HRP {
        return Err(IdentityError::InvalidNsecPrefix(hrp));
    }
    if data.len() != 32 {
        return Err(IdentityError::InvalidNsecLength(data.len()));
    }

    let secret_key = SecretKey::from_slice(&data);
    encoding::wipe(&mut data);
    Ok(secret_key?)
}

/// Decode a secret key from either nsec (bech32) or 64-char hex.
pub fn decode_secret(s: &str) -> Result<SecretKey, IdentityError> {
    let s = s.trim();
    if s.to_ascii_lowercase().starts_with("nsec1") {
        return decode_nsec(s);
    }
    let mut bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        return Err(IdentityError::InvalidNsecLength(bytes.len()));
    }
    let secret_key = SecretKey::from_slice(&bytes);
    encoding::wipe(&mut bytes);
    Ok(secret_key?)
}

/// Decode a public key from either npub (bech32) or 64-char hex.
pub fn decode_public(s: &str) -> Result<XOnlyPublicKey, IdentityError> {
    let s = s.trim();
    if s.to_ascii_lowercase().starts_with("npub1") {
        return decode_npub(s);
    }
    let bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        return Err(IdentityError::InvalidNpubLength(bytes.len()));
    }
    Ok(XOnlyPublicKey::from_slice(&bytes)?)
}
