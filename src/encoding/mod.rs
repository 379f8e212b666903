//! Byte and text encodings.
//!
//! Hex helpers, constant-time comparison and buffer wiping, plus a bech32
//! codec that works on whole bytes or on raw 5-bit symbols. The checksum and
//! charset engine is the `bech32` crate; regrouping between 8-bit bytes and
//! 5-bit symbols happens here so callers can pick strict or padded
//! conversion (BOLT11 payloads are not byte aligned).

mod tlv;

use bech32::primitives::decode::{CheckedHrpstring, CheckedHrpstringError};
use bech32::primitives::iter::Fe32IterExt;
use bech32::{Bech32, Fe32, Hrp};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroize;

pub use tlv::{parse_tlv, TlvError, TlvRecord, TlvWriter};

/// Errors from bech32 encoding and decoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Bech32Error {
    #[error("invalid bech32 string: {0}")]
    Alphabet(String),

    #[error("bech32 checksum mismatch")]
    Checksum,

    #[error("invalid human-readable part: {0}")]
    InvalidHrp(String),

    #[error("value {0} does not fit the source bit width")]
    InvalidSymbol(u8),

    #[error("non-zero or excess padding bits")]
    InvalidPadding,

    #[error("unsupported bit widths: {from} -> {to}")]
    InvalidBitWidth { from: u32, to: u32 },
}

impl From<CheckedHrpstringError> for Bech32Error {
    fn from(err: CheckedHrpstringError) -> Self {
        match err {
            CheckedHrpstringError::Checksum(_) => Bech32Error::Checksum,
            other => Bech32Error::Alphabet(other.to_string()),
        }
    }
}

/// Errors from hex decoding.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    Invalid(#[from] hex::FromHexError),

    #[error("invalid length: expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },
}

// ============================================================================
// Hex and byte helpers
// ============================================================================

/// Encode bytes as lowercase hex.
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(bytes)
}

/// Decode a hex string of any even length.
pub fn from_hex(s: &str) -> Result<Vec<u8>, HexError> {
    Ok(hex::decode(s)?)
}

/// Decode a hex string into a fixed-size array.
pub fn from_hex_array<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    let bytes = hex::decode(s)?;
    if bytes.len() != N {
        return Err(HexError::Length {
            expected: N,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Compare two byte strings in constant time with respect to their contents.
///
/// Length is not secret: slices of different length compare unequal
/// immediately.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Overwrite a buffer with zeros in a way the optimizer will not elide.
pub fn wipe(buf: &mut [u8]) {
    buf.zeroize();
}

// ============================================================================
// Bech32
// ============================================================================

/// Encode bytes as a bech32 string with the given human-readable prefix.
pub fn encode(hrp: &str, data: &[u8]) -> Result<String, Bech32Error> {
    let groups = convert_bits(data, 8, 5, true)?;
    encode_groups(hrp, &groups)
}

/// Encode raw 5-bit symbols as a bech32 string.
pub fn encode_groups(hrp: &str, groups: &[u8]) -> Result<String, Bech32Error> {
    let hrp = Hrp::parse(hrp).map_err(|e| Bech32Error::InvalidHrp(e.to_string()))?;
    let symbols = groups
        .iter()
        .map(|&g| Fe32::try_from(g).map_err(|_| Bech32Error::InvalidSymbol(g)))
        .collect::<Result<Vec<Fe32>, _>>()?;
    Ok(symbols
        .into_iter()
        .with_checksum::<Bech32>(&hrp)
        .chars()
        .collect())
}

/// Decode a bech32 string into its lowercase prefix and payload bytes.
///
/// Trailing bits left over from the 5-to-8 regrouping must be fewer than five
/// and all zero.
pub fn decode(s: &str) -> Result<(String, Vec<u8>), Bech32Error> {
    let (hrp, groups) = decode_groups(s)?;
    let data = convert_bits(&groups, 5, 8, false)?;
    Ok((hrp, data))
}

/// Decode a bech32 string into its lowercase prefix and raw 5-bit symbols,
/// with the checksum verified and stripped.
pub fn decode_groups(s: &str) -> Result<(String, Vec<u8>), Bech32Error> {
    let checked = CheckedHrpstring::new::<Bech32>(s)?;
    let hrp = checked.hrp().as_str().to_ascii_lowercase();
    let groups = checked
        .data_part_ascii_no_checksum()
        .iter()
        .map(|&c| {
            let c = char::from(c).to_ascii_lowercase();
            Fe32::from_char(c)
                .map(Fe32::to_u8)
                .map_err(|_| Bech32Error::Alphabet(format!("invalid character '{c}'")))
        })
        .collect::<Result<Vec<u8>, _>>()?;
    Ok((hrp, groups))
}

/// Regroup a sequence of `from`-bit values into `to`-bit values.
///
/// With `pad` set, a final partial group is zero-filled. Without it the
/// leftover must be shorter than `from` bits and all zero, otherwise
/// [`Bech32Error::InvalidPadding`] is returned.
pub fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>, Bech32Error> {
    if !(1..=8).contains(&from) || !(1..=8).contains(&to) {
        return Err(Bech32Error::InvalidBitWidth { from, to });
    }

    let max_value: u32 = (1 << to) - 1;
    let max_acc: u32 = (1 << (from + to - 1)) - 1;
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for &value in data {
        let v = u32::from(value);
        if v >> from != 0 {
            return Err(Bech32Error::InvalidSymbol(value));
        }
        acc = ((acc << from) | v) & max_acc;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max_value) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max_value) != 0 {
        return Err(Bech32Error::InvalidPadding);
    }

    Ok(out)
}

#[cfg(test)]
mod tests;
