//! Type-length-value records used inside NIP-19 identifiers.

use thiserror::Error;

/// Errors from TLV encoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TlvError {
    #[error("TLV value for type {tag} is {len} bytes, max 255")]
    ValueTooLong { tag: u8, len: usize },
}

/// A single decoded TLV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvRecord {
    /// Record type byte.
    pub tag: u8,
    /// Raw value bytes.
    pub value: Vec<u8>,
}

/// Accumulates `type || len || value` records.
#[derive(Debug, Clone, Default)]
pub struct TlvWriter {
    buf: Vec<u8>,
}

impl TlvWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record.
    ///
    /// The length field is a single byte, so values over 255 bytes are
    /// refused instead of being written with a wrapped length.
    pub fn add(&mut self, tag: u8, value: &[u8]) -> Result<&mut Self, TlvError> {
        let len = u8::try_from(value.len()).map_err(|_| TlvError::ValueTooLong {
            tag,
            len: value.len(),
        })?;
        self.buf.push(tag);
        self.buf.push(len);
        self.buf.extend_from_slice(value);
        Ok(self)
    }

    /// Return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Walk TLV records in order.
///
/// Parsing stops silently at the first truncated record: a header without
/// a length byte, or a length that runs past the end of the input. Records
/// before that point are returned.
pub fn parse_tlv(data: &[u8]) -> Vec<TlvRecord> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos + 2 <= data.len() {
        let tag = data[pos];
        let len = data[pos + 1] as usize;
        let start = pos + 2;
        let end = start + len;
        if end > data.len() {
            break;
        }
        records.push(TlvRecord {
            tag,
            value: data[start..end].to_vec(),
        });
        pos = end;
    }

    records
}
