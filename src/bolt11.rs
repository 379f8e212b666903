//! BOLT11 Lightning invoice decoding.
//!
//! Reads the fields a client needs to show and pay an invoice: amount,
//! timestamp, payment hash, description or its hash, expiry, payee key and
//! final CLTV delta. The signature is carried through as bytes and not
//! checked.
//!
//! ```text
//! ln<currency><amount><multiplier?> 1 <timestamp:7> (<tag:1><len:2><data:len>)* <signature:104> <checksum:6>
//! ```
//!
//! All positions and lengths above are in 5-bit groups.

use secp256k1::PublicKey;
use thiserror::Error;
use tracing::debug;

use crate::encoding::{self, Bech32Error};

/// Groups in the timestamp field.
const TIMESTAMP_GROUPS: usize = 7;

/// Groups in the trailing recoverable signature (65 bytes).
const SIGNATURE_GROUPS: usize = 104;

/// Minimum number of data groups after the checksum is removed.
pub const MIN_DATA_GROUPS: usize = TIMESTAMP_GROUPS + SIGNATURE_GROUPS;

/// Expiry applied when the invoice has no `x` field, in seconds.
pub const DEFAULT_EXPIRY_SECS: u64 = 3600;

const TAG_PAYMENT_HASH: u8 = 1;
const TAG_DESCRIPTION: u8 = 13;
const TAG_EXPIRY: u8 = 6;
const TAG_PAYEE: u8 = 19;
const TAG_DESCRIPTION_HASH: u8 = 23;
const TAG_MIN_FINAL_CLTV: u8 = 24;

/// Groups in a 32-byte hash field.
const HASH_GROUPS: usize = 52;
/// Groups in a 33-byte compressed public key field.
const PUBKEY_GROUPS: usize = 53;

/// Errors from decoding an invoice.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Bolt11Error {
    #[error("bech32: {0}")]
    Bech32(#[from] Bech32Error),

    #[error("not a lightning invoice prefix: {0}")]
    NotLightning(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invoice too short: {0} data groups, need at least {MIN_DATA_GROUPS}")]
    TooShort(usize),

    #[error("field with tag {tag} runs past the signature")]
    Truncated { tag: u8 },

    #[error("invalid value in field with tag {tag}")]
    InvalidField { tag: u8 },
}

/// A decoded invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    /// Currency prefix after `ln`, e.g. `bc`, `tb`, `bcrt`.
    pub currency: String,
    /// Requested amount in millisatoshis; `None` for any-amount invoices.
    pub amount_msats: Option<u64>,
    /// Creation time, Unix seconds.
    pub timestamp: u64,
    pub payment_hash: Option<[u8; 32]>,
    pub description: Option<String>,
    pub description_hash: Option<[u8; 32]>,
    /// Seconds after `timestamp` at which the invoice expires.
    pub expiry: u64,
    pub payee: Option<PublicKey>,
    pub min_final_cltv_expiry: Option<u64>,
    /// 64-byte compact signature plus recovery id.
    pub signature: Vec<u8>,
}

impl Invoice {
    /// Amount in whole satoshis, rounded down.
    pub fn amount_sats(&self) -> Option<u64> {
        self.amount_msats.map(|msats| msats / 1000)
    }

    pub fn payment_hash_hex(&self) -> Option<String> {
        self.payment_hash.map(hex::encode)
    }

    pub fn expires_at(&self) -> u64 {
        self.timestamp.saturating_add(self.expiry)
    }

    /// `now > timestamp + expiry`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.is_expired_at(now)
    }
}

/// Decode an invoice, or `None` if it is malformed.
pub fn decode(invoice: &str) -> Option<Invoice> {
    match parse(invoice) {
        Ok(inv) => Some(inv),
        Err(e) => {
            debug!(error = %e, "Rejected lightning invoice");
            None
        }
    }
}

/// Decode an invoice, reporting what was wrong with it.
pub fn parse(invoice: &str) -> Result<Invoice, Bolt11Error> {
    let trimmed = invoice.trim();
    let without_scheme = match trimmed.get(..10) {
        Some(prefix) if prefix.eq_ignore_ascii_case("lightning:") => &trimmed[10..],
        _ => trimmed,
    };
    let normalized = without_scheme.to_ascii_lowercase();

    let (hrp, groups) = encoding::decode_groups(&normalized)?;
    let (currency, amount_msats) = parse_hrp(&hrp)?;

    if groups.len() < MIN_DATA_GROUPS {
        return Err(Bolt11Error::TooShort(groups.len()));
    }
    let (fields, signature) = groups.split_at(groups.len() - SIGNATURE_GROUPS);
    let timestamp = be_value(&fields[..TIMESTAMP_GROUPS]).ok_or(Bolt11Error::InvalidField { tag: 0 })?;

    let mut inv = Invoice {
        currency,
        amount_msats,
        timestamp,
        payment_hash: None,
        description: None,
        description_hash: None,
        expiry: DEFAULT_EXPIRY_SECS,
        payee: None,
        min_final_cltv_expiry: None,
        signature: groups_to_bytes(signature),
    };

    let mut pos = TIMESTAMP_GROUPS;
    while pos < fields.len() {
        if pos + 3 > fields.len() {
            return Err(Bolt11Error::Truncated { tag: fields[pos] });
        }
        let tag = fields[pos];
        let len = (fields[pos + 1] as usize) << 5 | fields[pos + 2] as usize;
        let start = pos + 3;
        let end = start + len;
        if end > fields.len() {
            return Err(Bolt11Error::Truncated { tag });
        }
        apply_field(&mut inv, tag, &fields[start..end])?;
        pos = end;
    }

    Ok(inv)
}

fn apply_field(inv: &mut Invoice, tag: u8, data: &[u8]) -> Result<(), Bolt11Error> {
    match tag {
        // Hash fields of the wrong length are skipped, not rejected
        TAG_PAYMENT_HASH if data.len() == HASH_GROUPS => {
            inv.payment_hash = Some(hash_field(data));
        }
        TAG_DESCRIPTION_HASH if data.len() == HASH_GROUPS => {
            inv.description_hash = Some(hash_field(data));
        }
        TAG_DESCRIPTION => {
            let text = String::from_utf8(groups_to_bytes(data))
                .map_err(|_| Bolt11Error::InvalidField { tag })?;
            inv.description = Some(text);
        }
        TAG_EXPIRY => {
            inv.expiry = be_value(data).ok_or(Bolt11Error::InvalidField { tag })?;
        }
        TAG_MIN_FINAL_CLTV => {
            inv.min_final_cltv_expiry = Some(be_value(data).ok_or(Bolt11Error::InvalidField { tag })?);
        }
        TAG_PAYEE if data.len() == PUBKEY_GROUPS => {
            let bytes = groups_to_bytes(data);
            let key = PublicKey::from_slice(&bytes).map_err(|_| Bolt11Error::InvalidField { tag })?;
            inv.payee = Some(key);
        }
        _ => {}
    }
    Ok(())
}

/// Split `ln<currency><amount?>` and convert the amount to millisatoshis.
fn parse_hrp(hrp: &str) -> Result<(String, Option<u64>), Bolt11Error> {
    let rest = hrp
        .strip_prefix("ln")
        .ok_or_else(|| Bolt11Error::NotLightning(hrp.to_string()))?;

    let (body, multiplier) = match rest.chars().last() {
        Some(c @ ('m' | 'u' | 'n' | 'p'))
            if rest[..rest.len() - 1].ends_with(|d: char| d.is_ascii_digit()) =>
        {
            (&rest[..rest.len() - 1], Some(c))
        }
        _ => (rest, None),
    };

    let digits_start = body
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    let currency = &body[..digits_start];
    let digits = &body[digits_start..];

    if currency.is_empty() {
        return Err(Bolt11Error::NotLightning(hrp.to_string()));
    }
    if digits.is_empty() {
        return Ok((currency.to_string(), None));
    }

    let value: u64 = digits
        .parse()
        .map_err(|_| Bolt11Error::InvalidAmount(hrp.to_string()))?;
    let msats = match multiplier {
        None => value.checked_mul(100_000_000_000),
        Some('m') => value.checked_mul(100_000_000),
        Some('u') => value.checked_mul(100_000),
        Some('n') => value.checked_mul(100),
        Some('p') => {
            // Sub-millisatoshi amounts cannot be paid
            if value % 10 != 0 {
                return Err(Bolt11Error::InvalidAmount(hrp.to_string()));
            }
            Some(value / 10)
        }
        Some(_) => None,
    }
    .ok_or_else(|| Bolt11Error::InvalidAmount(hrp.to_string()))?;

    Ok((currency.to_string(), Some(msats)))
}

/// Big-endian integer over 5-bit groups. `None` if it does not fit in u64.
fn be_value(groups: &[u8]) -> Option<u64> {
    groups
        .iter()
        .try_fold(0u64, |acc, &g| acc.checked_mul(32)?.checked_add(g as u64))
}

/// Regroup to bytes, dropping a trailing partial byte.
fn groups_to_bytes(groups: &[u8]) -> Vec<u8> {
    let mut bytes = encoding::convert_bits(groups, 5, 8, true).unwrap_or_default();
    bytes.truncate(groups.len() * 5 / 8);
    bytes
}

fn hash_field(groups: &[u8]) -> [u8; 32] {
    let bytes = groups_to_bytes(groups);
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[..32]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // Invoices published in BOLT #11
    const COFFEE: &str = "lnbc2500u1pvjluezpp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypqdq5xysxxatsyp3k7enxv4jsxqzpuaztrnwngzn3kdzw5hydlzf03qdgm2hdq27cqv3agm2awhz5se903vruatfhq77w3ls4evs3ch9zw97j25emudupq63nyw24cg27h2rspfj9srp";
    const DONATION: &str = "lnbc1pvjluezpp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypqdpl2pkx2ctnv5sxxmmwwd5kgetjypeh2ursdae8g6twvus8g6rfwvs8qun0dfjkxaq8rkx3yf5tcsyz3d73gafnh3cax9rn449d9p5uxz9ezhhypd0elx87sjle52x86fux2ypatgddc6k63n7erqz25le42c4u4ecky03ylcqca784w";
    const HASHED: &str = "lnbc20m1pvjluezpp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypqhp58yjmdan79s6qqdhdzgynm4zwqd5d7xmw5fk98klysy043l2ahrqscc6gd6ql3jrc5yzme8v4ntcewwz5cnw92tz0pc8qcuufvq7khhr8wpald05e92xw006sq94mg8v2ndf4sefvf9sygkshp5zfem29trqq2yxxz7";

    const PAYMENT_HASH: &str = "0001020304050607080900010203040506070809000102030405060708090102";

    fn groups_of(value: u64, n: usize) -> Vec<u8> {
        (0..n).rev().map(|i| ((value >> (5 * i)) & 31) as u8).collect()
    }

    fn field(tag: u8, data: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend(groups_of(data.len() as u64, 2));
        out.extend_from_slice(data);
        out
    }

    fn bytes_field(tag: u8, bytes: &[u8]) -> Vec<u8> {
        field(tag, &encoding::convert_bits(bytes, 8, 5, true).unwrap())
    }

    /// Assemble an invoice with a zeroed signature.
    fn build(hrp: &str, timestamp: u64, fields: &[Vec<u8>]) -> String {
        let mut groups = groups_of(timestamp, 7);
        for f in fields {
            groups.extend_from_slice(f);
        }
        groups.extend(std::iter::repeat(0u8).take(SIGNATURE_GROUPS));
        encoding::encode_groups(hrp, &groups).unwrap()
    }

    #[test]
    fn test_coffee_invoice() {
        let inv = parse(COFFEE).unwrap();
        assert_eq!(inv.currency, "bc");
        assert_eq!(inv.amount_sats(), Some(250_000));
        assert_eq!(inv.timestamp, 1496314658);
        assert_eq!(inv.payment_hash_hex().as_deref(), Some(PAYMENT_HASH));
        assert_eq!(inv.description.as_deref(), Some("1 cup coffee"));
        assert_eq!(inv.expiry, 60);
        assert_eq!(inv.signature.len(), 65);
    }

    #[test]
    fn test_donation_invoice_has_no_amount() {
        let inv = parse(DONATION).unwrap();
        assert_eq!(inv.amount_msats, None);
        assert_eq!(
            inv.description.as_deref(),
            Some("Please consider supporting this project")
        );
        assert_eq!(inv.expiry, DEFAULT_EXPIRY_SECS);
    }

    #[test]
    fn test_description_hash_invoice() {
        let inv = parse(HASHED).unwrap();
        assert_eq!(inv.amount_sats(), Some(2_000_000));
        assert_eq!(inv.description, None);
        assert_eq!(
            hex::encode(inv.description_hash.unwrap()),
            "3925b6f67e2c340036ed12093dd44e0368df1b6ea26c53dbe4811f58fd5db8c1"
        );
    }

    #[test]
    fn test_lightning_prefix_and_case() {
        let prefixed = format!("lightning:{}", COFFEE);
        assert_eq!(parse(&prefixed).unwrap(), parse(COFFEE).unwrap());

        let upper = format!("LIGHTNING:{}", COFFEE.to_uppercase());
        assert_eq!(parse(&upper).unwrap(), parse(COFFEE).unwrap());
    }

    #[test]
    fn test_multiplier_table() {
        let cases = [
            ("lnbc2500u", Some(250_000_000), Some(250_000)),
            ("lnbc20m", Some(2_000_000_000), Some(2_000_000)),
            ("lnbc1", Some(100_000_000_000), Some(100_000_000)),
            ("lnbc2500n", Some(250_000), Some(250)),
            ("lnbc10p", Some(1), Some(0)),
            ("lnbc10000p", Some(1_000), Some(1)),
            ("lntb5u", Some(500_000), Some(500)),
            ("lnbcrt1m", Some(100_000_000), Some(100_000)),
            ("lnbc", None, None),
        ];
        for (hrp, msats, sats) in cases {
            let inv = parse(&build(hrp, 1, &[])).unwrap();
            assert_eq!(inv.amount_msats, msats, "{}", hrp);
            assert_eq!(inv.amount_sats(), sats, "{}", hrp);
        }
    }

    #[test]
    fn test_currency_prefix() {
        assert_eq!(parse(&build("lnbcrt1m", 1, &[])).unwrap().currency, "bcrt");
        assert_eq!(parse(&build("lntb", 1, &[])).unwrap().currency, "tb");
    }

    #[test]
    fn test_bad_amounts() {
        assert!(matches!(
            parse(&build("lnbc15p", 1, &[])),
            Err(Bolt11Error::InvalidAmount(_))
        ));
        assert!(matches!(
            parse(&build("lnbc99999999999999999999", 1, &[])),
            Err(Bolt11Error::InvalidAmount(_))
        ));
        assert!(matches!(
            parse(&build("bc1", 1, &[])),
            Err(Bolt11Error::NotLightning(_))
        ));
        assert!(matches!(
            parse(&build("ln25u", 1, &[])),
            Err(Bolt11Error::NotLightning(_))
        ));
    }

    #[test]
    fn test_supplementary_fields() {
        let payee = secp256k1::Secp256k1::new();
        let (_, pk) = payee.generate_keypair(&mut rand::thread_rng());
        let hash = [0xabu8; 32];

        let invoice = build(
            "lnbc1m",
            1_700_000_000,
            &[
                bytes_field(TAG_PAYMENT_HASH, &hash),
                bytes_field(TAG_PAYEE, &pk.serialize()),
                field(TAG_MIN_FINAL_CLTV, &groups_of(144, 2)),
                field(TAG_EXPIRY, &groups_of(86_400, 4)),
                // Unknown tag: skipped by length
                field(31, &[1, 2, 3, 4, 5]),
            ],
        );
        let inv = parse(&invoice).unwrap();
        assert_eq!(inv.timestamp, 1_700_000_000);
        assert_eq!(inv.payment_hash, Some(hash));
        assert_eq!(inv.payee, Some(pk));
        assert_eq!(inv.min_final_cltv_expiry, Some(144));
        assert_eq!(inv.expiry, 86_400);
    }

    #[test]
    fn test_wrong_length_hash_skipped() {
        let invoice = build("lnbc", 1, &[field(TAG_PAYMENT_HASH, &[0u8; 51])]);
        assert_eq!(parse(&invoice).unwrap().payment_hash, None);
    }

    #[test]
    fn test_truncated_field() {
        // Declares 60 groups of description but the signature follows after 4
        let mut bad = vec![TAG_DESCRIPTION];
        bad.extend(groups_of(60, 2));
        bad.extend_from_slice(&[1, 2, 3, 4]);
        let invoice = build("lnbc", 1, &[bad]);
        assert_eq!(
            parse(&invoice),
            Err(Bolt11Error::Truncated {
                tag: TAG_DESCRIPTION
            })
        );
    }

    #[test]
    fn test_too_short() {
        let groups = vec![0u8; MIN_DATA_GROUPS - 1];
        let invoice = encoding::encode_groups("lnbc", &groups).unwrap();
        assert_eq!(
            parse(&invoice),
            Err(Bolt11Error::TooShort(MIN_DATA_GROUPS - 1))
        );
        assert!(decode(&invoice).is_none());
    }

    #[test]
    fn test_bad_checksum() {
        let mut bad = COFFEE.to_string();
        bad.pop();
        bad.push('q');
        assert_eq!(parse(&bad), Err(Bolt11Error::Bech32(Bech32Error::Checksum)));
        assert!(decode(&bad).is_none());
        assert!(decode("not an invoice").is_none());
    }

    #[test]
    fn test_expiry() {
        let inv = parse(COFFEE).unwrap();
        assert!(!inv.is_expired_at(1496314658 + 60));
        assert!(inv.is_expired_at(1496314658 + 61));
        // Issued in 2017 with a one-minute expiry
        assert!(inv.is_expired());
    }
}
