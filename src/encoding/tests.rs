use super::*;

const NPUB_HEX: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";
const NPUB: &str = "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg";

fn replace_last_char(s: &str) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    let last = chars.len() - 1;
    chars[last] = if chars[last] == 'q' { 'p' } else { 'q' };
    chars.into_iter().collect()
}

#[test]
fn test_decode_known_npub() {
    let (hrp, data) = decode(NPUB).unwrap();
    assert_eq!(hrp, "npub");
    assert_eq!(to_hex(&data), NPUB_HEX);
}

#[test]
fn test_encode_known_npub() {
    let bytes = from_hex(NPUB_HEX).unwrap();
    assert_eq!(encode("npub", &bytes).unwrap(), NPUB);
}

#[test]
fn test_roundtrip_various_lengths() {
    for len in [0usize, 1, 5, 20, 32, 33, 64, 200] {
        let data: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
        for hrp in ["a", "note", "nprofile", "lnbc"] {
            let s = encode(hrp, &data).unwrap();
            let (got_hrp, got_data) = decode(&s).unwrap();
            assert_eq!(got_hrp, hrp);
            assert_eq!(got_data, data);
        }
    }
}

#[test]
fn test_decode_uppercase() {
    let (hrp, data) = decode(&NPUB.to_uppercase()).unwrap();
    assert_eq!(hrp, "npub");
    assert_eq!(to_hex(&data), NPUB_HEX);
}

#[test]
fn test_checksum_error() {
    let bad = replace_last_char(NPUB);
    assert_eq!(decode(&bad), Err(Bech32Error::Checksum));
}

#[test]
fn test_alphabet_error() {
    // 'b' is not part of the bech32 charset
    let bad = NPUB.replacen("npub1", "npub1b", 1);
    assert!(matches!(decode(&bad), Err(Bech32Error::Alphabet(_))));
}

#[test]
fn test_missing_separator() {
    assert!(matches!(
        decode("qpzry9x8gf2tvdw0s3jn54khce6mua7l"),
        Err(Bech32Error::Alphabet(_))
    ));
}

#[test]
fn test_groups_roundtrip() {
    let groups: Vec<u8> = (0..40).map(|i| (i % 32) as u8).collect();
    let s = encode_groups("lnbc", &groups).unwrap();
    let (hrp, decoded) = decode_groups(&s).unwrap();
    assert_eq!(hrp, "lnbc");
    assert_eq!(decoded, groups);
}

#[test]
fn test_encode_groups_rejects_wide_symbol() {
    assert_eq!(
        encode_groups("lnbc", &[1, 2, 32]),
        Err(Bech32Error::InvalidSymbol(32))
    );
}

#[test]
fn test_convert_bits_pads_on_encode() {
    // 8 bits -> two 5-bit groups, the second zero-padded
    assert_eq!(convert_bits(&[0xff], 8, 5, true).unwrap(), vec![31, 28]);
}

#[test]
fn test_convert_bits_strict_rejects_nonzero_padding() {
    // 31, 29 leaves a set bit in the 2 bits of padding
    assert_eq!(
        convert_bits(&[31, 29], 5, 8, false),
        Err(Bech32Error::InvalidPadding)
    );
    assert_eq!(convert_bits(&[31, 28], 5, 8, false).unwrap(), vec![0xff]);
}

#[test]
fn test_convert_bits_strict_rejects_excess_groups() {
    // A whole extra 5-bit group cannot be padding
    assert_eq!(
        convert_bits(&[31, 28, 0], 5, 8, false),
        Err(Bech32Error::InvalidPadding)
    );
}

#[test]
fn test_convert_bits_rejects_out_of_range_input() {
    assert_eq!(
        convert_bits(&[32], 5, 8, true),
        Err(Bech32Error::InvalidSymbol(32))
    );
    assert!(matches!(
        convert_bits(&[1], 0, 8, true),
        Err(Bech32Error::InvalidBitWidth { .. })
    ));
}

#[test]
fn test_hex_helpers() {
    let arr: [u8; 4] = from_hex_array("deadbeef").unwrap();
    assert_eq!(arr, [0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(to_hex(arr), "deadbeef");
    assert_eq!(
        from_hex_array::<32>("deadbeef"),
        Err(HexError::Length {
            expected: 32,
            got: 4
        })
    );
    assert!(matches!(from_hex("xyz0"), Err(HexError::Invalid(_))));
}

#[test]
fn test_constant_time_eq() {
    assert!(constant_time_eq(b"abc", b"abc"));
    assert!(!constant_time_eq(b"abc", b"abd"));
    assert!(!constant_time_eq(b"abc", b"abcd"));
    assert!(constant_time_eq(b"", b""));
}

#[test]
fn test_wipe() {
    let mut buf = [0xaau8; 16];
    wipe(&mut buf);
    assert_eq!(buf, [0u8; 16]);
}

#[test]
fn test_tlv_write_and_parse() {
    let mut writer = TlvWriter::new();
    writer.add(0, &[1u8; 32]).unwrap();
    writer.add(1, b"wss://relay.example").unwrap();
    writer.add(1, b"wss://other.example").unwrap();
    let bytes = writer.into_bytes();

    let records = parse_tlv(&bytes);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].tag, 0);
    assert_eq!(records[0].value, vec![1u8; 32]);
    assert_eq!(records[1].value, b"wss://relay.example".to_vec());
    assert_eq!(records[2].tag, 1);
}

#[test]
fn test_tlv_rejects_long_value() {
    let mut writer = TlvWriter::new();
    let long = vec![b'a'; 256];
    assert_eq!(
        writer.add(1, &long).unwrap_err(),
        TlvError::ValueTooLong { tag: 1, len: 256 }
    );
    assert!(writer.add(1, &long[..255]).is_ok());
}

#[test]
fn test_tlv_parse_stops_at_truncated_record() {
    let mut writer = TlvWriter::new();
    writer.add(0, &[7u8; 4]).unwrap();
    let mut bytes = writer.into_bytes();
    // Second record claims 10 bytes but carries 3
    bytes.extend_from_slice(&[1, 10, b'a', b'b', b'c']);

    let records = parse_tlv(&bytes);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, vec![7u8; 4]);

    // Lone type byte without a length
    assert!(parse_tlv(&[2]).is_empty());
}
