use std::collections::HashSet;

use secp256k1::{Secp256k1, SecretKey};

use super::*;

const G_X: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
const TWO_G_X: &str = "c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";

fn scalar(n: u8) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[31] = n;
    bytes
}

#[test]
fn test_keypair_generation() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();

    assert_ne!(a.public_key(), b.public_key());
    assert_eq!(a.public_key_hex().len(), 64);
    assert!(a.npub().starts_with("npub1"));
    assert!(a.nsec().starts_with("nsec1"));
}

#[test]
fn test_public_key_is_x_of_compressed_point() {
    let keys = KeyPair::from_secret_bytes(&scalar(1)).unwrap();
    assert_eq!(keys.public_key_hex(), G_X);

    let compressed = keys.public_key_full().serialize();
    assert_eq!(&compressed[1..33], &keys.public_key().serialize()[..]);
}

#[test]
fn test_from_secret_bytes_rejects_bad_input() {
    assert!(matches!(
        KeyPair::from_secret_bytes(&[1u8; 31]),
        Err(IdentityError::InvalidInput {
            expected: 32,
            got: 31
        })
    ));
    // Zero is not a valid scalar
    assert!(matches!(
        KeyPair::from_secret_bytes(&[0u8; 32]),
        Err(IdentityError::InvalidSecretKey(_))
    ));
}

#[test]
fn test_nsec_known_vector() {
    let nsec = "nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5";
    let hex_secret = "67dea2ed018072d675f5415ecfaed7d2597555e202d85b3d65ea4e58d2d92ffa";

    let from_nsec = KeyPair::from_secret_str(nsec).unwrap();
    let from_hex = KeyPair::from_secret_str(hex_secret).unwrap();

    assert_eq!(from_nsec, from_hex);
    assert_eq!(hex::encode(*from_nsec.secret_bytes()), hex_secret);
    assert_eq!(from_nsec.nsec(), nsec);
}

#[test]
fn test_npub_roundtrip() {
    let keys = KeyPair::generate();
    let npub = keys.npub();
    assert_eq!(decode_npub(&npub).unwrap(), keys.public_key());
    assert_eq!(decode_public(&npub).unwrap(), keys.public_key());
    assert_eq!(decode_public(&keys.public_key_hex()).unwrap(), keys.public_key());
}

#[test]
fn test_npub_nsec_prefix_mismatch() {
    let keys = KeyPair::generate();

    assert!(matches!(
        decode_npub(&keys.nsec()),
        Err(IdentityError::InvalidNpubPrefix(p)) if p == "nsec"
    ));
    assert!(matches!(
        decode_nsec(&keys.npub()),
        Err(IdentityError::InvalidNsecPrefix(p)) if p == "npub"
    ));
}

#[test]
fn test_npub_wrong_length() {
    let s = crate::encoding::encode("npub", &[7u8; 20]).unwrap();
    assert!(matches!(
        decode_npub(&s),
        Err(IdentityError::InvalidNpubLength(20))
    ));
}

#[test]
fn test_sign_and_verify() {
    let keys = KeyPair::generate();
    let digest = sha256(b"hello nostr");

    let sig = keys.sign(&digest).unwrap();
    assert!(verify_digest(&keys.public_key(), &digest, &sig).is_ok());

    let other = sha256(b"hello nostr!");
    assert!(matches!(
        verify_digest(&keys.public_key(), &other, &sig),
        Err(IdentityError::SignatureVerificationFailed)
    ));

    let stranger = KeyPair::generate();
    assert!(verify_digest(&stranger.public_key(), &digest, &sig).is_err());
}

#[test]
fn test_sign_rejects_wrong_digest_length() {
    let keys = KeyPair::generate();
    for len in [0usize, 31, 33, 64] {
        let data = vec![0x11u8; len];
        assert!(matches!(
            keys.sign(&data),
            Err(IdentityError::InvalidInput { expected: 32, got }) if got == len
        ));
    }
}

#[test]
fn test_sign_matches_library_signature() {
    let keys = KeyPair::generate();
    let digest = sha256(b"payload");
    let sig = keys.sign(&digest).unwrap();

    let secp = Secp256k1::verification_only();
    assert!(secp
        .verify_schnorr(&sig, &digest, &keys.public_key())
        .is_ok());
}

#[test]
fn test_ecdh_is_raw_x_coordinate() {
    // 1 * (2G) = 2G, so the raw x is x(2G), with no hashing applied
    let one = SecretKey::from_slice(&scalar(1)).unwrap();
    let two = KeyPair::from_secret_bytes(&scalar(2)).unwrap();

    let shared = ecdh_raw(&one, &two.public_key_full());
    assert_eq!(hex::encode(*shared), TWO_G_X);

    let compressed = two.public_key_full().serialize();
    let via_bytes = ecdh_compressed(&one, &compressed).unwrap();
    assert_eq!(*via_bytes, *shared);
}

#[test]
fn test_ecdh_symmetric() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    assert_eq!(*a.shared_x(&b.public_key()), *b.shared_x(&a.public_key()));
}

#[test]
fn test_ecdh_parity_independent() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();

    let full = ecdh_raw(&a.secret_key(), &b.public_key_full());
    let lifted = a.shared_x(&b.public_key());
    assert_eq!(*full, *lifted);
}

#[test]
fn test_ecdh_compressed_rejects_wrong_length() {
    let a = KeyPair::generate();
    let xonly = a.public_key().serialize();
    assert!(matches!(
        ecdh_compressed(&a.secret_key(), &xonly),
        Err(IdentityError::InvalidInput {
            expected: 33,
            got: 32
        })
    ));
}

#[test]
fn test_keypair_eq_and_hash_use_public_key() {
    let a = KeyPair::generate();
    let a2 = KeyPair::from_secret_bytes(a.secret_bytes().as_ref()).unwrap();
    let b = KeyPair::generate();

    assert_eq!(a, a2);
    assert_ne!(a, b);

    let mut set = HashSet::new();
    set.insert(a.clone());
    set.insert(a2);
    set.insert(b);
    assert_eq!(set.len(), 2);
}

#[test]
fn test_debug_hides_secret() {
    let keys = KeyPair::generate();
    let debug = format!("{:?}", keys);
    let secret_hex = hex::encode(*keys.secret_bytes());

    assert!(debug.contains(&keys.public_key_hex()));
    assert!(!debug.contains(&secret_hex));
}
