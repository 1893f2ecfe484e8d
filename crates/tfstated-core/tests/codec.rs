//! At-rest codec tests.
//!
//! ## Purpose
//! These tests pin the ciphertext layout and the failure modes of decryption
//! so that rows written by earlier builds stay readable.
//!
//! ## What is covered
//! - Arbitrary byte strings, including empty, survive encrypt/decrypt.
//! - Each call draws a fresh IV.
//! - Truncated, misaligned, and empty payloads fail with a crypto error.
//! - Key parsing rejects wrong lengths and bad encodings.
//!
//! ## What is intentionally out of scope
//! - Tamper detection (ciphertexts carry no authentication tag).
// crates/tfstated-core/tests/codec.rs
// ============================================================================
// Module: Codec Tests
// Description: Round-trip and malformed-input checks for the AES-256-CBC codec.
// Purpose: Ensure the codec fails closed on malformed ciphertext.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use tfstated_core::AES256_IV_SIZE;
use tfstated_core::Aes256Key;
use tfstated_core::CryptoError;

const TEST_KEY_HEX: &str = "28278b7c0a25f01d3cab639633b9487f9ea1e9a2176dc9595a3f01323aa44284";

fn test_key() -> Aes256Key {
    Aes256Key::from_hex(TEST_KEY_HEX).unwrap()
}

proptest! {
    #[test]
    fn decrypt_inverts_encrypt(body in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let key = test_key();
        let sealed = key.encrypt(&body).unwrap();
        prop_assert_eq!(key.decrypt(&sealed).unwrap(), body);
    }

    #[test]
    fn ciphertext_length_is_iv_plus_padded_blocks(len in 0_usize..512) {
        let key = test_key();
        let sealed = key.encrypt(&vec![0xAB; len]).unwrap();
        prop_assert_eq!(sealed.len(), AES256_IV_SIZE + (len / 16 + 1) * 16);
    }
}

#[test]
fn empty_plaintext_round_trips() {
    let key = test_key();
    let sealed = key.encrypt(b"").unwrap();
    assert_eq!(sealed.len(), AES256_IV_SIZE + 16);
    assert!(key.decrypt(&sealed).unwrap().is_empty());
}

#[test]
fn equal_plaintexts_encrypt_differently() {
    let key = test_key();
    let first = key.encrypt(b"same body").unwrap();
    let second = key.encrypt(b"same body").unwrap();
    assert_ne!(first, second);
}

#[test]
fn input_shorter_than_iv_is_rejected() {
    let Err(err) = test_key().decrypt(&[0_u8; 15]) else {
        panic!("expected truncated input to fail");
    };
    assert!(matches!(err, CryptoError::InvalidCiphertext(_)));
}

#[test]
fn bare_iv_is_rejected() {
    let Err(err) = test_key().decrypt(&[0_u8; AES256_IV_SIZE]) else {
        panic!("expected empty payload to fail");
    };
    assert!(matches!(err, CryptoError::InvalidCiphertext(_)));
}

#[test]
fn misaligned_payload_is_rejected() {
    let mut data = vec![0_u8; AES256_IV_SIZE];
    data.extend_from_slice(b"foo");
    let Err(err) = test_key().decrypt(&data) else {
        panic!("expected misaligned payload to fail");
    };
    assert!(matches!(err, CryptoError::InvalidCiphertext(_)));
}

#[test]
fn corrupted_padding_is_rejected() {
    let key = test_key();
    let mut sealed = key.encrypt(b"x").unwrap();
    // Flipping the IV shifts the single block's plaintext, which breaks the 15-byte pad.
    sealed[AES256_IV_SIZE - 1] ^= 0x01;
    let Err(err) = key.decrypt(&sealed) else {
        panic!("expected corrupted padding to fail");
    };
    assert_eq!(err, CryptoError::Padding);
}

#[test]
fn key_parsing_rejects_wrong_lengths_and_encodings() {
    assert!(matches!(Aes256Key::from_base64("AAAA"), Err(CryptoError::InvalidKey(_))));
    assert!(matches!(Aes256Key::from_base64("!!not base64!!"), Err(CryptoError::InvalidKey(_))));
    assert!(matches!(Aes256Key::from_hex("zz"), Err(CryptoError::InvalidKey(_))));
    assert!(matches!(Aes256Key::from_slice(&[0_u8; 31]), Err(CryptoError::InvalidKey(_))));
}

#[test]
fn different_key_cannot_recover_plaintext() {
    let sealed = test_key().encrypt(b"a state body long enough to span blocks").unwrap();
    let other = Aes256Key::from_bytes([9_u8; 32]);
    match other.decrypt(&sealed) {
        Ok(plain) => assert_ne!(plain, b"a state body long enough to span blocks"),
        Err(err) => assert_eq!(err, CryptoError::Padding),
    }
}
