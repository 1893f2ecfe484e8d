// crates/tfstated-core/src/core/crypto.rs
// ============================================================================
// Module: tfstated At-Rest Codec
// Description: AES-256-CBC wrapping of stored state bodies.
// Purpose: Encrypt version bodies with a process-wide pre-shared key.
// Dependencies: aes, cbc, rand, base64, hex, thiserror
// ============================================================================

//! ## Overview
//! Stored bodies are laid out as `IV (16 bytes) || AES-256-CBC(PKCS#7(body))`.
//! A fresh IV is drawn from the operating system RNG for every call, so equal
//! plaintexts never produce equal ciphertexts.
//!
//! Security posture: the ciphertext carries no authentication tag. Tampering
//! is only detected when it corrupts the padding. Key material never appears
//! in `Debug` output or error messages.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use aes::Aes256;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use cbc::cipher::BlockDecryptMut;
use cbc::cipher::BlockEncryptMut;
use cbc::cipher::KeyIvInit;
use cbc::cipher::block_padding::Pkcs7;
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// AES-256 key size in bytes.
pub const AES256_KEY_SIZE: usize = 32;
/// CBC initialization vector size in bytes.
pub const AES256_IV_SIZE: usize = 16;
/// AES block size in bytes.
const AES_BLOCK_SIZE: usize = 16;

/// CBC encryptor over AES-256.
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
/// CBC decryptor over AES-256.
type Aes256CbcDec = cbc::Decryptor<Aes256>;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Codec and key handling errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key text could not be decoded or has the wrong length.
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),
    /// Ciphertext is truncated or not block aligned.
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),
    /// Padding did not verify after decryption.
    #[error("ciphertext padding check failed")]
    Padding,
    /// The operating system RNG failed.
    #[error("random source failure: {0}")]
    Random(String),
}

// ============================================================================
// SECTION: Key
// ============================================================================

/// Pre-shared 256-bit data encryption key.
#[derive(Clone, PartialEq, Eq)]
pub struct Aes256Key([u8; AES256_KEY_SIZE]);

impl Aes256Key {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; AES256_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] unless the slice is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; AES256_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "expected {AES256_KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Decodes a standard base64 key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] when decoding fails or the length is wrong.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(text.trim())
            .map_err(|err| CryptoError::InvalidKey(format!("base64 decode failed: {err}")))?;
        Self::from_slice(&bytes)
    }

    /// Decodes a hex key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] when decoding fails or the length is wrong.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(text.trim())
            .map_err(|err| CryptoError::InvalidKey(format!("hex decode failed: {err}")))?;
        Self::from_slice(&bytes)
    }

    /// Generates a fresh random key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Random`] when the operating system RNG fails.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut key = [0_u8; AES256_KEY_SIZE];
        OsRng.try_fill_bytes(&mut key).map_err(|err| CryptoError::Random(err.to_string()))?;
        Ok(Self(key))
    }

    /// Returns the key as standard base64 text.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Encrypts `plaintext`, returning `IV || ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Random`] when no IV can be drawn.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut iv = [0_u8; AES256_IV_SIZE];
        OsRng.try_fill_bytes(&mut iv).map_err(|err| CryptoError::Random(err.to_string()))?;
        self.encrypt_with_iv(&iv, plaintext)
    }

    /// Encrypts with a caller-chosen IV.
    fn encrypt_with_iv(
        &self,
        iv: &[u8; AES256_IV_SIZE],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256CbcEnc::new_from_slices(&self.0, iv)
            .map_err(|err| CryptoError::InvalidKey(err.to_string()))?;
        let sealed = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let mut out = Vec::with_capacity(AES256_IV_SIZE + sealed.len());
        out.extend_from_slice(iv);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypts `IV || ciphertext` produced by [`Aes256Key::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] when the input is shorter than an IV, the
    /// payload is empty or not block aligned, or the padding does not verify.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < AES256_IV_SIZE {
            return Err(CryptoError::InvalidCiphertext(format!(
                "{} bytes is shorter than the iv",
                data.len()
            )));
        }
        let (iv, payload) = data.split_at(AES256_IV_SIZE);
        if payload.is_empty() || payload.len() % AES_BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidCiphertext(format!(
                "payload of {} bytes is not a positive multiple of the block size",
                payload.len()
            )));
        }
        let cipher = Aes256CbcDec::new_from_slices(&self.0, iv)
            .map_err(|err| CryptoError::InvalidKey(err.to_string()))?;
        cipher.decrypt_padded_vec_mut::<Pkcs7>(payload).map_err(|_| CryptoError::Padding)
    }
}

impl fmt::Debug for Aes256Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Aes256Key(<redacted>)")
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::use_debug,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    const TEST_KEY_HEX: &str = "28278b7c0a25f01d3cab639633b9487f9ea1e9a2176dc9595a3f01323aa44284";

    #[test]
    fn fixed_iv_encryption_is_deterministic_and_prefixed() {
        let key = Aes256Key::from_hex(TEST_KEY_HEX).unwrap();
        let iv = [7_u8; AES256_IV_SIZE];
        let first = key.encrypt_with_iv(&iv, b"state body").unwrap();
        let second = key.encrypt_with_iv(&iv, b"state body").unwrap();
        assert_eq!(first, second);
        assert_eq!(&first[..AES256_IV_SIZE], &iv);
        assert_eq!(key.decrypt(&first).unwrap(), b"state body");
    }

    #[test]
    fn full_block_plaintext_gains_a_padding_block() {
        let key = Aes256Key::from_hex(TEST_KEY_HEX).unwrap();
        let sealed = key.encrypt(&[0_u8; AES_BLOCK_SIZE]).unwrap();
        assert_eq!(sealed.len(), AES256_IV_SIZE + 2 * AES_BLOCK_SIZE);
    }

    #[test]
    fn debug_redacts_key_material() {
        let key = Aes256Key::from_hex(TEST_KEY_HEX).unwrap();
        let rendered = format!("{key:?}");
        assert_eq!(rendered, "Aes256Key(<redacted>)");
    }

    #[test]
    fn base64_key_round_trips() {
        let key = Aes256Key::generate().unwrap();
        assert_eq!(Aes256Key::from_base64(&key.to_base64()).unwrap(), key);
    }
}
