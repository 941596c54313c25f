// ============================================
// File: crates/sealpost-core/src/crypto/codec.rs
// ============================================
//! # Message Codec
//!
//! ## Creation Reason
//! Seals message bodies under a session key so the relay only ever sees
//! ciphertext and a nonce.
//!
//! ## Main Functionality
//! - `MessageCodec`: trait for encrypt / decrypt
//! - `XChaChaCodec`: XChaCha20-Poly1305 implementation
//! - `encrypt` / `decrypt`: convenience wrappers around the default codec
//!
//! ## Sealed Format
//! ```text
//! nonce      : 24 random bytes (sent alongside, not secret)
//! ciphertext : XChaCha20(plaintext) || Poly1305 tag (16 bytes)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A fresh nonce is drawn from the OS RNG on every call. 192-bit nonces
//!   make random collisions negligible; never switch to a counter here,
//!   the two directions of a pair would share one.
//! - Decryption is all-or-nothing: any failure is `AuthenticationFailure`
//!   and no bytes are returned.
//!
//! ## Last Modified
//! v0.1.0 - Initial message codec

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};

use super::keys::SessionKey;
use super::{POLY1305_TAG_SIZE, XCHACHA20_NONCE_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Largest plaintext accepted by the codec (64 KiB).
pub const MAX_PLAINTEXT_SIZE: usize = 64 * 1024;

/// Bytes added to the plaintext by sealing.
pub const ENCRYPTION_OVERHEAD: usize = POLY1305_TAG_SIZE;

// ============================================
// SealedMessage
// ============================================

/// Output of [`MessageCodec::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedMessage {
    /// Ciphertext with the authentication tag appended.
    pub ciphertext: Vec<u8>,
    /// Nonce used for this message.
    pub nonce: [u8; XCHACHA20_NONCE_SIZE],
}

// ============================================
// MessageCodec Trait
// ============================================

/// Authenticated encryption of message bodies.
pub trait MessageCodec: Send + Sync {
    /// Encrypts `plaintext` under `key` with a fresh random nonce.
    ///
    /// # Errors
    /// `MessageTooLarge` above [`MAX_PLAINTEXT_SIZE`], `Encryption` if the
    /// cipher fails.
    fn encrypt(&self, key: &SessionKey, plaintext: &[u8]) -> Result<SealedMessage>;

    /// Verifies and decrypts.
    ///
    /// # Errors
    /// `AuthenticationFailure` on a wrong key, a modified ciphertext or a
    /// modified or mis-sized nonce.
    fn decrypt(&self, key: &SessionKey, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>>;
}

// ============================================
// XChaChaCodec
// ============================================

/// Default codec using XChaCha20-Poly1305.
#[derive(Debug, Default, Clone, Copy)]
pub struct XChaChaCodec;

impl XChaChaCodec {
    /// Creates a new instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MessageCodec for XChaChaCodec {
    fn encrypt(&self, key: &SessionKey, plaintext: &[u8]) -> Result<SealedMessage> {
        if plaintext.len() > MAX_PLAINTEXT_SIZE {
            return Err(CoreError::too_large(MAX_PLAINTEXT_SIZE, plaintext.len()));
        }

        let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| {
            CoreError::Encryption {
                context: "Failed to create cipher".into(),
            }
        })?;

        let mut nonce = [0u8; XCHACHA20_NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| CoreError::Encryption {
                context: "XChaCha20-Poly1305 encryption failed".into(),
            })?;

        Ok(SealedMessage { ciphertext, nonce })
    }

    fn decrypt(&self, key: &SessionKey, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != XCHACHA20_NONCE_SIZE || ciphertext.len() < POLY1305_TAG_SIZE {
            return Err(CoreError::AuthenticationFailure);
        }

        let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
            .map_err(|_| CoreError::AuthenticationFailure)?;

        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CoreError::AuthenticationFailure)
    }
}

// ============================================
// Convenience Functions
// ============================================

/// Encrypts with the default codec.
///
/// # Errors
/// See [`MessageCodec::encrypt`].
pub fn encrypt(key: &SessionKey, plaintext: &[u8]) -> Result<SealedMessage> {
    XChaChaCodec::new().encrypt(key, plaintext)
}

/// Decrypts with the default codec.
///
/// # Errors
/// See [`MessageCodec::decrypt`].
pub fn decrypt(key: &SessionKey, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    XChaChaCodec::new().decrypt(key, ciphertext, nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SessionKey {
        SessionKey::from_bytes([0x42; 32])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        for plaintext in [&b""[..], &b"hello"[..], &[0xAB; 4096][..]] {
            let sealed = encrypt(&key, plaintext).unwrap();
            assert_eq!(sealed.ciphertext.len(), plaintext.len() + ENCRYPTION_OVERHEAD);
            assert_eq!(decrypt(&key, &sealed.ciphertext, &sealed.nonce).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = test_key();
        let first = encrypt(&key, b"same").unwrap();
        let second = encrypt(&key, b"same").unwrap();
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails_decryption() {
        let sealed = encrypt(&test_key(), b"secret").unwrap();
        let other = SessionKey::from_bytes([0x43; 32]);
        assert!(matches!(
            decrypt(&other, &sealed.ciphertext, &sealed.nonce),
            Err(CoreError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_every_ciphertext_bit_flip_detected() {
        let key = test_key();
        let sealed = encrypt(&key, b"hello").unwrap();

        for byte in 0..sealed.ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = sealed.ciphertext.clone();
                tampered[byte] ^= 1 << bit;
                assert!(matches!(
                    decrypt(&key, &tampered, &sealed.nonce),
                    Err(CoreError::AuthenticationFailure)
                ));
            }
        }
    }

    #[test]
    fn test_every_nonce_bit_flip_detected() {
        let key = test_key();
        let sealed = encrypt(&key, b"hello").unwrap();

        for byte in 0..sealed.nonce.len() {
            for bit in 0..8 {
                let mut nonce = sealed.nonce;
                nonce[byte] ^= 1 << bit;
                assert!(matches!(
                    decrypt(&key, &sealed.ciphertext, &nonce),
                    Err(CoreError::AuthenticationFailure)
                ));
            }
        }
    }

    #[test]
    fn test_truncated_inputs_fail() {
        let key = test_key();
        let sealed = encrypt(&key, b"hello").unwrap();
        assert!(matches!(
            decrypt(&key, &sealed.ciphertext[..10], &sealed.nonce),
            Err(CoreError::AuthenticationFailure)
        ));
        assert!(matches!(
            decrypt(&key, &sealed.ciphertext, &sealed.nonce[..12]),
            Err(CoreError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_oversized_plaintext_rejected() {
        let big = vec![0u8; MAX_PLAINTEXT_SIZE + 1];
        assert!(matches!(
            encrypt(&test_key(), &big),
            Err(CoreError::MessageTooLarge { .. })
        ));
    }
}
