// ============================================
// File: crates/sealpost-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Key types for the end-to-end protocol, with zeroize-on-drop and
//! redacted `Debug` output.
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  IdentityKeyPair (long-term, client only)                  │
//! │  ├─ Generated once at registration                         │
//! │  ├─ Private half kept in the client's SecretStore          │
//! │  └─ Public half registered in the identity directory       │
//! │                                                            │
//! │  SessionKey (per peer, per direction)                      │
//! │  ├─ Derived from X25519(own secret, peer public)           │
//! │  ├─ Cached in memory only, never persisted                 │
//! │  └─ Zeroed when the cache entry is dropped                 │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private keys must never be logged or serialized implicitly
//! - `IdentityPublicKey` accepts any 32 bytes; low-order points are caught
//!   at derivation time, where the DH output is checked
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as X25519PublicKey, SharedSecret, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{SESSION_KEY_SIZE, X25519_PUBLIC_KEY_SIZE, X25519_SECRET_KEY_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// IdentityKeyPair (X25519)
// ============================================

/// Long-term X25519 identity of one user.
///
/// # Security
/// - The scalar is zeroed on drop (`StaticSecret` is `ZeroizeOnDrop`)
/// - `Debug` prints only the public half
///
/// # Example
/// ```
/// use sealpost_core::crypto::IdentityKeyPair;
///
/// let alice = IdentityKeyPair::generate();
/// let stored = alice.to_bytes();
/// let restored = IdentityKeyPair::from_bytes(&stored).unwrap();
/// assert_eq!(alice.public_key(), restored.public_key());
/// ```
pub struct IdentityKeyPair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl IdentityKeyPair {
    /// Generates a new identity from the OS random number generator.
    #[must_use]
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Restores an identity from its 32-byte private scalar.
    ///
    /// # Errors
    /// `InvalidKeyMaterial` if `bytes` is not exactly 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut scalar: [u8; X25519_SECRET_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CoreError::invalid_key(format!(
                "private key must be {X25519_SECRET_KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        let secret = StaticSecret::from(scalar);
        scalar.zeroize();
        let public = X25519PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    /// Restores an identity from a base64-encoded private scalar.
    ///
    /// # Errors
    /// `InvalidKeyMaterial` on bad base64 or wrong length.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| CoreError::invalid_key("private key is not valid base64"))?;
        let result = Self::from_bytes(&bytes);
        bytes.zeroize();
        result
    }

    /// Returns the public half.
    #[must_use]
    pub fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey(self.public.to_bytes())
    }

    /// Exports the private scalar for the secret store.
    ///
    /// # Security Warning
    /// The caller owns the returned bytes and must zeroize them.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; X25519_SECRET_KEY_SIZE] {
        self.secret.to_bytes()
    }

    /// Raw X25519 with a peer. The caller checks `was_contributory`.
    pub(crate) fn diffie_hellman(&self, peer: &IdentityPublicKey) -> SharedSecret {
        self.secret.diffie_hellman(&X25519PublicKey::from(peer.0))
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

// ============================================
// IdentityPublicKey
// ============================================

/// Public half of an identity, safe to publish in the directory.
///
/// Serializes as a base64 string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityPublicKey([u8; X25519_PUBLIC_KEY_SIZE]);

impl IdentityPublicKey {
    /// Creates a public key from raw bytes.
    ///
    /// # Errors
    /// `InvalidKeyMaterial` if `bytes` is not exactly 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; X25519_PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CoreError::invalid_key(format!(
                "public key must be {X25519_PUBLIC_KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parses a base64-encoded public key.
    ///
    /// # Errors
    /// `InvalidKeyMaterial` on bad base64 or wrong length.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| CoreError::invalid_key("public key is not valid base64"))?;
        Self::from_bytes(&bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; X25519_PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Returns the base64 encoding used on the wire.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Short hex fingerprint (first 8 bytes of SHA-256) for logs and CLI output.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityPublicKey({}...)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Serialize for IdentityPublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for IdentityPublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================
// SessionKey
// ============================================

/// Directional symmetric key shared by one pair of identities.
///
/// # Security
/// - Zeroed on drop
/// - Never logged or serialized
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Creates a session key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        // Fold the whole array so the comparison does not stop early.
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Eq for SessionKey {}

// ============================================
// SessionKeyPair
// ============================================

/// Both directions of a session, as seen by one party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeyPair {
    /// Encrypts traffic this party sends to the peer.
    pub transmit: SessionKey,
    /// Decrypts traffic this party receives from the peer.
    pub receive: SessionKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_keypair_generation() {
        let kp1 = IdentityKeyPair::generate();
        let kp2 = IdentityKeyPair::generate();
        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_identity_keypair_roundtrip() {
        let kp = IdentityKeyPair::generate();
        let restored = IdentityKeyPair::from_bytes(&kp.to_bytes()).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());

        let encoded = BASE64.encode(kp.to_bytes());
        let from_b64 = IdentityKeyPair::from_base64(&encoded).unwrap();
        assert_eq!(kp.public_key(), from_b64.public_key());
    }

    #[test]
    fn test_wrong_length_is_invalid_key_material() {
        assert!(matches!(
            IdentityKeyPair::from_bytes(&[1u8; 31]),
            Err(CoreError::InvalidKeyMaterial { .. })
        ));
        assert!(matches!(
            IdentityPublicKey::from_bytes(&[1u8; 33]),
            Err(CoreError::InvalidKeyMaterial { .. })
        ));
        assert!(matches!(
            IdentityPublicKey::from_base64("not base64!"),
            Err(CoreError::InvalidKeyMaterial { .. })
        ));
    }

    #[test]
    fn test_public_key_serialization() {
        let public = IdentityKeyPair::generate().public_key();
        let json = serde_json::to_string(&public).unwrap();
        assert_eq!(json, format!("\"{}\"", public.to_base64()));

        let restored: IdentityPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(public, restored);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let kp = IdentityKeyPair::generate();
        let secret_b64 = BASE64.encode(kp.to_bytes());
        assert!(!format!("{kp:?}").contains(&secret_b64));
        assert_eq!(
            format!("{:?}", SessionKey::from_bytes([7; 32])),
            "SessionKey([REDACTED])"
        );
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let public = IdentityPublicKey::from_bytes(&[9u8; 32]).unwrap();
        assert_eq!(public.fingerprint().len(), 16);
        assert_eq!(public.fingerprint(), public.fingerprint());
    }

    #[test]
    fn test_session_key_equality() {
        assert_eq!(SessionKey::from_bytes([1; 32]), SessionKey::from_bytes([1; 32]));
        assert_ne!(SessionKey::from_bytes([1; 32]), SessionKey::from_bytes([2; 32]));
    }
}
