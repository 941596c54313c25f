// ============================================
// File: crates/sealpost-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Groups the primitives of the end-to-end protocol: long-term identity
//! keys, per-pair session key derivation, and message sealing.
//!
//! ### Submodules
//! - [`keys`]: `IdentityKeyPair`, `IdentityPublicKey`, `SessionKey`
//! - [`exchange`]: `derive` / `derive_pair` (X25519 + HKDF-SHA256)
//! - [`codec`]: `MessageCodec` (XChaCha20-Poly1305)
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Session Key Derivation                     │
//! │  Alice (initiator)                     Bob (responder)      │
//! │    a, A = a·G                            b, B = b·G         │
//! │        │                                     │              │
//! │        └──── X25519(a, B) == X25519(b, A) ───┘              │
//! │                          │                                  │
//! │     HKDF-SHA256(salt, info = prefix || A || B, L = 64)      │
//! │                          │                                  │
//! │            okm[0..32]  = Alice → Bob key                    │
//! │            okm[32..64] = Bob → Alice key                    │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Message Sealing                         │
//! │   SessionKey + random 24-byte nonce ──► XChaCha20-Poly1305  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Identity keys are static; there is no forward secrecy beyond that
//! - Nonces are random per call, never derived from a counter
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod codec;
pub mod exchange;
pub mod keys;

pub use codec::{MessageCodec, SealedMessage, XChaChaCodec};
pub use exchange::{derive, derive_pair, Role};
pub use keys::{IdentityKeyPair, IdentityPublicKey, SessionKey, SessionKeyPair};

// ============================================
// Constants
// ============================================

/// Size of an X25519 public key in bytes.
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of an X25519 private scalar in bytes.
pub const X25519_SECRET_KEY_SIZE: usize = 32;

/// Size of a session key in bytes.
pub const SESSION_KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce in bytes.
pub const XCHACHA20_NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag in bytes.
pub const POLY1305_TAG_SIZE: usize = 16;

/// HKDF salt for session key derivation.
pub const KX_SALT: &[u8] = b"sealpost-kx-v1";

/// HKDF info prefix for session key derivation.
pub const KX_INFO_PREFIX: &[u8] = b"sealpost-session-keys";
