// ============================================
// File: crates/sealpost-core/src/lib.rs
// ============================================
//! # Sealpost Core - End-to-End Encryption & Wire Protocol
//!
//! ## Creation Reason
//! Everything that touches key material lives here and runs on the client.
//! The relay links this crate only for the wire protocol types; it never
//! holds a private key and cannot derive a session key.
//!
//! ## Main Functionality
//!
//! ### Crypto Module ([`crypto`])
//! - `IdentityKeyPair` / `IdentityPublicKey`: long-term X25519 identities
//! - [`crypto::exchange`]: role-aware session key derivation (X25519 + HKDF-SHA256)
//! - [`crypto::codec`]: XChaCha20-Poly1305 message sealing with random nonces
//!
//! ### Client Side
//! - [`directory`]: `IdentityDirectory` and `SecretStore` capabilities
//! - [`cache`]: `SessionKeyCache`, memoized per (peer, role)
//! - [`client`]: `SecureSession`, the seal/open path used by a client
//! - [`audit`]: out-of-band trial decryption for operators
//!
//! ### Protocol Module ([`protocol`])
//! - JSON frames exchanged with the relay and their codec
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              sealpost-server                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │   sealpost-core  ◄──   sealpost-transport           │
//! │   You are here                │                     │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │             sealpost-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Message Flow
//! ```text
//! plaintext ─► SessionKeyCache::get(peer, Initiator) ─► seal ─► relay
//!                                                              │
//! plaintext ◄─ open ◄─ SessionKeyCache::get(sender, Responder) ◄┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All primitives come from RustCrypto / dalek; do not hand-roll any
//! - Every type holding secret bytes implements `Zeroize` and redacts `Debug`
//! - The decrypting role is read from the envelope, never guessed. Only
//!   [`audit`] is allowed to try both roles.
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod cache;
pub mod client;
pub mod crypto;
pub mod directory;
pub mod error;
pub mod protocol;

pub use cache::SessionKeyCache;
pub use client::SecureSession;
pub use crypto::{
    IdentityKeyPair, IdentityPublicKey, MessageCodec, Role, SealedMessage, SessionKey,
    SessionKeyPair,
};
pub use directory::{DirectoryEntry, IdentityDirectory, SecretStore};
pub use error::{CoreError, Result};
pub use protocol::{ClientFrame, MessageEnvelope, ServerFrame, PROTOCOL_VERSION};
