// ============================================
// File: crates/sealpost-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines the failure taxonomy of the encryption protocol and the wire
//! protocol, shared by clients and the relay.
//!
//! ## Error Categories
//! 1. **Crypto**: `InvalidKeyMaterial`, `AuthenticationFailure`, derivation
//! 2. **Preconditions**: `MissingPrivateKey`, `PeerNotFound`. The caller can
//!    fix these (import a key, register the peer) and try again
//! 3. **Protocol**: malformed or oversized frames
//! 4. **Collaborators**: directory / secret store I/O failures
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material or plaintext in error messages
//! - `AuthenticationFailure` must stay a unit variant: no partial data, no
//!   hint about which check failed
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use sealpost_common::{CommonError, IdentityId};

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types for key exchange, message sealing and framing.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Key bytes are not a usable X25519 scalar or point.
    #[error("Invalid key material: {reason}")]
    InvalidKeyMaterial {
        /// What is wrong with the key
        reason: String,
    },

    /// Ciphertext did not authenticate under the given key and nonce.
    #[error("Message authentication failed")]
    AuthenticationFailure,

    /// HKDF expansion failed.
    #[error("Key derivation failed: {reason}")]
    KeyDerivation {
        /// Why derivation failed
        reason: String,
    },

    /// AEAD encryption failed.
    #[error("Encryption failed: {context}")]
    Encryption {
        /// What was being encrypted
        context: String,
    },

    /// Plaintext or frame exceeds the allowed size.
    #[error("Message too large: max {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Maximum allowed size
        max: usize,
        /// Actual size
        actual: usize,
    },

    // ========================================
    // Precondition Errors
    // ========================================

    /// The local secret store has no private key for this identity.
    #[error("No private key stored for identity {identity}")]
    MissingPrivateKey {
        /// Identity whose key is missing
        identity: IdentityId,
    },

    /// The identity directory has no record for the peer.
    #[error("Peer {peer} not found in directory")]
    PeerNotFound {
        /// Peer that was looked up
        peer: IdentityId,
    },

    // ========================================
    // Protocol Errors
    // ========================================

    /// Frame could not be parsed.
    #[error("Malformed frame: {reason}")]
    MalformedFrame {
        /// Parser message
        reason: String,
    },

    /// Frame could not be serialized.
    #[error("Frame encoding failed: {reason}")]
    FrameEncoding {
        /// Serializer message
        reason: String,
    },

    // ========================================
    // Collaborator Errors
    // ========================================

    /// Identity directory lookup failed.
    #[error("Directory lookup failed: {reason}")]
    Directory {
        /// Backend message
        reason: String,
    },

    /// Local secret storage failed.
    #[error("Secret store failed: {reason}")]
    SecretStore {
        /// Backend message
        reason: String,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    /// Creates an `InvalidKeyMaterial` error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKeyMaterial {
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedFrame` error.
    pub fn malformed(reason: impl ToString) -> Self {
        Self::MalformedFrame {
            reason: reason.to_string(),
        }
    }

    /// Creates a `MessageTooLarge` error.
    #[must_use]
    pub const fn too_large(max: usize, actual: usize) -> Self {
        Self::MessageTooLarge { max, actual }
    }

    /// Creates a `Directory` error.
    pub fn directory(reason: impl ToString) -> Self {
        Self::Directory {
            reason: reason.to_string(),
        }
    }

    /// Creates a `SecretStore` error.
    pub fn secret_store(reason: impl ToString) -> Self {
        Self::SecretStore {
            reason: reason.to_string(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this is a cryptographic error.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKeyMaterial { .. }
                | Self::AuthenticationFailure
                | Self::KeyDerivation { .. }
                | Self::Encryption { .. }
        )
    }

    /// Returns `true` if this is a framing error.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. } | Self::FrameEncoding { .. } | Self::MessageTooLarge { .. }
        )
    }

    /// Returns `true` for local preconditions the caller can fix and retry.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingPrivateKey { .. } | Self::PeerNotFound { .. }
        )
    }

    /// Returns `true` if this error might indicate tampering.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(self, Self::AuthenticationFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::PeerNotFound {
            peer: IdentityId::new(7),
        };
        assert_eq!(err.to_string(), "Peer 7 not found in directory");
        assert_eq!(
            CoreError::AuthenticationFailure.to_string(),
            "Message authentication failed"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::AuthenticationFailure.is_crypto_error());
        assert!(CoreError::AuthenticationFailure.is_suspicious());
        assert!(CoreError::invalid_key("low order").is_crypto_error());

        let missing = CoreError::MissingPrivateKey {
            identity: IdentityId::new(1),
        };
        assert!(missing.is_precondition());
        assert!(!missing.is_crypto_error());

        assert!(CoreError::malformed("eof").is_protocol_error());
        assert!(CoreError::too_large(10, 11).is_protocol_error());
    }

    #[test]
    fn test_common_error_conversion() {
        let common = CommonError::invalid_input("field", "bad value");
        let core: CoreError = common.into();
        assert!(matches!(core, CoreError::Common(_)));
    }
}
