// ============================================
// File: crates/sealpost-core/src/crypto/exchange.rs
// ============================================
//! # Session Key Exchange
//!
//! ## Creation Reason
//! Two clients derive matching session keys independently from their own
//! private key and the other's public key, without any interaction.
//!
//! ## Main Functionality
//! - `Role`: which side of the pair the caller is on
//! - `derive_pair`: both directional keys for the caller
//! - `derive`: the key for the initiator → responder direction
//!
//! ## Derivation
//! ```text
//! shared = X25519(my_secret, their_public)        (must be contributory)
//! okm    = HKDF-SHA256(salt = KX_SALT,
//!                      ikm  = shared,
//!                      info = KX_INFO_PREFIX || initiator_pub || responder_pub,
//!                      L    = 64)
//!
//!              initiator          responder
//! okm[0..32]   transmit     ==    receive
//! okm[32..64]  receive      ==    transmit
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Pure and deterministic: same inputs give byte-identical keys on any
//!   machine. Do not add randomness or context that only one side knows.
//! - The public keys are ordered by role, not by value. Swapping the role
//!   yields a different (but still symmetric) key pair.
//!
//! ## Last Modified
//! v0.1.0 - Initial key exchange

use std::fmt;

use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::keys::{IdentityKeyPair, IdentityPublicKey, SessionKey, SessionKeyPair};
use super::{KX_INFO_PREFIX, KX_SALT, SESSION_KEY_SIZE, X25519_PUBLIC_KEY_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// Role
// ============================================

/// Which side of a pairwise session the caller plays.
///
/// For a message from S to R, S derives as `Initiator` with peer R and R
/// derives as `Responder` with peer S.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The party that sent the message.
    Initiator,
    /// The party that received the message.
    Responder,
}

impl Role {
    /// Returns the other role.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Initiator => Self::Responder,
            Self::Responder => Self::Initiator,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiator => f.write_str("initiator"),
            Self::Responder => f.write_str("responder"),
        }
    }
}

// ============================================
// Derivation
// ============================================

/// Derives the session key for the initiator → responder direction.
///
/// For the initiator this is its transmit key; for the responder it is its
/// receive key. Hence
/// `derive(a, B, Initiator) == derive(b, A, Responder)`.
///
/// # Arguments
/// * `my_private_key` - 32-byte X25519 scalar of the caller
/// * `their_public_key` - 32-byte X25519 point of the peer
/// * `role` - the caller's role
///
/// # Errors
/// `InvalidKeyMaterial` on wrong key lengths or a low-order peer point.
pub fn derive(my_private_key: &[u8], their_public_key: &[u8], role: Role) -> Result<SessionKey> {
    let keypair = IdentityKeyPair::from_bytes(my_private_key)?;
    let peer = IdentityPublicKey::from_bytes(their_public_key)?;
    let pair = derive_pair(&keypair, &peer, role)?;
    Ok(match role {
        Role::Initiator => pair.transmit,
        Role::Responder => pair.receive,
    })
}

/// Derives both directional keys for the caller.
///
/// # Errors
/// `InvalidKeyMaterial` if the peer key is a low-order point (the shared
/// secret would be all zeros), `KeyDerivation` if HKDF fails.
pub fn derive_pair(
    mine: &IdentityKeyPair,
    peer: &IdentityPublicKey,
    role: Role,
) -> Result<SessionKeyPair> {
    let shared = mine.diffie_hellman(peer);
    if !shared.was_contributory() {
        return Err(CoreError::invalid_key("peer public key is a low-order point"));
    }

    let my_public = mine.public_key();
    let (initiator, responder) = match role {
        Role::Initiator => (&my_public, peer),
        Role::Responder => (peer, &my_public),
    };

    let mut info = Vec::with_capacity(KX_INFO_PREFIX.len() + X25519_PUBLIC_KEY_SIZE * 2);
    info.extend_from_slice(KX_INFO_PREFIX);
    info.extend_from_slice(initiator.as_bytes());
    info.extend_from_slice(responder.as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(KX_SALT), shared.as_bytes());
    let mut okm = Zeroizing::new([0u8; SESSION_KEY_SIZE * 2]);
    hk.expand(&info, &mut okm[..])
        .map_err(|_| CoreError::KeyDerivation {
            reason: "HKDF expansion failed".into(),
        })?;

    let mut forward = [0u8; SESSION_KEY_SIZE];
    let mut backward = [0u8; SESSION_KEY_SIZE];
    forward.copy_from_slice(&okm[..SESSION_KEY_SIZE]);
    backward.copy_from_slice(&okm[SESSION_KEY_SIZE..]);
    let forward = SessionKey::from_bytes(forward);
    let backward = SessionKey::from_bytes(backward);

    Ok(match role {
        Role::Initiator => SessionKeyPair {
            transmit: forward,
            receive: backward,
        },
        Role::Responder => SessionKeyPair {
            transmit: backward,
            receive: forward,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (IdentityKeyPair, IdentityKeyPair) {
        (IdentityKeyPair::generate(), IdentityKeyPair::generate())
    }

    #[test]
    fn test_initiator_transmit_matches_responder_receive() {
        let (alice, bob) = pair();
        let a = alice.to_bytes();
        let b = bob.to_bytes();
        let a_pub = alice.public_key();
        let b_pub = bob.public_key();

        let alice_tx = derive(&a, b_pub.as_bytes(), Role::Initiator).unwrap();
        let bob_rx = derive(&b, a_pub.as_bytes(), Role::Responder).unwrap();
        assert_eq!(alice_tx, bob_rx);

        // Reverse direction: Bob sends, Alice receives.
        let bob_tx = derive(&b, a_pub.as_bytes(), Role::Initiator).unwrap();
        let alice_rx = derive(&a, b_pub.as_bytes(), Role::Responder).unwrap();
        assert_eq!(bob_tx, alice_rx);
        assert_ne!(alice_tx, bob_tx);
    }

    #[test]
    fn test_pairs_are_complementary() {
        let (alice, bob) = pair();
        let alice_keys = derive_pair(&alice, &bob.public_key(), Role::Initiator).unwrap();
        let bob_keys = derive_pair(&bob, &alice.public_key(), Role::Responder).unwrap();

        assert_eq!(alice_keys.transmit, bob_keys.receive);
        assert_eq!(alice_keys.receive, bob_keys.transmit);
        assert_ne!(alice_keys.transmit, alice_keys.receive);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let (alice, bob) = pair();
        let first = derive(&alice.to_bytes(), bob.public_key().as_bytes(), Role::Initiator).unwrap();
        let second = derive(&alice.to_bytes(), bob.public_key().as_bytes(), Role::Initiator).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_peers_give_different_keys() {
        let alice = IdentityKeyPair::generate();
        let bob = IdentityKeyPair::generate();
        let carol = IdentityKeyPair::generate();

        let with_bob = derive_pair(&alice, &bob.public_key(), Role::Initiator).unwrap();
        let with_carol = derive_pair(&alice, &carol.public_key(), Role::Initiator).unwrap();
        assert_ne!(with_bob.transmit, with_carol.transmit);
    }

    #[test]
    fn test_low_order_point_rejected() {
        let alice = IdentityKeyPair::generate();
        let identity_point = IdentityPublicKey::from_bytes(&[0u8; 32]).unwrap();
        assert!(matches!(
            derive_pair(&alice, &identity_point, Role::Initiator),
            Err(CoreError::InvalidKeyMaterial { .. })
        ));

        let mut order_one = [0u8; 32];
        order_one[0] = 1;
        assert!(matches!(
            derive(&alice.to_bytes(), &order_one, Role::Responder),
            Err(CoreError::InvalidKeyMaterial { .. })
        ));
    }

    #[test]
    fn test_malformed_key_lengths_rejected() {
        let alice = IdentityKeyPair::generate();
        let bob = IdentityKeyPair::generate();
        assert!(matches!(
            derive(&alice.to_bytes()[..16], bob.public_key().as_bytes(), Role::Initiator),
            Err(CoreError::InvalidKeyMaterial { .. })
        ));
        assert!(matches!(
            derive(&alice.to_bytes(), &[5u8; 12], Role::Initiator),
            Err(CoreError::InvalidKeyMaterial { .. })
        ));
    }

    #[test]
    fn test_role_opposite() {
        assert_eq!(Role::Initiator.opposite(), Role::Responder);
        assert_eq!(Role::Responder.opposite().to_string(), "initiator");
    }
}
