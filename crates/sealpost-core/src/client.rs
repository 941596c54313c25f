// ============================================
// File: crates/sealpost-core/src/client.rs
// ============================================
//! # Secure Session (client side)
//!
//! ## Creation Reason
//! Ties the key cache and the message codec together into the two calls a
//! client actually makes: seal a plaintext for a peer, and open an
//! envelope it sent or received.
//!
//! ## Role Selection
//! ```text
//! envelope.sender   == me  →  Initiator, peer = envelope.receiver
//! envelope.receiver == me  →  Responder, peer = envelope.sender
//! otherwise                →  not ours, refuse
//! ```
//! The role always comes from the envelope fields. Keys are never tried
//! in turn.
//!
//! ## ⚠️ Important Note for Next Developer
//! - A failed `open` affects only that message. Callers should report it
//!   and keep processing the stream.
//!
//! ## Last Modified
//! v0.1.0 - Initial secure session

use std::sync::Arc;

use tracing::{debug, warn};

use sealpost_common::{CommonError, IdentityId};

use crate::cache::SessionKeyCache;
use crate::crypto::{MessageCodec, Role, XChaChaCodec};
use crate::directory::{IdentityDirectory, SecretStore};
use crate::error::{CoreError, Result};
use crate::protocol::{InboundMessage, MessageEnvelope, OutgoingMessage};

/// Determines the owner's role for an envelope between `sender` and
/// `receiver`, together with the peer to derive against.
///
/// Returns `None` if `owner` is not a party to the envelope.
#[must_use]
pub fn role_for(owner: IdentityId, sender: IdentityId, receiver: IdentityId) -> Option<(Role, IdentityId)> {
    if sender == owner {
        Some((Role::Initiator, receiver))
    } else if receiver == owner {
        Some((Role::Responder, sender))
    } else {
        None
    }
}

/// One identity's encrypt/decrypt path.
pub struct SecureSession<C: MessageCodec = XChaChaCodec> {
    cache: SessionKeyCache,
    codec: C,
}

impl SecureSession<XChaChaCodec> {
    /// Creates a session for `owner` with the default codec.
    pub fn new(
        owner: IdentityId,
        secrets: Arc<dyn SecretStore>,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        Self::with_codec(owner, secrets, directory, XChaChaCodec::new())
    }
}

impl<C: MessageCodec> SecureSession<C> {
    /// Creates a session with a custom codec.
    pub fn with_codec(
        owner: IdentityId,
        secrets: Arc<dyn SecretStore>,
        directory: Arc<dyn IdentityDirectory>,
        codec: C,
    ) -> Self {
        Self {
            cache: SessionKeyCache::new(owner, secrets, directory),
            codec,
        }
    }

    /// Identity this session acts for.
    #[must_use]
    pub const fn owner(&self) -> IdentityId {
        self.cache.owner()
    }

    /// Key cache backing this session.
    #[must_use]
    pub const fn cache(&self) -> &SessionKeyCache {
        &self.cache
    }

    /// Encrypts `plaintext` for `to`.
    ///
    /// # Errors
    /// Key cache errors (`MissingPrivateKey`, `PeerNotFound`, ...) or codec errors.
    pub async fn seal(&self, to: IdentityId, plaintext: &[u8]) -> Result<OutgoingMessage> {
        let key = self.cache.get(to, Role::Initiator).await?;
        let sealed = self.codec.encrypt(&key, plaintext)?;
        debug!(owner = %self.owner(), to = %to, size = plaintext.len(), "Sealed message");
        Ok(OutgoingMessage {
            to,
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce.to_vec(),
        })
    }

    /// Decrypts a stored envelope the owner sent or received.
    ///
    /// # Errors
    /// - `InvalidInput` if the owner is not a party to the envelope
    /// - `AuthenticationFailure` if the ciphertext does not verify
    pub async fn open(&self, envelope: &MessageEnvelope) -> Result<Vec<u8>> {
        let (role, peer) = role_for(self.owner(), envelope.sender, envelope.receiver).ok_or_else(|| {
            CoreError::Common(CommonError::invalid_input(
                "envelope",
                "session owner is neither sender nor receiver",
            ))
        })?;
        self.open_with(peer, role, &envelope.ciphertext, &envelope.nonce)
            .await
            .map_err(|e| {
                warn!(owner = %self.owner(), message_id = %envelope.id, error = %e, "Failed to open envelope");
                e
            })
    }

    /// Decrypts a live delivery. The owner is always its receiver.
    ///
    /// # Errors
    /// `AuthenticationFailure` if the ciphertext does not verify.
    pub async fn open_delivery(&self, delivery: &InboundMessage) -> Result<Vec<u8>> {
        self.open_with(delivery.from, Role::Responder, &delivery.ciphertext, &delivery.nonce)
            .await
            .map_err(|e| {
                warn!(owner = %self.owner(), message_id = %delivery.id, error = %e, "Failed to open delivery");
                e
            })
    }

    /// Forgets every derived key, e.g. on logout.
    pub fn logout(&self) {
        self.cache.clear();
    }

    async fn open_with(&self, peer: IdentityId, role: Role, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
        let key = self.cache.get(peer, role).await?;
        self.codec.decrypt(&key, ciphertext, nonce)
    }
}

impl<C: MessageCodec> std::fmt::Debug for SecureSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSession")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::IdentityKeyPair;
    use crate::directory::{DirectoryEntry, MemoryDirectory, MemorySecretStore};
    use sealpost_common::{MessageId, Timestamp};

    const ALICE: IdentityId = IdentityId::new(1);
    const BOB: IdentityId = IdentityId::new(2);
    const CAROL: IdentityId = IdentityId::new(3);

    async fn sessions() -> (SecureSession, SecureSession, SecureSession) {
        let directory = Arc::new(MemoryDirectory::new());
        let mut out = Vec::new();
        for (id, name) in [(ALICE, "alice"), (BOB, "bob"), (CAROL, "carol")] {
            let keys = IdentityKeyPair::generate();
            directory.insert(DirectoryEntry {
                id,
                username: name.into(),
                public_key: keys.public_key(),
            });
            let secrets = Arc::new(MemorySecretStore::new());
            secrets.put(id, &keys.to_bytes()).await.unwrap();
            out.push(SecureSession::new(id, secrets, directory.clone()));
        }
        let carol = out.pop().unwrap();
        let bob = out.pop().unwrap();
        let alice = out.pop().unwrap();
        (alice, bob, carol)
    }

    fn stored(outgoing: &OutgoingMessage, from: IdentityId) -> MessageEnvelope {
        MessageEnvelope {
            id: MessageId::new(1),
            sender: from,
            receiver: outgoing.to,
            ciphertext: outgoing.ciphertext.clone(),
            nonce: outgoing.nonce.clone(),
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_role_for() {
        assert_eq!(role_for(ALICE, ALICE, BOB), Some((Role::Initiator, BOB)));
        assert_eq!(role_for(BOB, ALICE, BOB), Some((Role::Responder, ALICE)));
        assert_eq!(role_for(CAROL, ALICE, BOB), None);
    }

    #[tokio::test]
    async fn test_both_parties_can_open_history() {
        let (alice, bob, _) = sessions().await;
        let outgoing = alice.seal(BOB, b"hello").await.unwrap();
        let envelope = stored(&outgoing, ALICE);

        assert_eq!(bob.open(&envelope).await.unwrap(), b"hello");
        assert_eq!(alice.open(&envelope).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_open_live_delivery() {
        let (alice, bob, _) = sessions().await;
        let outgoing = bob.seal(ALICE, b"hi back").await.unwrap();
        let delivery = InboundMessage::from(&stored(&outgoing, BOB));
        assert_eq!(alice.open_delivery(&delivery).await.unwrap(), b"hi back");
    }

    #[tokio::test]
    async fn test_third_party_cannot_open() {
        let (alice, _, carol) = sessions().await;
        let outgoing = alice.seal(BOB, b"private").await.unwrap();
        let envelope = stored(&outgoing, ALICE);

        assert!(carol.open(&envelope).await.is_err());

        // Even when the delivery is misrouted to Carol, it does not verify.
        let delivery = InboundMessage::from(&envelope);
        assert!(matches!(
            carol.open_delivery(&delivery).await,
            Err(CoreError::AuthenticationFailure)
        ));
    }

    #[tokio::test]
    async fn test_bad_message_does_not_poison_session() {
        let (alice, bob, _) = sessions().await;
        let mut bad = stored(&alice.seal(BOB, b"one").await.unwrap(), ALICE);
        bad.ciphertext[0] ^= 0xFF;
        let good = stored(&alice.seal(BOB, b"two").await.unwrap(), ALICE);

        assert!(matches!(bob.open(&bad).await, Err(CoreError::AuthenticationFailure)));
        assert_eq!(bob.open(&good).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_logout_clears_keys() {
        let (alice, _, _) = sessions().await;
        alice.seal(BOB, b"x").await.unwrap();
        assert!(!alice.cache().is_empty());
        alice.logout();
        assert!(alice.cache().is_empty());
    }
}
