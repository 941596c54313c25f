// ============================================
// File: crates/sealpost-core/src/cache.rs
// ============================================
//! # Session Key Cache
//!
//! ## Creation Reason
//! Deriving a session key costs a scalar multiplication, an HKDF run, a
//! directory lookup and a secret store read. A client talks to the same
//! peers over and over, so each (peer, role) key is derived once per
//! process and kept in memory.
//!
//! ## Main Logical Flow
//! 1. `get(peer, role)` checks the map
//! 2. On a miss: own secret from `SecretStore`, peer key from
//!    `IdentityDirectory`, then `derive_pair`
//! 3. The key for `role` is inserted and returned
//!
//! ## ⚠️ Important Note for Next Developer
//! - One cache per owner identity. Never share it between identities.
//! - The lock is not held across the awaits. Two concurrent misses for the
//!   same entry both derive; derivation is deterministic, so whichever
//!   insert wins is the same key.
//! - Keys are never persisted; `clear` on logout
//!
//! ## Last Modified
//! v0.1.0 - Initial session key cache

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use sealpost_common::IdentityId;

use crate::crypto::{derive_pair, IdentityKeyPair, Role, SessionKey};
use crate::directory::{IdentityDirectory, SecretStore};
use crate::error::{CoreError, Result};

/// Memoized session keys of one identity.
pub struct SessionKeyCache {
    owner: IdentityId,
    secrets: Arc<dyn SecretStore>,
    directory: Arc<dyn IdentityDirectory>,
    keys: Mutex<HashMap<(IdentityId, Role), SessionKey>>,
}

impl SessionKeyCache {
    /// Creates an empty cache for `owner`.
    pub fn new(
        owner: IdentityId,
        secrets: Arc<dyn SecretStore>,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        Self {
            owner,
            secrets,
            directory,
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Identity this cache derives keys for.
    #[must_use]
    pub const fn owner(&self) -> IdentityId {
        self.owner
    }

    /// Returns the session key for talking to `peer` in `role`.
    ///
    /// `Initiator` yields the key for messages the owner sends to `peer`,
    /// `Responder` the key for messages the owner received from `peer`.
    ///
    /// # Errors
    /// - `MissingPrivateKey` if the secret store has no usable key for the owner
    /// - `PeerNotFound` if the directory has no record for `peer`
    /// - `InvalidKeyMaterial` if the peer's registered key is unusable
    pub async fn get(&self, peer: IdentityId, role: Role) -> Result<SessionKey> {
        if let Some(key) = self.keys.lock().get(&(peer, role)) {
            return Ok(key.clone());
        }

        let secret = self
            .secrets
            .get(self.owner)
            .await?
            .ok_or(CoreError::MissingPrivateKey {
                identity: self.owner,
            })?;
        let mine = IdentityKeyPair::from_bytes(&secret).map_err(|_| CoreError::MissingPrivateKey {
            identity: self.owner,
        })?;

        let entry = self
            .directory
            .lookup(peer)
            .await?
            .ok_or(CoreError::PeerNotFound { peer })?;

        let pair = derive_pair(&mine, &entry.public_key, role)?;
        let key = match role {
            Role::Initiator => pair.transmit,
            Role::Responder => pair.receive,
        };

        debug!(owner = %self.owner, peer = %peer, role = %role, "Derived session key");

        Ok(self
            .keys
            .lock()
            .entry((peer, role))
            .or_insert(key)
            .clone())
    }

    /// Drops both cached keys for `peer`.
    pub fn invalidate(&self, peer: IdentityId) {
        let mut keys = self.keys.lock();
        keys.remove(&(peer, Role::Initiator));
        keys.remove(&(peer, Role::Responder));
    }

    /// Drops every cached key.
    pub fn clear(&self) {
        self.keys.lock().clear();
    }

    /// Number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

impl std::fmt::Debug for SessionKeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyCache")
            .field("owner", &self.owner)
            .field("cached", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive;
    use crate::directory::{DirectoryEntry, MemoryDirectory, MemorySecretStore};

    struct Fixture {
        alice: IdentityKeyPair,
        bob: IdentityKeyPair,
        secrets: Arc<MemorySecretStore>,
        directory: Arc<MemoryDirectory>,
    }

    const ALICE: IdentityId = IdentityId::new(1);
    const BOB: IdentityId = IdentityId::new(2);

    async fn fixture() -> Fixture {
        let alice = IdentityKeyPair::generate();
        let bob = IdentityKeyPair::generate();
        let secrets = Arc::new(MemorySecretStore::new());
        secrets.put(ALICE, &alice.to_bytes()).await.unwrap();

        let directory = Arc::new(MemoryDirectory::new());
        directory.insert(DirectoryEntry {
            id: BOB,
            username: "bob".into(),
            public_key: bob.public_key(),
        });
        Fixture {
            alice,
            bob,
            secrets,
            directory,
        }
    }

    #[tokio::test]
    async fn test_get_matches_direct_derivation() {
        let fx = fixture().await;
        let cache = SessionKeyCache::new(ALICE, fx.secrets.clone(), fx.directory.clone());

        let tx = cache.get(BOB, Role::Initiator).await.unwrap();
        let expected = derive(&fx.alice.to_bytes(), fx.bob.public_key().as_bytes(), Role::Initiator).unwrap();
        assert_eq!(tx, expected);

        let bob_rx = derive(&fx.bob.to_bytes(), fx.alice.public_key().as_bytes(), Role::Responder).unwrap();
        assert_eq!(tx, bob_rx);
    }

    #[tokio::test]
    async fn test_entries_memoized_per_role() {
        let fx = fixture().await;
        let cache = SessionKeyCache::new(ALICE, fx.secrets.clone(), fx.directory.clone());

        let tx = cache.get(BOB, Role::Initiator).await.unwrap();
        let rx = cache.get(BOB, Role::Responder).await.unwrap();
        assert_ne!(tx, rx);
        assert_eq!(cache.len(), 2);

        // Served from memory even after the secret disappears.
        fx.secrets.remove(ALICE);
        assert_eq!(cache.get(BOB, Role::Initiator).await.unwrap(), tx);

        cache.invalidate(BOB);
        assert!(cache.is_empty());
        assert!(matches!(
            cache.get(BOB, Role::Initiator).await,
            Err(CoreError::MissingPrivateKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_private_key() {
        let fx = fixture().await;
        let cache = SessionKeyCache::new(IdentityId::new(99), fx.secrets.clone(), fx.directory.clone());
        assert!(matches!(
            cache.get(BOB, Role::Initiator).await,
            Err(CoreError::MissingPrivateKey { identity }) if identity == IdentityId::new(99)
        ));
    }

    #[tokio::test]
    async fn test_malformed_private_key_is_missing() {
        let fx = fixture().await;
        fx.secrets.put(ALICE, &[1, 2, 3]).await.unwrap();
        let cache = SessionKeyCache::new(ALICE, fx.secrets.clone(), fx.directory.clone());
        assert!(matches!(
            cache.get(BOB, Role::Initiator).await,
            Err(CoreError::MissingPrivateKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_peer_not_found() {
        let fx = fixture().await;
        let cache = SessionKeyCache::new(ALICE, fx.secrets.clone(), fx.directory.clone());
        assert!(matches!(
            cache.get(IdentityId::new(42), Role::Responder).await,
            Err(CoreError::PeerNotFound { peer }) if peer == IdentityId::new(42)
        ));
        assert!(cache.is_empty());
    }
}
