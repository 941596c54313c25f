// ============================================
// File: crates/sealpost-core/src/directory.rs
// ============================================
//! # Client Collaborators
//!
//! ## Creation Reason
//! Session key derivation needs two things the core does not own: the
//! peer's registered public key and the caller's own private key. Both are
//! modelled as async capabilities so a client can plug in an HTTP directory
//! or an encrypted on-disk key store.
//!
//! ## Main Functionality
//! - `IdentityDirectory` / `MemoryDirectory`: public key lookup by id
//! - `SecretStore` / `MemorySecretStore`: `get(id) -> secret?`, `put(id, secret)`
//!
//! ## Last Modified
//! v0.1.0 - Initial collaborator traits

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use sealpost_common::IdentityId;

use crate::crypto::IdentityPublicKey;
use crate::error::Result;

// ============================================
// IdentityDirectory
// ============================================

/// Public record of a registered identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    /// Identity id
    pub id: IdentityId,
    /// Display name
    pub username: String,
    /// Registered X25519 public key
    pub public_key: IdentityPublicKey,
}

/// Lookup of registered public keys.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Returns the record for `id`, or `None` if no such identity exists.
    ///
    /// # Errors
    /// `Directory` if the backend cannot be reached.
    async fn lookup(&self, id: IdentityId) -> Result<Option<DirectoryEntry>>;
}

#[async_trait]
impl<T: IdentityDirectory + ?Sized> IdentityDirectory for Arc<T> {
    async fn lookup(&self, id: IdentityId) -> Result<Option<DirectoryEntry>> {
        (**self).lookup(id).await
    }
}

/// In-memory directory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: DashMap<IdentityId, DirectoryEntry>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a record.
    pub fn insert(&self, entry: DirectoryEntry) {
        self.entries.insert(entry.id, entry);
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl IdentityDirectory for MemoryDirectory {
    async fn lookup(&self, id: IdentityId) -> Result<Option<DirectoryEntry>> {
        Ok(self.entries.get(&id).map(|e| e.value().clone()))
    }
}

// ============================================
// SecretStore
// ============================================

/// Client-local storage of private keys.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the stored secret for `id`, if any.
    ///
    /// # Errors
    /// `SecretStore` if the backend fails.
    async fn get(&self, id: IdentityId) -> Result<Option<Zeroizing<Vec<u8>>>>;

    /// Stores `secret` for `id`, replacing any previous value.
    ///
    /// # Errors
    /// `SecretStore` if the backend fails.
    async fn put(&self, id: IdentityId, secret: &[u8]) -> Result<()>;
}

#[async_trait]
impl<T: SecretStore + ?Sized> SecretStore for Arc<T> {
    async fn get(&self, id: IdentityId) -> Result<Option<Zeroizing<Vec<u8>>>> {
        (**self).get(id).await
    }

    async fn put(&self, id: IdentityId, secret: &[u8]) -> Result<()> {
        (**self).put(id, secret).await
    }
}

/// Volatile secret store. Secrets are zeroed when removed or dropped.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: DashMap<IdentityId, Zeroizing<Vec<u8>>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the secret for `id`. Returns `true` if one was stored.
    pub fn remove(&self, id: IdentityId) -> bool {
        self.secrets.remove(&id).is_some()
    }
}

impl std::fmt::Debug for MemorySecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySecretStore")
            .field("entries", &self.secrets.len())
            .finish()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, id: IdentityId) -> Result<Option<Zeroizing<Vec<u8>>>> {
        Ok(self.secrets.get(&id).map(|s| s.value().clone()))
    }

    async fn put(&self, id: IdentityId, secret: &[u8]) -> Result<()> {
        self.secrets.insert(id, Zeroizing::new(secret.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::IdentityKeyPair;

    #[tokio::test]
    async fn test_memory_directory_lookup() {
        let directory = MemoryDirectory::new();
        let public_key = IdentityKeyPair::generate().public_key();
        directory.insert(DirectoryEntry {
            id: IdentityId::new(1),
            username: "alice".into(),
            public_key,
        });

        let found = directory.lookup(IdentityId::new(1)).await.unwrap().unwrap();
        assert_eq!(found.public_key, public_key);
        assert!(directory.lookup(IdentityId::new(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_secret_store_put_get_remove() {
        let store = MemorySecretStore::new();
        let id = IdentityId::new(5);
        assert!(store.get(id).await.unwrap().is_none());

        store.put(id, &[1, 2, 3]).await.unwrap();
        assert_eq!(store.get(id).await.unwrap().unwrap().as_slice(), &[1, 2, 3]);

        assert!(store.remove(id));
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[test]
    fn test_directory_entry_wire_format() {
        let entry = DirectoryEntry {
            id: IdentityId::new(3),
            username: "bob".into(),
            public_key: IdentityPublicKey::from_bytes(&[0u8; 32]).unwrap(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["publicKey"], "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=");
    }
}
