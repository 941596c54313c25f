// ============================================
// File: crates/sealpost-server/src/services/directory.rs
// ============================================
//! # Directory Service
//!
//! ## Creation Reason
//! Serves registered public keys out of relay storage through the same
//! `IdentityDirectory` interface clients use.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Disabled accounts stay resolvable: peers still need the key to read
//!   history exchanged before the account was disabled
//!
//! ## Last Modified
//! v0.1.0 - Storage-backed directory

use std::sync::Arc;

use async_trait::async_trait;

use sealpost_common::IdentityId;
use sealpost_core::directory::{DirectoryEntry, IdentityDirectory};
use sealpost_core::error::{CoreError, Result as CoreResult};

use crate::services::storage::{Storage, UserRecord};

/// `IdentityDirectory` over relay storage.
#[derive(Clone)]
pub struct StorageDirectory {
    storage: Arc<dyn Storage>,
}

impl StorageDirectory {
    /// Wraps `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

impl From<&UserRecord> for DirectoryEntry {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            public_key: user.public_key,
        }
    }
}

#[async_trait]
impl IdentityDirectory for StorageDirectory {
    async fn lookup(&self, id: IdentityId) -> CoreResult<Option<DirectoryEntry>> {
        let user = self
            .storage
            .get_user(id)
            .await
            .map_err(CoreError::directory)?;
        Ok(user.as_ref().map(DirectoryEntry::from))
    }
}

impl std::fmt::Debug for StorageDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageDirectory").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{MemoryStorage, NewUser};
    use sealpost_core::crypto::IdentityKeyPair;

    #[tokio::test]
    async fn test_lookup_registered_user() {
        let storage = Arc::new(MemoryStorage::new());
        let key = IdentityKeyPair::generate().public_key();
        let alice = storage
            .create_user(NewUser {
                username: "alice".into(),
                public_key: key,
                is_admin: false,
            })
            .await
            .unwrap();

        let directory = StorageDirectory::new(storage);
        let entry = directory.lookup(alice.id).await.unwrap().unwrap();
        assert_eq!(entry.username, "alice");
        assert_eq!(entry.public_key, key);

        assert!(directory.lookup(IdentityId::new(42)).await.unwrap().is_none());
    }
}
