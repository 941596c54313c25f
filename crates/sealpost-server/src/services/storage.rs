// ============================================
// File: crates/sealpost-server/src/services/storage.rs
// ============================================
//! # Storage Service
//!
//! ## Creation Reason
//! Abstracts persistence of accounts and message envelopes so the relay can
//! be tested without any particular storage engine.
//!
//! ## Main Functionality
//! - `Storage`: async capability trait (users + messages)
//! - `MemoryStorage`: volatile backend
//! - `FileStorage`: append-only JSON-lines journal, replayed at open
//! - `open_storage`: picks a backend from configuration
//!
//! ## Journal Format
//! ```text
//! {"op":"userCreated","id":1,"username":"alice","publicKey":"...",...}
//! {"op":"messageAppended","id":1,"sender":1,"receiver":2,...}
//! {"op":"userDisabled","id":2,"disabled":true}
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The relay serializes `append_message` calls itself; backends only
//!   need to be internally consistent
//! - `messages_between` returns envelopes sorted by `(created_at, id)`
//! - A torn final journal line (crash mid-write) is skipped with a warning.
//!   Any other unreadable line fails the open
//! - A failed append is cut back to the last complete line before the
//!   next record is written
//!
//! ## Last Modified
//! v0.1.0 - Memory and file backends

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use sealpost_common::{CommonError, IdentityId, MessageId, Timestamp};
use sealpost_core::crypto::IdentityPublicKey;
use sealpost_core::protocol::MessageEnvelope;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Result, ServerError};

// ============================================
// Records
// ============================================

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Identity id, assigned from 1
    pub id: IdentityId,
    /// Unique login name
    pub username: String,
    /// Registered X25519 public key
    pub public_key: IdentityPublicKey,
    /// May use the audit and account toggles
    pub is_admin: bool,
    /// Disabled accounts cannot connect
    pub disabled: bool,
    /// Registration time
    pub created_at: Timestamp,
}

/// Input to [`Storage::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Requested login name
    pub username: String,
    /// Public key to register
    pub public_key: IdentityPublicKey,
    /// Grant the admin role
    pub is_admin: bool,
}

// ============================================
// Storage Trait
// ============================================

/// Persistence capability used by the relay.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the account with `id`.
    async fn get_user(&self, id: IdentityId) -> Result<Option<UserRecord>>;

    /// Returns the account named `username`.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Registers a new account.
    ///
    /// # Errors
    /// `Common(AlreadyExists)` if the username is taken.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord>;

    /// All accounts, by id.
    async fn list_users(&self) -> Result<Vec<UserRecord>>;

    /// Sets the disabled flag and returns the updated record.
    ///
    /// # Errors
    /// `UserNotFound` for an unknown id.
    async fn set_user_disabled(&self, id: IdentityId, disabled: bool) -> Result<UserRecord>;

    /// Persists an envelope.
    async fn append_message(&self, envelope: &MessageEnvelope) -> Result<()>;

    /// Envelopes between `a` and `b` in either direction, oldest first.
    async fn messages_between(&self, a: IdentityId, b: IdentityId) -> Result<Vec<MessageEnvelope>>;

    /// Every stored envelope, oldest first.
    async fn all_messages(&self) -> Result<Vec<MessageEnvelope>>;

    /// The most recently appended envelope.
    async fn last_message(&self) -> Result<Option<MessageEnvelope>>;

    /// Id of the most recently appended envelope.
    async fn last_message_id(&self) -> Result<Option<MessageId>> {
        Ok(self.last_message().await?.map(|m| m.id))
    }
}

// ============================================
// Shared State
// ============================================

#[derive(Debug, Default)]
struct StoreState {
    users: BTreeMap<IdentityId, UserRecord>,
    messages: Vec<MessageEnvelope>,
}

impl StoreState {
    fn username_taken(&self, username: &str) -> bool {
        self.users.values().any(|u| u.username == username)
    }

    fn next_user_id(&self) -> IdentityId {
        self.users
            .keys()
            .next_back()
            .map_or(IdentityId::new(1), |id| IdentityId::new(id.get() + 1))
    }

    fn prepare_user(&self, user: NewUser) -> Result<UserRecord> {
        if user.username.trim().is_empty() {
            return Err(CommonError::invalid_input("username", "must not be empty").into());
        }
        if self.username_taken(&user.username) {
            return Err(CommonError::already_exists("user", &user.username).into());
        }
        Ok(UserRecord {
            id: self.next_user_id(),
            username: user.username,
            public_key: user.public_key,
            is_admin: user.is_admin,
            disabled: false,
            created_at: Timestamp::now(),
        })
    }

    fn between(&self, a: IdentityId, b: IdentityId) -> Vec<MessageEnvelope> {
        let mut found: Vec<_> = self
            .messages
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect();
        found.sort_by_key(|m| (m.created_at, m.id));
        found
    }

    fn sorted_messages(&self) -> Vec<MessageEnvelope> {
        let mut all = self.messages.clone();
        all.sort_by_key(|m| (m.created_at, m.id));
        all
    }

    fn apply(&mut self, record: JournalRecord) {
        match record {
            JournalRecord::UserCreated(user) => {
                self.users.insert(user.id, user);
            }
            JournalRecord::UserDisabled { id, disabled } => {
                if let Some(user) = self.users.get_mut(&id) {
                    user.disabled = disabled;
                }
            }
            JournalRecord::MessageAppended(envelope) => self.messages.push(envelope),
        }
    }
}

// ============================================
// MemoryStorage
// ============================================

/// Volatile storage backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<StoreState>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_user(&self, id: IdentityId) -> Result<Option<UserRecord>> {
        Ok(self.state.read().users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        let mut state = self.state.write();
        let record = state.prepare_user(user)?;
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        Ok(self.state.read().users.values().cloned().collect())
    }

    async fn set_user_disabled(&self, id: IdentityId, disabled: bool) -> Result<UserRecord> {
        let mut state = self.state.write();
        let user = state.users.get_mut(&id).ok_or(ServerError::UserNotFound(id))?;
        user.disabled = disabled;
        Ok(user.clone())
    }

    async fn append_message(&self, envelope: &MessageEnvelope) -> Result<()> {
        self.state.write().messages.push(envelope.clone());
        Ok(())
    }

    async fn messages_between(&self, a: IdentityId, b: IdentityId) -> Result<Vec<MessageEnvelope>> {
        Ok(self.state.read().between(a, b))
    }

    async fn all_messages(&self) -> Result<Vec<MessageEnvelope>> {
        Ok(self.state.read().sorted_messages())
    }

    async fn last_message(&self) -> Result<Option<MessageEnvelope>> {
        Ok(self.state.read().messages.last().cloned())
    }
}

// ============================================
// FileStorage
// ============================================

/// One journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum JournalRecord {
    UserCreated(UserRecord),
    UserDisabled { id: IdentityId, disabled: bool },
    MessageAppended(MessageEnvelope),
}

/// Journal-backed storage.
///
/// Reads are served from memory; every mutation is appended to the journal
/// before it becomes visible.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    state: RwLock<StoreState>,
    journal: Mutex<Journal>,
}

/// Append handle plus the length of the intact journal.
#[derive(Debug)]
struct Journal {
    file: tokio::fs::File,
    len: u64,
}

impl Journal {
    /// Appends one complete line. On failure the file is cut back to the
    /// last complete line, so a partial write never prefixes the next one.
    async fn append(&mut self, path: &Path, line: &[u8]) -> std::io::Result<()> {
        let on_disk = self.file.metadata().await?.len();
        if on_disk != self.len {
            warn!(path = %path.display(), expected = self.len, on_disk, "Cutting stray bytes off the journal");
            self.file.set_len(self.len).await?;
        }

        let written = async {
            self.file.write_all(line).await?;
            self.file.flush().await
        }
        .await;

        if let Err(e) = written {
            if let Err(rollback) = self.file.set_len(self.len).await {
                warn!(path = %path.display(), error = %rollback, "Journal rollback failed");
            }
            return Err(e);
        }
        self.len += line.len() as u64;
        Ok(())
    }
}

impl FileStorage {
    /// Opens (or creates) the journal at `path` and replays it.
    ///
    /// # Errors
    /// `Storage` if the file cannot be opened or contains a corrupt record.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServerError::storage(format!("{}: {e}", parent.display())))?;
        }

        let mut missing_newline = false;
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let replayed = replay(&path, &content)?;
                if replayed.valid_len < content.len() {
                    truncate(&path, replayed.valid_len).await?;
                }
                missing_newline = replayed.missing_newline;
                replayed.state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(ServerError::storage(format!("{}: {e}", path.display()))),
        };

        let mut journal = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ServerError::storage(format!("{}: {e}", path.display())))?;

        if missing_newline {
            journal.write_all(b"\n").await.map_err(ServerError::storage)?;
            journal.flush().await.map_err(ServerError::storage)?;
        }
        let len = journal.metadata().await.map_err(ServerError::storage)?.len();

        info!(
            path = %path.display(),
            users = state.users.len(),
            messages = state.messages.len(),
            "Storage journal opened"
        );

        Ok(Self {
            path,
            state: RwLock::new(state),
            journal: Mutex::new(Journal { file: journal, len }),
        })
    }

    /// Journal location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, journal: &mut Journal, record: &JournalRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).map_err(ServerError::storage)?;
        line.push('\n');
        journal
            .append(&self.path, line.as_bytes())
            .await
            .map_err(|e| ServerError::storage(format!("{}: {e}", self.path.display())))
    }
}

/// Result of reading a journal back.
struct Replayed {
    state: StoreState,
    /// Length of the intact prefix
    valid_len: usize,
    /// The last intact record has no trailing newline
    missing_newline: bool,
}

fn replay(path: &Path, content: &str) -> Result<Replayed> {
    let mut replayed = Replayed {
        state: StoreState::default(),
        valid_len: 0,
        missing_newline: false,
    };

    for (index, line) in content.split_inclusive('\n').enumerate() {
        let complete = line.ends_with('\n');
        if line.trim().is_empty() {
            replayed.valid_len += line.len();
            continue;
        }
        match serde_json::from_str::<JournalRecord>(line) {
            Ok(record) => {
                replayed.state.apply(record);
                replayed.valid_len += line.len();
                replayed.missing_newline = !complete;
            }
            Err(e) if !complete => {
                warn!(path = %path.display(), line = index + 1, error = %e, "Discarding torn final journal line");
            }
            Err(e) => {
                return Err(ServerError::storage(format!(
                    "{}:{}: {e}",
                    path.display(),
                    index + 1
                )));
            }
        }
    }

    debug!(path = %path.display(), bytes = replayed.valid_len, "Journal replayed");
    Ok(replayed)
}

async fn truncate(path: &Path, len: usize) -> Result<()> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(ServerError::storage)?;
    file.set_len(len as u64).await.map_err(ServerError::storage)
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_user(&self, id: IdentityId) -> Result<Option<UserRecord>> {
        Ok(self.state.read().users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        let mut journal = self.journal.lock().await;
        let record = self.state.read().prepare_user(user)?;
        self.write(&mut journal, &JournalRecord::UserCreated(record.clone()))
            .await?;
        self.state.write().users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        Ok(self.state.read().users.values().cloned().collect())
    }

    async fn set_user_disabled(&self, id: IdentityId, disabled: bool) -> Result<UserRecord> {
        let mut journal = self.journal.lock().await;
        if !self.state.read().users.contains_key(&id) {
            return Err(ServerError::UserNotFound(id));
        }
        let record = JournalRecord::UserDisabled { id, disabled };
        self.write(&mut journal, &record).await?;

        let mut state = self.state.write();
        state.apply(record);
        state
            .users
            .get(&id)
            .cloned()
            .ok_or(ServerError::UserNotFound(id))
    }

    async fn append_message(&self, envelope: &MessageEnvelope) -> Result<()> {
        let mut journal = self.journal.lock().await;
        let record = JournalRecord::MessageAppended(envelope.clone());
        self.write(&mut journal, &record).await?;
        self.state.write().apply(record);
        Ok(())
    }

    async fn messages_between(&self, a: IdentityId, b: IdentityId) -> Result<Vec<MessageEnvelope>> {
        Ok(self.state.read().between(a, b))
    }

    async fn all_messages(&self) -> Result<Vec<MessageEnvelope>> {
        Ok(self.state.read().sorted_messages())
    }

    async fn last_message(&self) -> Result<Option<MessageEnvelope>> {
        Ok(self.state.read().messages.last().cloned())
    }
}

// ============================================
// Backend Selection
// ============================================

/// Opens the backend named in `config`.
///
/// # Errors
/// `ConfigMissing` if the file backend has no path, or any open error.
pub async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage: accounts and messages are lost on restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
        StorageBackend::File => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| ServerError::config_missing("storage.path"))?;
            Ok(Arc::new(FileStorage::open(path).await?))
        }
    }
}
