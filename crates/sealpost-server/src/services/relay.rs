// ============================================
// File: crates/sealpost-server/src/services/relay.rs
// ============================================
//! # Relay Router
//!
//! ## Creation Reason
//! The transport-independent heart of the relay: authenticates connections,
//! persists ciphertext envelopes and fans them out, and answers history,
//! directory and admin requests.
//!
//! ## Main Functionality
//! - `RelayRouter::authenticate` / `connect` / `disconnect`: connection lifecycle
//! - `RelayRouter::send_message`: persist + fan-out, returns the ack
//! - `RelayRouter::fetch_history`: conversation between two identities
//! - `RelayRouter::lookup_public_key`: directory lookup
//! - `RelayRouter::audit_log` / `set_disabled`: admin operations
//!
//! ## Send Path
//! ```text
//! sendMessage(to, ciphertext, nonce)
//!     │
//!     ├─ validate nonce/ciphertext sizes, recipient exists
//!     │
//!     ├─ lock sequencer ───────────────────────────────┐
//!     │    id = last + 1, created_at = clock.tick()    │ serialized
//!     │    storage.append_message(envelope)            │
//!     │    enqueue `message` on every connection of to │
//!     ├─ unlock ───────────────────────────────────────┘
//!     │
//!     └─ return ack {id, timestamp} → sender's connection only
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The relay never decrypts anything and holds no private key
//! - Offline recipients get nothing live; the envelope waits in storage
//!   until the client asks for history
//! - A failed append does not consume an id
//! - Fan-out only enqueues on unbounded channels, so holding the sequencer
//!   across it never waits on a slow socket
//!
//! ## Last Modified
//! v0.1.0 - Initial relay router

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

use sealpost_common::{ConnectionId, IdentityId, MessageId, MonotonicClock, Timestamp};
use sealpost_core::crypto::{POLY1305_TAG_SIZE, XCHACHA20_NONCE_SIZE};
use sealpost_core::directory::{DirectoryEntry, IdentityDirectory};
use sealpost_core::protocol::{
    AuditRecord, InboundMessage, MessageEnvelope, OutgoingMessage, SendAck, ServerFrame,
};

use crate::error::{Result, ServerError};
use crate::services::auth::{AuthenticatedUser, Authenticator};
use crate::services::directory::StorageDirectory;
use crate::services::presence::{ConnectionHandle, PresenceEvent, PresenceTracker};
use crate::services::storage::{Storage, UserRecord};

/// What a freshly registered connection needs to start serving.
#[derive(Debug)]
pub struct Attachment {
    /// Id of the registered connection
    pub id: ConnectionId,
    /// Frames targeted at this connection (deliveries)
    pub outbound: mpsc::UnboundedReceiver<ServerFrame>,
    /// Presence transitions after registration
    pub presence: broadcast::Receiver<PresenceEvent>,
    /// Online identities at registration time
    pub online: Vec<IdentityId>,
}

/// Routes envelopes between authenticated connections.
pub struct RelayRouter {
    storage: Arc<dyn Storage>,
    authenticator: Arc<dyn Authenticator>,
    directory: StorageDirectory,
    presence: Arc<PresenceTracker>,
    /// Last assigned message id
    sequencer: Mutex<MessageId>,
    clock: MonotonicClock,
}

impl RelayRouter {
    /// Creates a router, resuming id and timestamp sequences from storage.
    ///
    /// # Errors
    /// Propagates storage errors.
    pub async fn open(
        storage: Arc<dyn Storage>,
        authenticator: Arc<dyn Authenticator>,
        presence: Arc<PresenceTracker>,
    ) -> Result<Self> {
        let last = storage.last_message().await?;
        let (last_id, floor) = last.map_or((MessageId::new(0), Timestamp::default()), |m| {
            (m.id, m.created_at)
        });

        info!(last_message_id = %last_id, "Relay router ready");

        Ok(Self {
            directory: StorageDirectory::new(Arc::clone(&storage)),
            storage,
            authenticator,
            presence,
            sequencer: Mutex::new(last_id),
            clock: MonotonicClock::starting_at(floor),
        })
    }

    /// Presence tracker shared with connections.
    #[must_use]
    pub fn presence(&self) -> &Arc<PresenceTracker> {
        &self.presence
    }

    /// Backing storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    // ========================================
    // Connection Lifecycle
    // ========================================

    /// Resolves a bearer credential.
    ///
    /// # Errors
    /// `AuthenticationFailed`.
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser> {
        match self.authenticator.authenticate(token).await {
            Ok(user) => Ok(user),
            Err(e) => {
                warn!(error = %e, "Credential rejected");
                Err(match e {
                    ServerError::AuthenticationFailed { .. } => e,
                    other => ServerError::authentication_failed(other.to_string()),
                })
            }
        }
    }

    /// Registers a new connection for `user`.
    #[must_use]
    pub fn connect(&self, user: &AuthenticatedUser) -> Attachment {
        let presence = self.presence.subscribe();
        let (handle, outbound) = ConnectionHandle::channel();
        let id = handle.id();
        self.presence.on_connect(user.id, handle);
        let online = self.presence.snapshot();

        info!(user_id = %user.id, connection = %id, "Connection authenticated");

        Attachment {
            id,
            outbound,
            presence,
            online,
        }
    }

    /// Deregisters connection `id` of `user`.
    pub fn disconnect(&self, user: IdentityId, id: ConnectionId) {
        self.presence.on_disconnect(user, id);
        debug!(user_id = %user, connection = %id, "Connection deregistered");
    }

    // ========================================
    // Messages
    // ========================================

    /// Persists `message` from `from` and delivers it to every live
    /// connection of the recipient.
    ///
    /// # Errors
    /// `BadRequest` for malformed sizes, `UserNotFound` for an unknown
    /// recipient, `Storage` if persisting fails.
    pub async fn send_message(
        &self,
        from: &AuthenticatedUser,
        message: OutgoingMessage,
    ) -> Result<SendAck> {
        if message.nonce.len() != XCHACHA20_NONCE_SIZE {
            return Err(ServerError::bad_request(format!(
                "nonce must be {XCHACHA20_NONCE_SIZE} bytes, got {}",
                message.nonce.len()
            )));
        }
        if message.ciphertext.len() < POLY1305_TAG_SIZE {
            return Err(ServerError::bad_request("ciphertext shorter than tag"));
        }
        if self.storage.get_user(message.to).await?.is_none() {
            return Err(ServerError::UserNotFound(message.to));
        }

        let mut last_id = self.sequencer.lock().await;
        let envelope = MessageEnvelope {
            id: last_id.next(),
            sender: from.id,
            receiver: message.to,
            ciphertext: message.ciphertext,
            nonce: message.nonce,
            created_at: self.clock.tick(),
        };

        self.storage.append_message(&envelope).await?;
        *last_id = envelope.id;

        let delivery = ServerFrame::Message(InboundMessage::from(&envelope));
        let recipients = self.presence.connections(envelope.receiver);
        let delivered = recipients
            .iter()
            .filter(|conn| conn.send(delivery.clone()))
            .count();
        drop(last_id);

        debug!(
            message_id = %envelope.id,
            from = %envelope.sender,
            to = %envelope.receiver,
            delivered,
            "Message relayed"
        );

        Ok(SendAck {
            id: envelope.id,
            timestamp: envelope.created_at,
        })
    }

    /// Every envelope between `requester` and `peer`, oldest first.
    ///
    /// # Errors
    /// `Storage` if the query fails.
    pub async fn fetch_history(
        &self,
        requester: &AuthenticatedUser,
        peer: IdentityId,
    ) -> Result<Vec<MessageEnvelope>> {
        let history = self.storage.messages_between(requester.id, peer).await?;
        debug!(user_id = %requester.id, peer = %peer, count = history.len(), "History served");
        Ok(history)
    }

    // ========================================
    // Directory
    // ========================================

    /// Registered public key of `id`.
    ///
    /// # Errors
    /// `UserNotFound` for an unknown identity.
    pub async fn lookup_public_key(&self, id: IdentityId) -> Result<DirectoryEntry> {
        self.directory
            .lookup(id)
            .await?
            .ok_or(ServerError::UserNotFound(id))
    }

    // ========================================
    // Administration
    // ========================================

    /// Every stored envelope annotated with usernames (ciphertext only).
    ///
    /// # Errors
    /// `Forbidden` unless `caller` is an admin.
    pub async fn audit_log(&self, caller: &AuthenticatedUser) -> Result<Vec<AuditRecord>> {
        require_admin(caller, "auditMessages")?;

        let names: HashMap<IdentityId, String> = self
            .storage
            .list_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let records: Vec<AuditRecord> = self
            .storage
            .all_messages()
            .await?
            .into_iter()
            .map(|envelope| AuditRecord {
                sender_username: names.get(&envelope.sender).cloned(),
                receiver_username: names.get(&envelope.receiver).cloned(),
                envelope,
            })
            .collect();

        info!(admin = %caller.id, count = records.len(), "Audit log served");
        Ok(records)
    }

    /// Enables or disables `target`.
    ///
    /// Takes effect at the target's next authentication.
    ///
    /// # Errors
    /// `Forbidden` unless `caller` is an admin, `UserNotFound`.
    pub async fn set_disabled(
        &self,
        caller: &AuthenticatedUser,
        target: IdentityId,
        disabled: bool,
    ) -> Result<UserRecord> {
        require_admin(caller, "setDisabled")?;
        let user = self.storage.set_user_disabled(target, disabled).await?;
        info!(admin = %caller.id, user_id = %target, disabled, "Account updated");
        Ok(user)
    }
}

fn require_admin(caller: &AuthenticatedUser, action: &str) -> Result<()> {
    if caller.is_admin {
        Ok(())
    } else {
        warn!(user_id = %caller.id, action, "Admin operation refused");
        Err(ServerError::forbidden(action))
    }
}

impl std::fmt::Debug for RelayRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayRouter")
            .field("presence", &self.presence)
            .field("clock", &self.clock.last())
            .finish_non_exhaustive()
    }
}
