// ============================================
// File: crates/sealpost-core/src/protocol/messages.rs
// ============================================
//! # Protocol Messages
//!
//! ## Creation Reason
//! Typed frames for the client ↔ relay channel, plus the stored envelope.
//!
//! ## Frame Layout
//! ```text
//! {"type": "sendMessage", "payload": {"to": 2, "ciphertext": "...", "nonce": "..."}}
//! {"type": "onlineUsers", "payload": [1, 2, 5]}
//! {"type": "auditMessages"}
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Ciphertext and nonce are opaque to the relay. Nothing here may
//!   attempt to interpret them.
//!
//! ## Last Modified
//! v0.1.0 - Initial frame definitions

use serde::{Deserialize, Serialize};

use sealpost_common::{IdentityId, MessageId, Timestamp};

use crate::directory::DirectoryEntry;

/// Serde adapter for byte fields carried as standard base64 strings.
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes bytes as base64.
    ///
    /// # Errors
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    /// Deserializes base64 into bytes.
    ///
    /// # Errors
    /// Fails on invalid base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

// ============================================
// Envelope Types
// ============================================

/// A persisted encrypted message.
///
/// Immutable once created; `id` and `created_at` are assigned by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// Relay-assigned id, strictly increasing
    pub id: MessageId,
    /// Author
    pub sender: IdentityId,
    /// Addressee
    pub receiver: IdentityId,
    /// Sealed body
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// Nonce used to seal the body
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    /// Relay-assigned timestamp (ms), non-decreasing
    pub created_at: Timestamp,
}

impl MessageEnvelope {
    /// Returns `true` if `a` and `b` are the two parties of this envelope.
    #[must_use]
    pub fn is_between(&self, a: IdentityId, b: IdentityId) -> bool {
        (self.sender == a && self.receiver == b) || (self.sender == b && self.receiver == a)
    }
}

/// Ciphertext a client wants relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Recipient
    pub to: IdentityId,
    /// Sealed body
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// Nonce
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
}

/// Live delivery pushed to every connection of the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Envelope id
    pub id: MessageId,
    /// Sender
    pub from: IdentityId,
    /// Sealed body
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// Nonce
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    /// Envelope timestamp (ms)
    pub timestamp: Timestamp,
}

impl From<&MessageEnvelope> for InboundMessage {
    fn from(envelope: &MessageEnvelope) -> Self {
        Self {
            id: envelope.id,
            from: envelope.sender,
            ciphertext: envelope.ciphertext.clone(),
            nonce: envelope.nonce.clone(),
            timestamp: envelope.created_at,
        }
    }
}

/// Acknowledgment sent to the sending connection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAck {
    /// Envelope id
    pub id: MessageId,
    /// Envelope timestamp (ms)
    pub timestamp: Timestamp,
}

/// Online/offline transition of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    /// Identity whose presence changed
    pub user_id: IdentityId,
    /// New state
    pub online: bool,
}

/// Envelope annotated with usernames, for the admin audit view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// The stored envelope
    #[serde(flatten)]
    pub envelope: MessageEnvelope,
    /// Sender's username, if still known
    pub sender_username: Option<String>,
    /// Receiver's username, if still known
    pub receiver_username: Option<String>,
}

// ============================================
// Client → Relay
// ============================================

/// Frames sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientFrame {
    /// First frame on every connection.
    Auth {
        /// Bearer credential
        token: String,
    },
    /// Relay ciphertext to a peer.
    SendMessage(OutgoingMessage),
    /// Request the conversation with one peer.
    #[serde(rename_all = "camelCase")]
    FetchMessages {
        /// The other party
        with_user: IdentityId,
    },
    /// Look up a peer's registered public key.
    #[serde(rename_all = "camelCase")]
    PublicKey {
        /// Identity to look up
        user_id: IdentityId,
    },
    /// Admin: list every stored envelope.
    AuditMessages,
    /// Admin: enable or disable an account.
    #[serde(rename_all = "camelCase")]
    SetDisabled {
        /// Target account
        user_id: IdentityId,
        /// New flag
        disabled: bool,
    },
}

impl ClientFrame {
    /// Frame name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::SendMessage(_) => "sendMessage",
            Self::FetchMessages { .. } => "fetchMessages",
            Self::PublicKey { .. } => "publicKey",
            Self::AuditMessages => "auditMessages",
            Self::SetDisabled { .. } => "setDisabled",
        }
    }
}

// ============================================
// Relay → Client
// ============================================

/// Machine-readable error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Credential rejected; the connection is closed after this frame
    AuthenticationFailed,
    /// Frame could not be parsed or is not allowed here
    BadRequest,
    /// Referenced identity does not exist
    NotFound,
    /// Caller lacks the admin role
    Forbidden,
    /// Persistence failed; the caller may retry
    Storage,
    /// Frame exceeds the size limit
    TooLarge,
    /// Unexpected relay failure
    Internal,
}

/// Error reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    /// Category
    pub code: ErrorCode,
    /// Human-readable detail
    pub message: String,
}

/// Frames sent by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerFrame {
    /// Handshake accepted.
    #[serde(rename_all = "camelCase")]
    Authenticated {
        /// Identity bound to this connection
        user_id: IdentityId,
        /// Relay protocol version
        protocol_version: u8,
    },
    /// Presence snapshot, sent once after authentication.
    OnlineUsers(Vec<IdentityId>),
    /// Presence transition.
    UserStatus(PresenceUpdate),
    /// Live delivery.
    Message(InboundMessage),
    /// Send acknowledgment.
    MessageSent(SendAck),
    /// Conversation history, oldest first.
    Messages(Vec<MessageEnvelope>),
    /// Directory record.
    PublicKey(DirectoryEntry),
    /// Admin audit listing.
    AuditLog(Vec<AuditRecord>),
    /// Admin toggle applied.
    #[serde(rename_all = "camelCase")]
    UserUpdated {
        /// Target account
        user_id: IdentityId,
        /// Flag now in effect
        disabled: bool,
    },
    /// Request failed.
    Error(ErrorFrame),
}

impl ServerFrame {
    /// Builds an error frame.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorFrame {
            code,
            message: message.into(),
        })
    }

    /// Frame name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Authenticated { .. } => "authenticated",
            Self::OnlineUsers(_) => "onlineUsers",
            Self::UserStatus(_) => "userStatus",
            Self::Message(_) => "message",
            Self::MessageSent(_) => "messageSent",
            Self::Messages(_) => "messages",
            Self::PublicKey(_) => "publicKey",
            Self::AuditLog(_) => "auditLog",
            Self::UserUpdated { .. } => "userUpdated",
            Self::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope() -> MessageEnvelope {
        MessageEnvelope {
            id: MessageId::new(4),
            sender: IdentityId::new(1),
            receiver: IdentityId::new(2),
            ciphertext: vec![1, 2, 3],
            nonce: vec![0; 24],
            created_at: Timestamp::from_millis(1_700_000_000_000),
        }
    }

    #[test]
    fn test_send_message_wire_format() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "sendMessage",
            "payload": {"to": 2, "ciphertext": "AQID", "nonce": "AAAA"}
        }))
        .unwrap();
        assert_eq!(
            frame,
            ClientFrame::SendMessage(OutgoingMessage {
                to: IdentityId::new(2),
                ciphertext: vec![1, 2, 3],
                nonce: vec![0, 0, 0],
            })
        );
    }

    #[test]
    fn test_fetch_messages_uses_camel_case() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "fetchMessages",
            "payload": {"withUser": 9}
        }))
        .unwrap();
        assert_eq!(
            frame,
            ClientFrame::FetchMessages {
                with_user: IdentityId::new(9)
            }
        );
    }

    #[test]
    fn test_unit_frame_without_payload() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"auditMessages"}"#).unwrap();
        assert_eq!(frame, ClientFrame::AuditMessages);
    }

    #[test]
    fn test_history_wire_format() {
        let value = serde_json::to_value(ServerFrame::Messages(vec![envelope()])).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "messages",
                "payload": [{
                    "id": 4,
                    "sender": 1,
                    "receiver": 2,
                    "ciphertext": "AQID",
                    "nonce": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
                    "createdAt": 1_700_000_000_000_i64
                }]
            })
        );
    }

    #[test]
    fn test_delivery_and_presence_wire_format() {
        let delivery = serde_json::to_value(ServerFrame::Message(InboundMessage::from(&envelope()))).unwrap();
        assert_eq!(delivery["payload"]["from"], 1);
        assert_eq!(delivery["payload"]["timestamp"], 1_700_000_000_000_i64);

        let status = serde_json::to_value(ServerFrame::UserStatus(PresenceUpdate {
            user_id: IdentityId::new(3),
            online: false,
        }))
        .unwrap();
        assert_eq!(status, json!({"type": "userStatus", "payload": {"userId": 3, "online": false}}));

        let snapshot = serde_json::to_value(ServerFrame::OnlineUsers(vec![IdentityId::new(1)])).unwrap();
        assert_eq!(snapshot, json!({"type": "onlineUsers", "payload": [1]}));
    }

    #[test]
    fn test_audit_record_flattens_envelope() {
        let record = AuditRecord {
            envelope: envelope(),
            sender_username: Some("alice".into()),
            receiver_username: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["sender"], 1);
        assert_eq!(value["senderUsername"], "alice");
        assert!(value["receiverUsername"].is_null());
    }

    #[test]
    fn test_error_frame() {
        let value = serde_json::to_value(ServerFrame::error(ErrorCode::AuthenticationFailed, "bad token")).unwrap();
        assert_eq!(value["payload"]["code"], "authentication_failed");
    }

    #[test]
    fn test_envelope_is_between() {
        let env = envelope();
        assert!(env.is_between(IdentityId::new(2), IdentityId::new(1)));
        assert!(!env.is_between(IdentityId::new(1), IdentityId::new(3)));
    }
}
