// ============================================
// File: crates/sealpost-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the frames exchanged between clients and the relay over one
//! WebSocket, and how they are encoded.
//!
//! ### Submodules
//! - [`messages`]: frame and envelope types
//! - [`codec`]: JSON text encoding with a size limit
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                          │
//! │  Client ──────── auth {token} ─────────────────────► Relay  │
//! │  Client ◄─────── authenticated {userId} ──────────── Relay  │
//! │  Client ◄─────── onlineUsers [ids] ───────────────── Relay  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    Relay Phase                              │
//! │  Client ──────── sendMessage {to, ciphertext, nonce} ► Relay│
//! │  Client ◄─────── messageSent {id, timestamp} ──────── Relay │
//! │  Peer   ◄─────── message {id, from, ...} ──────────── Relay │
//! │  Client ──────── fetchMessages {withUser} ──────────► Relay │
//! │  Client ◄─────── messages [envelopes] ─────────────── Relay │
//! │  Everyone ◄───── userStatus {userId, online} ──────── Relay │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format Principles
//! - One JSON object per text frame: `{"type": "...", "payload": ...}`
//! - camelCase field names, byte fields as standard base64
//!
//! ## ⚠️ Important Note for Next Developer
//! - Bump [`PROTOCOL_VERSION`] on any incompatible frame change
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod messages;

pub use codec::{FrameCodec, DEFAULT_MAX_FRAME_BYTES};
pub use messages::{
    AuditRecord, ClientFrame, ErrorCode, ErrorFrame, InboundMessage, MessageEnvelope,
    OutgoingMessage, PresenceUpdate, SendAck, ServerFrame,
};

/// Version announced in the `authenticated` frame.
pub const PROTOCOL_VERSION: u8 = 1;
