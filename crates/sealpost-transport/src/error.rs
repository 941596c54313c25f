// ============================================
// File: crates/sealpost-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Failures of the socket and WebSocket layer, kept apart from protocol
//! and relay errors.
//!
//! ## Error Categories
//! 1. **Setup**: bind and upgrade failures
//! 2. **I/O**: send / receive failures on an open connection
//! 3. **Peer**: unsupported frame types
//!
//! ## ⚠️ Important Note for Next Developer
//! - A peer closing the socket is not an error; `FrameSource::recv`
//!   returns `Ok(None)` for that
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use sealpost_common::CommonError;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to bind the listener.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind
        addr: SocketAddr,
        /// OS message
        reason: String,
    },

    /// WebSocket upgrade or client connect failed.
    #[error("WebSocket handshake failed: {reason}")]
    Handshake {
        /// Library message
        reason: String,
    },

    /// Writing a frame failed.
    #[error("Failed to send frame: {reason}")]
    SendFailed {
        /// Library message
        reason: String,
    },

    /// Reading a frame failed.
    #[error("Failed to receive frame: {reason}")]
    ReceiveFailed {
        /// Library message
        reason: String,
    },

    /// Peer sent a frame type the relay does not speak.
    #[error("Unsupported frame: {kind}")]
    UnsupportedFrame {
        /// Frame kind ("binary", ...)
        kind: String,
    },

    /// The local side already closed the connection.
    #[error("Connection closed")]
    Closed,

    /// System I/O error.
    #[error("I/O error: {context}")]
    Io {
        /// Operation in progress
        context: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl ToString) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.to_string(),
        }
    }

    /// Creates a `Handshake` error.
    pub fn handshake(reason: impl ToString) -> Self {
        Self::Handshake {
            reason: reason.to_string(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` if the connection can no longer be used.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SendFailed { .. } | Self::ReceiveFailed { .. } | Self::Closed | Self::Io { .. }
        )
    }

    /// Returns `true` if the error was caused by the remote peer's input.
    #[must_use]
    pub const fn is_peer_error(&self) -> bool {
        matches!(self, Self::UnsupportedFrame { .. } | Self::Handshake { .. })
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => Self::Closed,
            tungstenite::Error::Io(source) => Self::io("websocket", source),
            other => Self::ReceiveFailed {
                reason: other.to_string(),
            },
        }
    }
}
