// ============================================
// File: crates/sealpost-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Abstract halves of a frame-oriented connection, so the connection
//! handler can be driven by a WebSocket in production and by channels in
//! tests.
//!
//! ## Design Philosophy
//! - Reader and writer are separate owned values (`&mut self`), matching
//!   the split halves of a WebSocket stream
//! - Async-first with `async_trait`
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use async_trait::async_trait;

use crate::error::Result;

/// Receiving half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Waits for the next text frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    ///
    /// # Errors
    /// Returns an error if the underlying stream fails or the peer sends
    /// a frame type that cannot be represented as text.
    async fn recv(&mut self) -> Result<Option<String>>;
}

/// Sending half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Sends one text frame.
    ///
    /// # Errors
    /// Returns an error if the connection is closed or the write fails.
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Closes the connection. Further sends fail with `Closed`.
    ///
    /// # Errors
    /// Returns an error if the close handshake cannot be written.
    async fn close(&mut self) -> Result<()>;
}
