// ============================================
// File: crates/sealpost-transport/src/mock.rs
// ============================================
//! # Mock Transport
//!
//! ## Creation Reason
//! Lets the relay's connection handler be exercised end to end in tests
//! without opening sockets.
//!
//! ## Main Functionality
//! - `duplex()`: two connected ends, each with a sink and a source
//! - Closing a sink ends the other side's source with `Ok(None)`
//!
//! ## Usage in Tests
//! ```
//! use sealpost_transport::mock::duplex;
//! use sealpost_transport::{FrameSink, FrameSource};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut client, mut server) = duplex();
//! client.sink.send("hello".into()).await?;
//! assert_eq!(server.source.recv().await?.as_deref(), Some("hello"));
//! # Ok(())
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only; queues are unbounded
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::traits::{FrameSink, FrameSource};

/// Receiving half of a mock connection.
#[derive(Debug)]
pub struct MockFrameSource {
    rx: mpsc::UnboundedReceiver<String>,
}

/// Sending half of a mock connection.
#[derive(Debug)]
pub struct MockFrameSink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

/// One end of a mock connection.
#[derive(Debug)]
pub struct MockEnd {
    /// Frames written here arrive at the other end's source.
    pub sink: MockFrameSink,
    /// Frames written by the other end arrive here.
    pub source: MockFrameSource,
}

/// Creates two connected ends.
#[must_use]
pub fn duplex() -> (MockEnd, MockEnd) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        MockEnd {
            sink: MockFrameSink { tx: Some(a_tx) },
            source: MockFrameSource { rx: b_rx },
        },
        MockEnd {
            sink: MockFrameSink { tx: Some(b_tx) },
            source: MockFrameSource { rx: a_rx },
        },
    )
}

impl MockFrameSource {
    /// Waits up to `timeout` for the next frame.
    ///
    /// Returns `None` on timeout or once the other end has closed.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<String> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }

    /// Returns a frame that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

impl MockFrameSink {
    /// Returns `true` once either end has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, mpsc::UnboundedSender::is_closed)
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn recv(&mut self) -> Result<Option<String>> {
        Ok(self.rx.recv().await)
    }
}

#[async_trait]
impl FrameSink for MockFrameSink {
    async fn send(&mut self, frame: String) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_cross_over() {
        let (mut a, mut b) = duplex();
        a.sink.send("to b".into()).await.unwrap();
        b.sink.send("to a".into()).await.unwrap();

        assert_eq!(b.source.recv().await.unwrap().as_deref(), Some("to b"));
        assert_eq!(a.source.recv().await.unwrap().as_deref(), Some("to a"));
    }

    #[tokio::test]
    async fn test_close_ends_peer_source() {
        let (mut a, mut b) = duplex();
        a.sink.send("last".into()).await.unwrap();
        a.sink.close().await.unwrap();

        assert_eq!(b.source.recv().await.unwrap().as_deref(), Some("last"));
        assert_eq!(b.source.recv().await.unwrap(), None);
        assert!(matches!(a.sink.send("more".into()).await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_recv_timeout() {
        let (_a, mut b) = duplex();
        assert_eq!(b.source.recv_timeout(Duration::from_millis(10)).await, None);
        assert_eq!(b.source.try_recv(), None);
    }
}
