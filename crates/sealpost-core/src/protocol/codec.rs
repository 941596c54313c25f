// ============================================
// File: crates/sealpost-core/src/protocol/codec.rs
// ============================================
//! # Frame Codec
//!
//! ## Creation Reason
//! Frames travel as WebSocket text messages. This codec turns them into
//! JSON and back, and rejects oversized input before parsing it.
//!
//! ## Parsing Strategy
//! 1. Check the frame length against `max_frame_bytes`
//! 2. Parse with `serde_json` into the typed frame
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::protocol::messages::{ClientFrame, ServerFrame};

/// Default upper bound on a single text frame (256 KiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024;

/// JSON text codec with a frame size limit.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_bytes: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameCodec {
    /// Creates a codec accepting frames up to `max_frame_bytes`.
    #[must_use]
    pub const fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    /// Configured limit.
    #[must_use]
    pub const fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Serializes any frame.
    ///
    /// # Errors
    /// `FrameEncoding` if serialization fails.
    pub fn encode<T: Serialize>(&self, frame: &T) -> Result<String> {
        serde_json::to_string(frame).map_err(|e| CoreError::FrameEncoding {
            reason: e.to_string(),
        })
    }

    /// Parses any frame.
    ///
    /// # Errors
    /// `MessageTooLarge` above the limit, `MalformedFrame` on bad JSON.
    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        if text.len() > self.max_frame_bytes {
            return Err(CoreError::too_large(self.max_frame_bytes, text.len()));
        }
        serde_json::from_str(text).map_err(CoreError::malformed)
    }

    /// Parses a frame sent by a client.
    ///
    /// # Errors
    /// See [`FrameCodec::decode`].
    pub fn decode_client(&self, text: &str) -> Result<ClientFrame> {
        self.decode(text)
    }

    /// Parses a frame sent by the relay.
    ///
    /// # Errors
    /// See [`FrameCodec::decode`].
    pub fn decode_server(&self, text: &str) -> Result<ServerFrame> {
        self.decode(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealpost_common::IdentityId;

    #[test]
    fn test_client_frame_roundtrip() {
        let codec = FrameCodec::default();
        let frame = ClientFrame::PublicKey {
            user_id: IdentityId::new(8),
        };
        let text = codec.encode(&frame).unwrap();
        assert_eq!(text, r#"{"type":"publicKey","payload":{"userId":8}}"#);
        assert_eq!(codec.decode_client(&text).unwrap(), frame);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let codec = FrameCodec::new(16);
        let err = codec
            .decode_client(r#"{"type":"auth","payload":{"token":"0123456789"}}"#)
            .unwrap_err();
        assert!(matches!(err, CoreError::MessageTooLarge { max: 16, .. }));
    }

    #[test]
    fn test_malformed_frames() {
        let codec = FrameCodec::default();
        for text in ["", "not json", r#"{"type":"nope"}"#, r#"{"type":"sendMessage","payload":{"to":1}}"#] {
            assert!(matches!(
                codec.decode_client(text),
                Err(CoreError::MalformedFrame { .. })
            ));
        }
    }

    #[test]
    fn test_bad_base64_is_malformed() {
        let codec = FrameCodec::default();
        let text = r#"{"type":"sendMessage","payload":{"to":1,"ciphertext":"***","nonce":"AAAA"}}"#;
        assert!(matches!(
            codec.decode_client(text),
            Err(CoreError::MalformedFrame { .. })
        ));
    }
}
