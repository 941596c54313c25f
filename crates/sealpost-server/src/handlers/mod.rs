// ============================================
// File: crates/sealpost-server/src/handlers/mod.rs
// ============================================
//! # Connection Handlers
//!
//! ## Creation Reason
//! Bridges a transport (any `FrameSource` / `FrameSink` pair) to the relay
//! services.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`connection`]: handshake, frame dispatch and delivery for one connection
//!
//! ## Data Flow
//! ```text
//! Client → Relay:
//!   1. Receive text frame
//!   2. Decode ClientFrame (size limit first)
//!   3. Dispatch to RelayRouter
//!   4. Write the reply on the same connection
//!
//! Relay → Client:
//!   1. Deliveries arrive on the connection's outbound queue
//!   2. Presence transitions arrive on the broadcast subscription
//!   3. Encode ServerFrame, write to sink
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers never decrypt; frames carry ciphertext only
//! - Keep transport specifics out of here so tests can use the mock
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers structure

pub mod connection;

pub use connection::{CloseReason, ConnectionHandler, ConnectionLimits};
