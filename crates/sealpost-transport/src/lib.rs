// ============================================
// File: crates/sealpost-transport/src/lib.rs
// ============================================
//! # Sealpost Transport - Frame I/O Layer
//!
//! ## Creation Reason
//! The relay logic works on text frames and should not care whether they
//! arrive over a real WebSocket or an in-memory channel in a test. This
//! crate provides that seam.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `FrameSource` / `FrameSink` halves of a connection
//! - [`ws`]: WebSocket implementation (tokio-tungstenite)
//! - [`mock`]: channel-backed connection pairs for tests
//! - [`error`]: transport error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              sealpost-server                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │   sealpost-core        sealpost-transport           │
//! │                        You are here ◄──             │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │             sealpost-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Frames are opaque text here; parsing belongs to `sealpost-core`
//! - A connection is always split into a reader and a writer so that the
//!   handler can select over both
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod mock;
pub mod traits;
pub mod ws;

pub use error::{Result, TransportError};
pub use traits::{FrameSink, FrameSource};
pub use ws::{WsFrameSink, WsFrameSource};
