// ============================================
// File: crates/sealpost-common/src/lib.rs
// ============================================
//! # Sealpost Common - Shared Types
//!
//! ## Creation Reason
//! Identifier and timestamp types are shared by the crypto layer, the wire
//! protocol and the relay. Keeping them in one leaf crate means the server
//! and client halves agree on their representation.
//!
//! ## Main Functionality
//! - [`types`]: `IdentityId`, `MessageId`, `ConnectionId`
//! - [`time`]: millisecond wall-clock timestamps and a non-decreasing clock
//! - [`error`]: `CommonError` and the crate `Result` alias
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              sealpost-server                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │   sealpost-core        sealpost-transport           │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │             sealpost-common  ◄── You are here       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Everything in here ends up on the wire; serde representations are
//!   part of the protocol and must stay stable
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

pub use error::{CommonError, Result};
pub use time::{MonotonicClock, Timestamp};
pub use types::{ConnectionId, IdentityId, MessageId};
