// ============================================
// File: crates/sealpost-server/src/lib.rs
// ============================================
//! # Sealpost Relay Server Library
//!
//! ## Creation Reason
//! Provides the relay server for sealpost: it authenticates clients, routes
//! opaque ciphertext envelopes between them, persists every envelope and
//! broadcasts presence. The server never holds a key that can open a
//! message.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Server configuration management
//! - [`server`]: Main server orchestration
//! - [`services`]: Business logic services
//!   - [`services::auth`]: Bearer token authentication
//!   - [`services::presence`]: Online/offline tracking
//!   - [`services::relay`]: Envelope routing and history
//!   - [`services::storage`]: Users and messages
//!   - [`services::directory`]: Public key directory over storage
//! - [`handlers`]: Per-connection protocol handling
//! - [`error`]: Server-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Sealpost Relay                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐  │
//! │  │   Config    │────►│   Server    │────►│   Connection    │  │
//! │  │             │     │ Orchestrator│     │    Handler      │  │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘  │
//! │                             │                     │           │
//! │         ┌───────────────────┼───────────────────┬─┘           │
//! │         ▼                   ▼                   ▼             │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     │
//! │  │    Token    │     │   Relay     │     │  Presence   │     │
//! │  │    Auth     │     │   Router    │     │  Tracker    │     │
//! │  └─────────────┘     └──────┬──────┘     └─────────────┘     │
//! │                             ▼                                 │
//! │                      ┌─────────────┐                          │
//! │                      │   Storage   │                          │
//! │                      └─────────────┘                          │
//! ├───────────────────────────────────────────────────────────────┤
//! │                     Transport Layer                           │
//! │              WebSocket text frames (JSON)                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Sender → sendMessage → assign id/time → persist → deliver to each
//!          connection of the receiver → messageSent ack to the sender
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Configuration changes require restart (no hot-reload)
//! - The memory backend loses everything on restart
//! - Without `auth.token_secret` tokens die with the process
//!
//! ## Last Modified
//! v0.1.0 - Initial relay server library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod services;

// Re-export primary types
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::Server;
