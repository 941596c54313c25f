// ============================================
// File: crates/sealpost-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! ## Creation Reason
//! Business logic of the relay, separated from transport and framing.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`storage`]: account and envelope persistence (memory / journal file)
//! - [`directory`]: public-key lookups over storage
//! - [`auth`]: bearer token verification
//! - [`presence`]: live connections per identity, online/offline events
//! - [`relay`]: send, fan-out, history and admin operations
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────────┐   ┌────────────────────────────────┐ │
//! │  │ TokenAuthenticator│   │          RelayRouter           │ │
//! │  │                   │◄──│  - authenticate / connect      │ │
//! │  │  - HMAC tokens    │   │  - send_message (sequenced)    │ │
//! │  └─────────┬─────────┘   │  - fetch_history / admin       │ │
//! │            │             └───────┬───────────────┬────────┘ │
//! │            ▼                     ▼               ▼          │
//! │  ┌──────────────────┐   ┌────────────────┐ ┌─────────────┐ │
//! │  │     Storage       │◄──│StorageDirectory│ │  Presence   │ │
//! │  │ memory | file     │   │                │ │  Tracker    │ │
//! │  └──────────────────┘   └────────────────┘ └─────────────┘ │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Services are testable in isolation: storage and authentication are
//!   trait objects
//! - All services are Send + Sync and shared through `Arc`
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod auth;
pub mod directory;
pub mod presence;
pub mod relay;
pub mod storage;

// Re-export primary types
pub use auth::{AuthenticatedUser, Authenticator, TokenAuthenticator};
pub use directory::StorageDirectory;
pub use presence::{ConnectionHandle, PresenceEvent, PresenceTracker};
pub use relay::{Attachment, RelayRouter};
pub use storage::{open_storage, FileStorage, MemoryStorage, NewUser, Storage, UserRecord};
