// ============================================
// File: crates/sealpost-common/src/types.rs
// ============================================
//! # Identifier Types
//!
//! ## Creation Reason
//! Users, messages and live sockets are all addressed by integers. Wrapping
//! each in its own newtype keeps a message id from being passed where a
//! user id is expected.
//!
//! ## Main Functionality
//! - `IdentityId`: registered party (assigned by the user store)
//! - `MessageId`: stored envelope (assigned by the relay sequencer)
//! - `ConnectionId`: one live socket (process-local, never persisted)
//!
//! ## Wire Format
//! All three serialize as bare JSON integers.
//!
//! ## Last Modified
//! v0.1.0 - Initial identifier types

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

// ============================================
// IdentityId
// ============================================

/// Stable identifier of a registered identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(u64);

impl IdentityId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IdentityId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| CommonError::invalid_input("identity_id", e.to_string()))
    }
}

impl From<u64> for IdentityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================
// MessageId
// ============================================

/// Identifier of a stored message envelope.
///
/// Assigned in strictly increasing order, so comparing two ids also
/// compares the order in which the relay accepted the messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the id that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================
// ConnectionId
// ============================================

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-local handle identifying one open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates a fresh id, unique for the lifetime of the process.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_id_parse() {
        let id: IdentityId = " 17 ".parse().unwrap();
        assert_eq!(id.get(), 17);
        assert!("alice".parse::<IdentityId>().is_err());
    }

    #[test]
    fn test_ids_serialize_as_integers() {
        let json = serde_json::to_string(&(IdentityId::new(3), MessageId::new(9))).unwrap();
        assert_eq!(json, "[3,9]");
    }

    #[test]
    fn test_connection_ids_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_message_id_next() {
        assert_eq!(MessageId::new(1).next(), MessageId::new(2));
    }
}
