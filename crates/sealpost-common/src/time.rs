// ============================================
// File: crates/sealpost-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Envelopes carry a `createdAt` in milliseconds since the Unix epoch, and
//! history is ordered by it. The wall clock can step backwards (NTP), so the
//! relay stamps messages through a clock that never goes back.
//!
//! ## Main Functionality
//! - `Timestamp`: milliseconds since the epoch, serialized as an integer
//! - `MonotonicClock`: hands out `max(now, last)` so stamps never decrease
//!
//! ## ⚠️ Important Note for Next Developer
//! - `MonotonicClock` guarantees non-decreasing values, not unique ones.
//!   Two messages can share a timestamp; the message id breaks the tie.
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================
// Timestamp
// ============================================

/// Unix timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Reads the wall clock.
    #[must_use]
    pub fn now() -> Self {
        Self(unix_timestamp_millis())
    }

    /// Returns milliseconds since the epoch.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns whole seconds since the epoch.
    #[must_use]
    pub const fn as_secs(self) -> i64 {
        self.0 / 1000
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

// ============================================
// MonotonicClock
// ============================================

/// Wall clock that never returns a value smaller than one it returned before.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    /// Creates a clock whose first reading is at least `floor`.
    #[must_use]
    pub const fn starting_at(floor: Timestamp) -> Self {
        Self {
            last: AtomicI64::new(floor.0),
        }
    }

    /// Returns `max(wall clock, previous reading)` and records it.
    pub fn tick(&self) -> Timestamp {
        let now = unix_timestamp_millis();
        let prev = self.last.fetch_max(now, Ordering::AcqRel);
        Timestamp(prev.max(now))
    }

    /// Returns the most recent reading without advancing.
    #[must_use]
    pub fn last(&self) -> Timestamp {
        Timestamp(self.last.load(Ordering::Acquire))
    }
}

/// Returns the current Unix time in milliseconds.
///
/// A clock set before 1970 reads as zero.
#[must_use]
pub fn unix_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now_is_recent() {
        let ts = Timestamp::now();
        // 2020-01-01 in millis
        assert!(ts.as_millis() > 1_577_836_800_000);
        assert_eq!(ts.as_secs(), ts.as_millis() / 1000);
    }

    #[test]
    fn test_clock_never_goes_backwards() {
        let future = Timestamp::from_millis(unix_timestamp_millis() + 60_000);
        let clock = MonotonicClock::starting_at(future);

        let first = clock.tick();
        let second = clock.tick();
        assert_eq!(first, future);
        assert!(second >= first);
    }

    #[test]
    fn test_clock_follows_wall_time() {
        let clock = MonotonicClock::default();
        let before = unix_timestamp_millis();
        let ts = clock.tick();
        assert!(ts.as_millis() >= before);
        assert_eq!(clock.last(), ts);
    }

    #[test]
    fn test_timestamp_serializes_as_integer() {
        let json = serde_json::to_string(&Timestamp::from_millis(1234)).unwrap();
        assert_eq!(json, "1234");
    }
}
