// ============================================
// File: crates/sealpost-server/src/services/presence.rs
// ============================================
//! # Presence Tracker
//!
//! ## Creation Reason
//! Tracks which identities have at least one live connection and announces
//! online/offline transitions to every connection.
//!
//! ## Main Functionality
//! - `PresenceTracker`: identity → live connections, plus a broadcast of
//!   transitions
//! - `ConnectionHandle`: targeted delivery queue of one connection
//! - `PresenceEvent`: online/offline transition
//!
//! ## Transition Rules
//! ```text
//! connections(A): {}        ──on_connect(c1)──►  {c1}       emit A online
//! connections(A): {c1}      ──on_connect(c2)──►  {c1, c2}   (silent)
//! connections(A): {c1, c2}  ──on_disconnect(c1)► {c2}       (silent)
//! connections(A): {c2}      ──on_disconnect(c2)► {}         emit A offline
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The emptiness check and the event send happen under ONE lock
//!   acquisition. Splitting them reintroduces duplicate or missing events
//!   when tabs of the same user connect and disconnect concurrently
//! - Never await while holding the lock (it is a parking_lot mutex)
//! - Slow subscribers lag and skip events; they do not block the tracker
//!
//! ## Last Modified
//! v0.1.0 - Initial presence tracking

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use sealpost_common::{ConnectionId, IdentityId};
use sealpost_core::protocol::{PresenceUpdate, ServerFrame};

// ============================================
// ConnectionHandle
// ============================================

/// Delivery handle of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<ServerFrame>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiver its connection drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerFrame>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: ConnectionId::next(),
                outbound,
            },
            rx,
        )
    }

    /// Connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues `frame` for this connection.
    ///
    /// Returns `false` if the connection has already gone away.
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.outbound.send(frame).is_ok()
    }
}

// ============================================
// PresenceEvent
// ============================================

/// Online/offline transition of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceEvent {
    /// Identity whose state changed
    pub identity: IdentityId,
    /// New state
    pub online: bool,
}

impl From<PresenceEvent> for PresenceUpdate {
    fn from(event: PresenceEvent) -> Self {
        Self {
            user_id: event.identity,
            online: event.online,
        }
    }
}

impl From<PresenceEvent> for ServerFrame {
    fn from(event: PresenceEvent) -> Self {
        Self::UserStatus(event.into())
    }
}

// ============================================
// PresenceTracker
// ============================================

/// Live connections per identity.
pub struct PresenceTracker {
    connections: Mutex<HashMap<IdentityId, HashMap<ConnectionId, ConnectionHandle>>>,
    events: broadcast::Sender<PresenceEvent>,
}

impl PresenceTracker {
    /// Creates an empty tracker; each subscriber buffers up to
    /// `event_capacity` events.
    #[must_use]
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            connections: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Registers `handle` for `identity`.
    ///
    /// Returns `true` if this made the identity come online.
    pub fn on_connect(&self, identity: IdentityId, handle: ConnectionHandle) -> bool {
        let mut connections = self.connections.lock();
        let set = connections.entry(identity).or_default();
        let came_online = set.is_empty();
        set.insert(handle.id(), handle);

        if came_online {
            let _ = self.events.send(PresenceEvent {
                identity,
                online: true,
            });
            info!(user_id = %identity, "User online");
        } else {
            debug!(user_id = %identity, connections = set.len(), "Additional connection");
        }
        came_online
    }

    /// Removes connection `id` of `identity`.
    ///
    /// Returns `true` if this made the identity go offline. Unknown ids are
    /// ignored.
    pub fn on_disconnect(&self, identity: IdentityId, id: ConnectionId) -> bool {
        let mut connections = self.connections.lock();
        let Some(set) = connections.get_mut(&identity) else {
            return false;
        };
        if set.remove(&id).is_none() {
            return false;
        }

        if set.is_empty() {
            connections.remove(&identity);
            let _ = self.events.send(PresenceEvent {
                identity,
                online: false,
            });
            info!(user_id = %identity, "User offline");
            true
        } else {
            debug!(user_id = %identity, connections = set.len(), "Connection closed, still online");
            false
        }
    }

    /// Identities with at least one live connection, ascending.
    #[must_use]
    pub fn snapshot(&self) -> Vec<IdentityId> {
        let mut online: Vec<_> = self.connections.lock().keys().copied().collect();
        online.sort_unstable();
        online
    }

    /// Handles of every live connection of `identity`.
    #[must_use]
    pub fn connections(&self, identity: IdentityId) -> Vec<ConnectionHandle> {
        self.connections
            .lock()
            .get(&identity)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Handle of one specific connection.
    #[must_use]
    pub fn connection(&self, identity: IdentityId, id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections
            .lock()
            .get(&identity)
            .and_then(|set| set.get(&id).cloned())
    }

    /// Returns `true` if `identity` has a live connection.
    #[must_use]
    pub fn is_online(&self, identity: IdentityId) -> bool {
        self.connections.lock().contains_key(&identity)
    }

    /// Total live connections across all identities.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.lock().values().map(HashMap::len).sum()
    }

    /// Subscribes to transitions that happen after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("online", &self.connections.lock().len())
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn drain(rx: &mut broadcast::Receiver<PresenceEvent>) -> Vec<PresenceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_single_transition_per_identity() {
        let tracker = PresenceTracker::new(16);
        let mut rx = tracker.subscribe();
        let alice = IdentityId::new(1);

        let handles: Vec<_> = (0..3).map(|_| ConnectionHandle::channel().0).collect();
        let ids: Vec<_> = handles.iter().map(ConnectionHandle::id).collect();

        let transitions: Vec<bool> = handles
            .into_iter()
            .map(|h| tracker.on_connect(alice, h))
            .collect();
        assert_eq!(transitions, vec![true, false, false]);
        assert!(tracker.is_online(alice));
        assert_eq!(tracker.connections(alice).len(), 3);

        assert!(!tracker.on_disconnect(alice, ids[0]));
        assert!(!tracker.on_disconnect(alice, ids[1]));
        assert!(tracker.is_online(alice));
        assert!(tracker.on_disconnect(alice, ids[2]));
        assert!(!tracker.is_online(alice));

        assert_eq!(
            drain(&mut rx),
            vec![
                PresenceEvent { identity: alice, online: true },
                PresenceEvent { identity: alice, online: false },
            ]
        );
    }

    #[test]
    fn test_unknown_disconnect_ignored() {
        let tracker = PresenceTracker::new(16);
        let mut rx = tracker.subscribe();
        let (handle, _rx) = ConnectionHandle::channel();
        let stray = ConnectionHandle::channel().0.id();

        assert!(!tracker.on_disconnect(IdentityId::new(1), handle.id()));
        tracker.on_connect(IdentityId::new(1), handle);
        assert!(!tracker.on_disconnect(IdentityId::new(1), stray));
        assert!(tracker.is_online(IdentityId::new(1)));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_snapshot_and_lookup() {
        let tracker = PresenceTracker::new(16);
        let (h3, _r3) = ConnectionHandle::channel();
        let (h1, _r1) = ConnectionHandle::channel();
        let h1_id = h1.id();
        tracker.on_connect(IdentityId::new(3), h3);
        tracker.on_connect(IdentityId::new(1), h1);

        assert_eq!(tracker.snapshot(), vec![IdentityId::new(1), IdentityId::new(3)]);
        assert_eq!(tracker.connection_count(), 2);
        assert!(tracker.connection(IdentityId::new(1), h1_id).is_some());
        assert!(tracker.connection(IdentityId::new(3), h1_id).is_none());
    }

    #[test]
    fn test_handle_delivery() {
        let (handle, mut rx) = ConnectionHandle::channel();
        assert!(handle.send(ServerFrame::OnlineUsers(vec![])));
        assert_eq!(rx.try_recv().unwrap(), ServerFrame::OnlineUsers(vec![]));
        drop(rx);
        assert!(!handle.send(ServerFrame::OnlineUsers(vec![])));
    }

    #[test]
    fn test_concurrent_tabs_emit_exactly_two_events() {
        let tracker = Arc::new(PresenceTracker::new(4096));
        let mut rx = tracker.subscribe();
        let alice = IdentityId::new(1);

        for _round in 0..50 {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let tracker = Arc::clone(&tracker);
                    std::thread::spawn(move || {
                        let (handle, _rx) = ConnectionHandle::channel();
                        let id = handle.id();
                        tracker.on_connect(alice, handle);
                        std::thread::yield_now();
                        tracker.on_disconnect(alice, id);
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }
        }

        assert!(!tracker.is_online(alice));
        let events = drain(&mut rx);
        assert!(!events.is_empty());
        // Strict alternation: online, offline, online, offline, ...
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.online, i % 2 == 0, "event {i} out of order");
        }
        assert_eq!(events.len() % 2, 0);
    }

    #[test]
    fn test_event_frame_conversion() {
        let frame: ServerFrame = PresenceEvent {
            identity: IdentityId::new(5),
            online: true,
        }
        .into();
        assert_eq!(
            frame,
            ServerFrame::UserStatus(PresenceUpdate {
                user_id: IdentityId::new(5),
                online: true,
            })
        );
    }
}
