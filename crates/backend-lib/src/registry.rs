// ============================
// backend-lib/src/registry.rs
// ============================
//! In-memory presence registry.
//!
//! Maps event rooms to the connections currently viewing them, and each
//! connection back to its rooms. Both directions live behind one mutex
//! and every membership mutation updates them together, so the two views
//! cannot diverge and all operations on a room are linearized. Rooms are
//! created on first join and removed when the last member leaves.
//!
//! The registry is constructed once at startup and injected wherever it
//! is needed; nothing here is process-global.

use checkin_common::{EventId, ServerFrame, UserId, UserPublic};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque id for one live connection, unique for the process lifetime.
pub type ConnectionId = Uuid;

/// Outbound frame queue of one connection. Unbounded, so enqueueing
/// never blocks while the registry lock is held; the connection's writer
/// task drains it to the transport.
pub type FrameSender = mpsc::UnboundedSender<ServerFrame>;

/// A room member as seen from outside the registry.
#[derive(Debug, Clone)]
pub struct Member {
    pub conn_id: ConnectionId,
    pub user: UserPublic,
}

/// Result of adding a connection to a room.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// False when the connection was already a member (idempotent re-join).
    pub newly_joined: bool,
    /// Member count after the join.
    pub member_count: usize,
    /// The joining connection's user.
    pub user: UserPublic,
}

/// Result of removing a connection from a room.
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    /// False when the connection was not a member (idempotent re-leave).
    pub was_member: bool,
    /// Member count after the leave.
    pub member_count: usize,
    /// True when the room's member set emptied and the room was dropped.
    pub room_removed: bool,
    /// The leaving connection's user id, when the connection is known.
    pub user_id: Option<UserId>,
}

/// One room this connection was swept out of on disconnect.
#[derive(Debug, Clone)]
pub struct Departure {
    pub event_id: EventId,
    /// Member count after the sweep.
    pub member_count: usize,
}

struct ConnEntry {
    user: UserPublic,
    sender: FrameSender,
    rooms: HashSet<EventId>,
}

#[derive(Default)]
pub(crate) struct RegistryInner {
    rooms: HashMap<EventId, HashSet<ConnectionId>>,
    conns: HashMap<ConnectionId, ConnEntry>,
}

impl RegistryInner {
    pub(crate) fn register(&mut self, conn_id: ConnectionId, user: UserPublic, sender: FrameSender) {
        self.conns.insert(
            conn_id,
            ConnEntry {
                user,
                sender,
                rooms: HashSet::new(),
            },
        );
    }

    pub(crate) fn join(&mut self, event_id: &str, conn_id: ConnectionId) -> Option<JoinOutcome> {
        let entry = self.conns.get_mut(&conn_id)?;
        let user = entry.user.clone();
        let newly_joined = entry.rooms.insert(event_id.to_string());

        let members = self.rooms.entry(event_id.to_string()).or_default();
        members.insert(conn_id);

        Some(JoinOutcome {
            newly_joined,
            member_count: members.len(),
            user,
        })
    }

    pub(crate) fn leave(&mut self, event_id: &str, conn_id: ConnectionId) -> LeaveOutcome {
        let user_id = self
            .conns
            .get(&conn_id)
            .map(|entry| entry.user.id.clone());

        let was_member = self
            .conns
            .get_mut(&conn_id)
            .map(|entry| entry.rooms.remove(event_id))
            .unwrap_or(false);

        let mut member_count = 0;
        let mut room_removed = false;
        if let Some(members) = self.rooms.get_mut(event_id) {
            members.remove(&conn_id);
            member_count = members.len();
            if members.is_empty() {
                self.rooms.remove(event_id);
                room_removed = true;
            }
        }

        LeaveOutcome {
            was_member,
            member_count,
            room_removed,
            user_id,
        }
    }

    /// Drop a connection entirely, sweeping it out of every room it was
    /// in. Returns the user and the per-room aftermath so departures can
    /// be announced.
    pub(crate) fn remove_connection(
        &mut self,
        conn_id: ConnectionId,
    ) -> Option<(UserPublic, Vec<Departure>)> {
        let entry = self.conns.remove(&conn_id)?;
        let mut departures = Vec::with_capacity(entry.rooms.len());

        for event_id in entry.rooms {
            if let Some(members) = self.rooms.get_mut(&event_id) {
                members.remove(&conn_id);
                let member_count = members.len();
                if members.is_empty() {
                    self.rooms.remove(&event_id);
                }
                departures.push(Departure {
                    event_id,
                    member_count,
                });
            }
        }

        Some((entry.user, departures))
    }

    /// Deliver a frame to every member of a room, optionally skipping one
    /// connection. Returns (delivered, dropped); a closed receiver counts
    /// as dropped and is never fatal.
    pub(crate) fn send_to_room(
        &self,
        event_id: &str,
        exclude: Option<ConnectionId>,
        frame: &ServerFrame,
    ) -> (usize, usize) {
        let Some(members) = self.rooms.get(event_id) else {
            return (0, 0);
        };

        let mut delivered = 0;
        let mut dropped = 0;
        for conn_id in members {
            if exclude == Some(*conn_id) {
                continue;
            }
            match self.conns.get(conn_id) {
                Some(entry) if entry.sender.send(frame.clone()).is_ok() => delivered += 1,
                _ => dropped += 1,
            }
        }
        (delivered, dropped)
    }

    pub(crate) fn members_of(&self, event_id: &str) -> Vec<Member> {
        self.rooms
            .get(event_id)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|conn_id| {
                        self.conns.get(conn_id).map(|entry| Member {
                            conn_id: *conn_id,
                            user: entry.user.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn member_count(&self, event_id: &str) -> usize {
        self.rooms.get(event_id).map(HashSet::len).unwrap_or(0)
    }

    pub(crate) fn rooms_of(&self, conn_id: ConnectionId) -> Vec<EventId> {
        self.conns
            .get(&conn_id)
            .map(|entry| entry.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// Shared presence registry. All mutation goes through the single inner
/// lock; the broadcaster fans frames out under the same lock to keep
/// per-room delivery in mutation order.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: Mutex<RegistryInner>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock()
    }

    /// Track a freshly authenticated connection.
    pub fn register(&self, conn_id: ConnectionId, user: UserPublic, sender: FrameSender) {
        self.lock().register(conn_id, user, sender);
    }

    pub fn members_of(&self, event_id: &str) -> Vec<Member> {
        self.lock().members_of(event_id)
    }

    pub fn member_count(&self, event_id: &str) -> usize {
        self.lock().member_count(event_id)
    }

    pub fn rooms_of(&self, conn_id: ConnectionId) -> Vec<EventId> {
        self.lock().rooms_of(conn_id)
    }

    pub fn room_count(&self) -> usize {
        self.lock().room_count()
    }
}
