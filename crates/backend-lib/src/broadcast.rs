// ============================
// backend-lib/src/broadcast.rs
// ============================
//! Room broadcaster.
//!
//! Wraps the presence registry: every announce mutates membership first
//! and fans the resulting frame out to the room while still holding the
//! registrar lock, so members observe announcements in the order the
//! state changes were applied. Join/leave announcements skip the acting
//! connection; attendance changes reach every member including the
//! actor's own sessions.

use crate::metrics as keys;
use crate::registry::{ConnectionId, Departure, JoinOutcome, LeaveOutcome, PresenceRegistry};
use checkin_common::ServerFrame;
use metrics::{counter, gauge};
use std::sync::Arc;

pub struct RoomBroadcaster {
    registry: Arc<PresenceRegistry>,
}

impl RoomBroadcaster {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    /// Add a connection to a room and announce it to the other members.
    /// Re-joining is a no-op that still reports the current state and
    /// produces no duplicate announcement. Returns `None` for a
    /// connection the registry does not know.
    pub fn announce_join(&self, event_id: &str, conn_id: ConnectionId) -> Option<JoinOutcome> {
        let mut inner = self.registry.lock();
        let outcome = inner.join(event_id, conn_id)?;

        if outcome.newly_joined {
            let frame = ServerFrame::MemberJoined {
                event_id: event_id.to_string(),
                user: outcome.user.clone(),
                member_count: outcome.member_count,
            };
            let (delivered, dropped) = inner.send_to_room(event_id, Some(conn_id), &frame);
            self.record_fanout(event_id, delivered, dropped);
            counter!(keys::ROOM_JOINED).increment(1);
        }
        gauge!(keys::ROOM_ACTIVE).set(inner.room_count() as f64);

        Some(outcome)
    }

    /// Remove a connection from a room and announce the departure to the
    /// remaining members. Leaving a room twice is a no-op with no
    /// duplicate announcement.
    pub fn announce_leave(&self, event_id: &str, conn_id: ConnectionId) -> LeaveOutcome {
        let mut inner = self.registry.lock();
        let outcome = inner.leave(event_id, conn_id);

        if outcome.was_member {
            if let Some(user_id) = &outcome.user_id {
                let frame = ServerFrame::MemberLeft {
                    event_id: event_id.to_string(),
                    user_id: user_id.clone(),
                    member_count: outcome.member_count,
                };
                let (delivered, dropped) = inner.send_to_room(event_id, None, &frame);
                self.record_fanout(event_id, delivered, dropped);
            }
            counter!(keys::ROOM_LEFT).increment(1);
        }
        gauge!(keys::ROOM_ACTIVE).set(inner.room_count() as f64);

        outcome
    }

    /// Sweep a disconnected connection out of every room it was in,
    /// announcing one departure per room. Exactly the same path as an
    /// explicit leave, whatever caused the disconnect.
    pub fn announce_disconnect(&self, conn_id: ConnectionId) -> Vec<Departure> {
        let mut inner = self.registry.lock();
        let Some((user, departures)) = inner.remove_connection(conn_id) else {
            return Vec::new();
        };

        for departure in &departures {
            let frame = ServerFrame::MemberLeft {
                event_id: departure.event_id.clone(),
                user_id: user.id.clone(),
                member_count: departure.member_count,
            };
            let (delivered, dropped) = inner.send_to_room(&departure.event_id, None, &frame);
            self.record_fanout(&departure.event_id, delivered, dropped);
            counter!(keys::ROOM_LEFT).increment(1);
        }
        gauge!(keys::ROOM_ACTIVE).set(inner.room_count() as f64);

        departures
    }

    /// Push a store-derived attendance count to every member of a room.
    /// The count is taken as given; the registry never computes it.
    pub fn announce_attendance_change(&self, event_id: &str, attendee_count: usize) -> usize {
        let inner = self.registry.lock();
        let frame = ServerFrame::AttendanceChanged {
            event_id: event_id.to_string(),
            attendee_count,
        };
        let (delivered, dropped) = inner.send_to_room(event_id, None, &frame);
        self.record_fanout(event_id, delivered, dropped);
        counter!(keys::ATTENDANCE_CHANGED).increment(1);
        delivered
    }

    /// Current live-viewer count of a room.
    pub fn room_state(&self, event_id: &str) -> usize {
        self.registry.member_count(event_id)
    }

    fn record_fanout(&self, event_id: &str, delivered: usize, dropped: usize) {
        counter!(keys::BROADCAST_SENT).increment(delivered as u64);
        if dropped > 0 {
            counter!(keys::BROADCAST_DROPPED).increment(dropped as u64);
            tracing::warn!(
                event_id = %event_id,
                dropped = dropped,
                "some room members did not receive a broadcast"
            );
        }
    }
}
