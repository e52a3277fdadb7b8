// ============================
// backend-lib/src/bridge.rs
// ============================
//! Mutation-to-broadcast bridge.
//!
//! Mutation handlers call this after, and only after, a store write has
//! committed. Store write happens-before broadcast; a failed write means
//! this is never invoked. Delivery itself is best effort: a client that
//! misses a frame still sees correct state on its next store-backed
//! query.

use crate::broadcast::RoomBroadcaster;
use checkin_common::UserPublic;
use std::sync::Arc;

pub struct AttendanceBridge {
    broadcaster: Arc<RoomBroadcaster>,
}

impl AttendanceBridge {
    pub fn new(broadcaster: Arc<RoomBroadcaster>) -> Self {
        Self { broadcaster }
    }

    /// Announce a committed attendance change to everyone viewing the
    /// event's room. Never fails; the mutation already returned success.
    pub fn attendance_changed(&self, event_id: &str, actor: &UserPublic, attendee_count: usize) {
        let delivered = self
            .broadcaster
            .announce_attendance_change(event_id, attendee_count);
        tracing::debug!(
            event_id = %event_id,
            actor = %actor.id,
            attendee_count = attendee_count,
            delivered = delivered,
            "attendance change announced"
        );
    }
}
