// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for Prometheus metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_ACTIVE: &str = "ws.active";
pub const WS_AUTH_REJECTED: &str = "ws.auth_rejected";
pub const ROOM_JOINED: &str = "room.joined";
pub const ROOM_LEFT: &str = "room.left";
pub const ROOM_ACTIVE: &str = "room.active";
pub const BROADCAST_SENT: &str = "broadcast.sent";
pub const BROADCAST_DROPPED: &str = "broadcast.dropped";
pub const ATTENDANCE_CHANGED: &str = "attendance.changed";
