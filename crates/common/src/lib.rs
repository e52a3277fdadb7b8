// ================
// common/src/lib.rs
// ================
//! Common types shared between the check-in server and its clients.
//! This module defines the realtime protocol frames and supporting types.

use serde::{Deserialize, Serialize};

/// Event identifier, opaque to the realtime layer (foreign key into the store).
pub type EventId = String;

/// User identifier as issued by the store.
pub type UserId = String;

/// Identity claim produced by token verification.
///
/// This is the decoded form of both static demo tokens and signed tokens;
/// it carries no display data, only what the credential itself asserts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
}

/// User projection safe to put on the wire (never includes credentials).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

/// Frames sent from client to server over the realtime channel.
///
/// The bearer credential travels in the connection handshake, not in a
/// frame, so every frame here is post-authentication.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "msgType", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Subscribe this connection to an event's room.
    #[serde(rename_all = "camelCase")]
    JoinRoom { event_id: EventId },
    /// Unsubscribe this connection from an event's room.
    #[serde(rename_all = "camelCase")]
    LeaveRoom { event_id: EventId },
}

/// Frames sent from server to client over the realtime channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "msgType", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// Snapshot returned to a connection that just joined a room.
    ///
    /// `member_count` is live viewers of the room; `attendee_count` is the
    /// store-authoritative attendance. The two are never derived from each
    /// other.
    #[serde(rename_all = "camelCase")]
    RoomState {
        event_id: EventId,
        member_count: usize,
        attendee_count: usize,
        is_requester_attending: bool,
    },
    /// Another connection joined the room. Not sent to the joiner itself.
    #[serde(rename_all = "camelCase")]
    MemberJoined {
        event_id: EventId,
        user: UserPublic,
        member_count: usize,
    },
    /// A connection left the room (explicit leave or disconnect).
    /// Not sent to the leaver itself.
    #[serde(rename_all = "camelCase")]
    MemberLeft {
        event_id: EventId,
        user_id: UserId,
        member_count: usize,
    },
    /// Store-level attendance changed via a mutation. Sent to every
    /// member of the room, including the acting user's own connections.
    #[serde(rename_all = "camelCase")]
    AttendanceChanged {
        event_id: EventId,
        attendee_count: usize,
    },
    /// The last frame could not be parsed.
    #[serde(rename_all = "camelCase")]
    MalformedMessage { err_msg: String },
    /// Request-level failure, e.g. joining a room for an unknown event.
    #[serde(rename_all = "camelCase")]
    Error { code: String, message: String },
}
