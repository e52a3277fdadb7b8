// ============================
// backend-lib/src/connection.rs
// ============================
//! Connection lifecycle.
//!
//! Each realtime connection moves through connecting, authenticated,
//! joined-rooms, disconnected. The credential arrives as handshake
//! metadata; verification plus the user lookup are bounded by the
//! handshake timeout, and a connection that fails either is closed with
//! a reason code instead of being left in limbo. Explicit leave-room
//! frames and transport disconnects drive the same cleanup path, so no
//! room ever retains a stale member.

use crate::error::AppError;
use crate::metrics as keys;
use crate::registry::{ConnectionId, FrameSender};
use crate::store::{EventStore, UserRecord};
use crate::AppState;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use checkin_common::{ClientFrame, ServerFrame, UserPublic};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

/// WebSocket close codes:
/// 4002 = credential missing or invalid
/// 4003 = credential valid but no such user
/// 4008 = handshake did not complete in time
const CLOSE_AUTH_FAILED: u16 = 4002;
const CLOSE_UNKNOWN_USER: u16 = 4003;
const CLOSE_HANDSHAKE_TIMEOUT: u16 = 4008;

/// Query parameters for the WebSocket handshake.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// Why a handshake was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRejection {
    pub code: u16,
    pub reason: &'static str,
}

/// GET /ws?token=...
/// Authenticates the handshake, then hands the socket to the connection
/// actor. On auth failure the connection is upgraded and immediately
/// closed with the matching close code.
pub async fn ws_handler<S>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response
where
    S: EventStore + Clone + Send + Sync + 'static,
{
    match authenticate(&state, params.token.as_deref()).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "realtime connection authenticated");
            ws.on_upgrade(move |socket| run_connection(socket, state, user.public()))
        },
        Err(rejection) => {
            counter!(keys::WS_AUTH_REJECTED).increment(1);
            tracing::warn!(
                close_code = rejection.code,
                reason = rejection.reason,
                "realtime connection refused"
            );
            ws.on_upgrade(move |mut socket| async move {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: rejection.code,
                        reason: rejection.reason.into(),
                    })))
                    .await;
            })
        },
    }
}

/// Resolve the handshake credential to a full user row, within the
/// handshake timeout.
pub async fn authenticate<S: EventStore>(
    state: &AppState<S>,
    token: Option<&str>,
) -> Result<UserRecord, AuthRejection> {
    let Some(token) = token else {
        return Err(AuthRejection {
            code: CLOSE_AUTH_FAILED,
            reason: "Credential required",
        });
    };

    let Some(identity) = state.verifier.verify(token) else {
        return Err(AuthRejection {
            code: CLOSE_AUTH_FAILED,
            reason: "Credential invalid",
        });
    };

    let budget = Duration::from_secs(state.settings.realtime.handshake_timeout_secs);
    match timeout(budget, state.store.find_user(&identity.user_id)).await {
        Err(_) => Err(AuthRejection {
            code: CLOSE_HANDSHAKE_TIMEOUT,
            reason: "Handshake timed out",
        }),
        Ok(Err(_)) | Ok(Ok(None)) => Err(AuthRejection {
            code: CLOSE_UNKNOWN_USER,
            reason: "Unknown user",
        }),
        Ok(Ok(Some(user))) => Ok(user),
    }
}

/// Drive one authenticated socket until it disconnects.
async fn run_connection<S>(socket: WebSocket, state: Arc<AppState<S>>, user: UserPublic)
where
    S: EventStore + Clone + Send + Sync + 'static,
{
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let actor = ConnectionActor::connect(state, user, tx);

    // Writer task: drain the outbox to the socket as JSON text frames.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader loop: dispatch frames until the transport goes away.
    loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => actor.handle_frame(frame).await,
                Err(e) => actor.send(ServerFrame::MalformedMessage {
                    err_msg: e.to_string(),
                }),
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}, // pings and pongs are handled by the transport
            Some(Err(e)) => {
                tracing::warn!(error = %e, "realtime receive error");
                break;
            },
        }
    }

    writer.abort();
    actor.disconnect();
}

/// Per-connection command handler.
///
/// Owns the connection's registration for its whole lifetime; dropping
/// out through [`disconnect`](Self::disconnect) is the only exit and
/// sweeps the connection from every room it joined.
pub struct ConnectionActor<S> {
    conn_id: ConnectionId,
    user: UserPublic,
    state: Arc<AppState<S>>,
    outbox: FrameSender,
}

impl<S: EventStore> ConnectionActor<S> {
    /// Register a freshly authenticated connection.
    pub fn connect(state: Arc<AppState<S>>, user: UserPublic, outbox: FrameSender) -> Self {
        let conn_id = Uuid::new_v4();
        state.registry.register(conn_id, user.clone(), outbox.clone());
        counter!(keys::WS_CONNECTION).increment(1);
        gauge!(keys::WS_ACTIVE).increment(1.0);
        Self {
            conn_id,
            user,
            state,
            outbox,
        }
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    pub async fn handle_frame(&self, frame: ClientFrame) {
        match frame {
            ClientFrame::JoinRoom { event_id } => self.handle_join(&event_id).await,
            ClientFrame::LeaveRoom { event_id } => self.handle_leave(&event_id),
        }
    }

    /// Join an event's room. The backing event must exist; an unknown id
    /// gets an error frame and no room is created.
    async fn handle_join(&self, event_id: &str) {
        let event = match self.state.store.find_event(event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                self.send(ServerFrame::Error {
                    code: AppError::EventNotFound.error_code().to_string(),
                    message: "Event not found".to_string(),
                });
                return;
            },
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "event lookup failed");
                self.send(ServerFrame::Error {
                    code: e.error_code().to_string(),
                    message: e.sanitized_message(),
                });
                return;
            },
        };

        let is_requester_attending = self
            .state
            .store
            .is_attending(event_id, &self.user.id)
            .await
            .unwrap_or(false);

        let Some(outcome) = self.state.broadcaster.announce_join(event_id, self.conn_id) else {
            // the connection is gone from the registry; nothing to report
            return;
        };

        self.send(ServerFrame::RoomState {
            event_id: event_id.to_string(),
            member_count: outcome.member_count,
            attendee_count: event.attendee_count(),
            is_requester_attending,
        });
    }

    fn handle_leave(&self, event_id: &str) {
        self.state.broadcaster.announce_leave(event_id, self.conn_id);
    }

    pub fn send(&self, frame: ServerFrame) {
        let _ = self.outbox.send(frame);
    }

    /// Tear the connection down: sweep it from every joined room and
    /// announce each departure. Runs on every disconnect cause.
    pub fn disconnect(self) {
        let departures = self.state.broadcaster.announce_disconnect(self.conn_id);
        gauge!(keys::WS_ACTIVE).decrement(1.0);
        tracing::info!(
            user_id = %self.user.id,
            rooms_left = departures.len(),
            "realtime connection closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::store::{MemoryStore, NewEvent};
    use chrono::{Duration as ChronoDuration, Utc};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn app_state() -> Arc<AppState<MemoryStore>> {
        let store = MemoryStore::new();
        store.seed_demo();
        Arc::new(AppState::new(store, Settings::default()))
    }

    fn user(id: &str) -> UserPublic {
        UserPublic {
            id: id.to_string(),
            name: format!("User {id}"),
            email: format!("{id}@example.com"),
            avatar: None,
        }
    }

    fn actor(
        state: &Arc<AppState<MemoryStore>>,
        id: &str,
    ) -> (ConnectionActor<MemoryStore>, UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = ConnectionActor::connect(state.clone(), user(id), tx);
        (actor, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerFrame>) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn join_returns_room_state_and_notifies_existing_members() {
        let state = app_state();
        let (a, mut rx_a) = actor(&state, "alice-user-id");
        let (b, mut rx_b) = actor(&state, "bob-user-id");

        a.handle_frame(ClientFrame::JoinRoom {
            event_id: "evt-product-launch".to_string(),
        })
        .await;

        let frames = drain(&mut rx_a);
        assert_eq!(
            frames,
            vec![ServerFrame::RoomState {
                event_id: "evt-product-launch".to_string(),
                member_count: 1,
                attendee_count: 0,
                is_requester_attending: false,
            }]
        );

        b.handle_frame(ClientFrame::JoinRoom {
            event_id: "evt-product-launch".to_string(),
        })
        .await;

        // the existing member hears about b
        let frames = drain(&mut rx_a);
        assert_eq!(frames.len(), 1);
        assert!(matches!(
            &frames[0],
            ServerFrame::MemberJoined { user, member_count, .. }
                if user.id == "bob-user-id" && *member_count == 2
        ));

        // b gets the snapshot, not its own join announcement
        let frames = drain(&mut rx_b);
        assert_eq!(frames.len(), 1);
        assert!(matches!(
            &frames[0],
            ServerFrame::RoomState { member_count: 2, .. }
        ));
    }

    #[tokio::test]
    async fn join_unknown_event_is_an_error_and_creates_no_room() {
        let state = app_state();
        let (a, mut rx_a) = actor(&state, "alice-user-id");

        a.handle_frame(ClientFrame::JoinRoom {
            event_id: "evt-missing".to_string(),
        })
        .await;

        let frames = drain(&mut rx_a);
        assert_eq!(frames.len(), 1);
        assert!(matches!(
            &frames[0],
            ServerFrame::Error { code, .. } if code == "EVENT_001"
        ));
        assert_eq!(state.registry.room_count(), 0);
    }

    #[tokio::test]
    async fn room_state_reports_attendance_from_the_store() {
        let state = app_state();
        state
            .store
            .add_attendee("evt-product-launch", "alice-user-id")
            .await
            .unwrap();
        state
            .store
            .add_attendee("evt-product-launch", "bob-user-id")
            .await
            .unwrap();

        let (a, mut rx_a) = actor(&state, "alice-user-id");
        a.handle_frame(ClientFrame::JoinRoom {
            event_id: "evt-product-launch".to_string(),
        })
        .await;

        let frames = drain(&mut rx_a);
        assert_eq!(
            frames,
            vec![ServerFrame::RoomState {
                event_id: "evt-product-launch".to_string(),
                member_count: 1,
                attendee_count: 2,
                is_requester_attending: true,
            }]
        );
    }

    #[tokio::test]
    async fn disconnect_sweeps_all_rooms_and_notifies_each() {
        let state = app_state();
        let now = Utc::now();
        state.store.insert_event(
            "evt-extra",
            NewEvent {
                name: "Extra".to_string(),
                description: None,
                location: None,
                start_time: now,
                end_time: now + ChronoDuration::hours(1),
            },
        );

        let (a, _rx_a) = actor(&state, "alice-user-id");
        let (b, mut rx_b) = actor(&state, "bob-user-id");

        for event_id in ["evt-product-launch", "evt-extra"] {
            a.handle_frame(ClientFrame::JoinRoom {
                event_id: event_id.to_string(),
            })
            .await;
            b.handle_frame(ClientFrame::JoinRoom {
                event_id: event_id.to_string(),
            })
            .await;
        }
        drain(&mut rx_b);

        let a_conn = a.conn_id();
        a.disconnect();

        let frames = drain(&mut rx_b);
        assert_eq!(frames.len(), 2);
        for frame in &frames {
            assert!(matches!(
                frame,
                ServerFrame::MemberLeft { user_id, member_count, .. }
                    if user_id == "alice-user-id" && *member_count == 1
            ));
        }
        assert!(state.registry.rooms_of(a_conn).is_empty());
    }

    #[tokio::test]
    async fn authenticate_accepts_static_token_and_rejects_garbage() {
        let state = app_state();

        let user = authenticate(&state, Some("demo-token-123")).await.unwrap();
        assert_eq!(user.id, "demo-user-id");

        let rejection = authenticate(&state, Some("garbage")).await.unwrap_err();
        assert_eq!(rejection.code, CLOSE_AUTH_FAILED);

        let rejection = authenticate(&state, None).await.unwrap_err();
        assert_eq!(rejection.code, CLOSE_AUTH_FAILED);
    }

    #[tokio::test]
    async fn authenticate_rejects_identity_without_a_user_row() {
        let store = MemoryStore::new(); // no seed, so the demo users are absent
        let state = Arc::new(AppState::new(store, Settings::default()));

        let rejection = authenticate(&state, Some("demo-token-123")).await.unwrap_err();
        assert_eq!(rejection.code, CLOSE_UNKNOWN_USER);
    }
}
