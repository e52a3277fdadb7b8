// ============================
// backend-lib/src/lib.rs
// ============================
//! Core library for the event check-in backend.
//!
//! Realtime presence (who is viewing an event) lives in the
//! [`registry`]; authoritative attendance (who is going) lives behind
//! the [`store`] trait. The [`broadcast`] layer pushes typed frames to
//! room members, and the [`bridge`] ties store mutations to those
//! broadcasts so viewers see attendance changes as they commit.

pub mod auth;
pub mod bridge;
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod mutations;
pub mod registry;
pub mod store;
pub mod ws_router;

use crate::auth::{LayeredVerifier, TokenIssuer, TokenVerifier};
use crate::bridge::AttendanceBridge;
use crate::broadcast::RoomBroadcaster;
use crate::config::Settings;
use crate::registry::PresenceRegistry;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState<S> {
    /// Bearer credential verification
    pub verifier: Arc<dyn TokenVerifier>,
    /// Signed token issuance
    pub tokens: Arc<TokenIssuer>,
    /// Event store backend
    pub store: S,
    /// Live room membership
    pub registry: Arc<PresenceRegistry>,
    /// Fan-out over room members
    pub broadcaster: Arc<RoomBroadcaster>,
    /// Post-commit attendance notification
    pub bridge: Arc<AttendanceBridge>,
    /// Settings
    pub settings: Arc<Settings>,
}

impl<S> AppState<S> {
    /// Wire up the application state. The registry is built here, once,
    /// and shared by the broadcaster and the connection handlers.
    pub fn new(store: S, settings: Settings) -> Self {
        let registry = Arc::new(PresenceRegistry::new());
        let broadcaster = Arc::new(RoomBroadcaster::new(registry.clone()));
        let bridge = Arc::new(AttendanceBridge::new(broadcaster.clone()));
        let verifier: Arc<dyn TokenVerifier> =
            Arc::new(LayeredVerifier::from_settings(&settings.auth));
        let tokens = Arc::new(TokenIssuer::new(&settings.auth));

        Self {
            verifier,
            tokens,
            store,
            registry,
            broadcaster,
            bridge,
            settings: Arc::new(settings),
        }
    }
}
