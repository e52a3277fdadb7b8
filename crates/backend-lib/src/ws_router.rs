// ============================
// backend-lib/src/ws_router.rs
// ============================
//! HTTP router: the realtime endpoint plus the JSON surface over the
//! query/mutation handlers.
//!
//! Bearer extraction on the JSON routes fails soft: a missing or invalid
//! token makes the request anonymous, and each handler decides whether
//! that is acceptable. Browsing events never requires a login.

use crate::connection;
use crate::error::AppError;
use crate::mutations::{
    self, AuthPayload, CreateEventInput, EventPayload, LoginInput, RegisterInput, RequestContext,
};
use crate::store::EventStore;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use checkin_common::UserPublic;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the application router.
pub fn create_router<S>(state: Arc<AppState<S>>) -> Router
where
    S: EventStore + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/ws", get(connection::ws_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/me", get(me_handler))
        .route("/events", get(list_events_handler).post(create_event_handler))
        .route("/events/{id}", get(get_event_handler))
        .route("/events/{id}/join", post(join_event_handler))
        .route("/events/{id}/leave", post(leave_event_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Pull the token out of an `Authorization: Bearer ...` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

fn request_context<'a, S>(state: &'a AppState<S>, headers: &HeaderMap) -> RequestContext<'a, S> {
    let identity = bearer_token(headers).and_then(|token| state.verifier.verify(token));
    RequestContext {
        identity,
        store: &state.store,
        bridge: &state.bridge,
        tokens: &state.tokens,
    }
}

async fn register_handler<S>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(input): Json<RegisterInput>,
) -> Result<Json<AuthPayload>, AppError>
where
    S: EventStore + Clone + Send + Sync + 'static,
{
    let ctx = request_context(&state, &headers);
    mutations::register(&ctx, input).await.map(Json)
}

async fn login_handler<S>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(input): Json<LoginInput>,
) -> Result<Json<AuthPayload>, AppError>
where
    S: EventStore + Clone + Send + Sync + 'static,
{
    let ctx = request_context(&state, &headers);
    mutations::login(&ctx, input).await.map(Json)
}

async fn me_handler<S>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<UserPublic>, AppError>
where
    S: EventStore + Clone + Send + Sync + 'static,
{
    let ctx = request_context(&state, &headers);
    mutations::me(&ctx).await.map(Json)
}

async fn list_events_handler<S>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<EventPayload>>, AppError>
where
    S: EventStore + Clone + Send + Sync + 'static,
{
    let ctx = request_context(&state, &headers);
    mutations::list_events(&ctx).await.map(Json)
}

async fn create_event_handler<S>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(input): Json<CreateEventInput>,
) -> Result<Json<EventPayload>, AppError>
where
    S: EventStore + Clone + Send + Sync + 'static,
{
    let ctx = request_context(&state, &headers);
    mutations::create_event(&ctx, input).await.map(Json)
}

async fn get_event_handler<S>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<EventPayload>, AppError>
where
    S: EventStore + Clone + Send + Sync + 'static,
{
    let ctx = request_context(&state, &headers);
    mutations::get_event(&ctx, &id).await.map(Json)
}

async fn join_event_handler<S>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<EventPayload>, AppError>
where
    S: EventStore + Clone + Send + Sync + 'static,
{
    let ctx = request_context(&state, &headers);
    mutations::join_event(&ctx, &id).await.map(Json)
}

async fn leave_event_handler<S>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<EventPayload>, AppError>
where
    S: EventStore + Clone + Send + Sync + 'static,
{
    let ctx = request_context(&state, &headers);
    mutations::leave_event(&ctx, &id).await.map(Json)
}
