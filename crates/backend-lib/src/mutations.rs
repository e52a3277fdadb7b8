// ============================
// backend-lib/src/mutations.rs
// ============================
//! Query and mutation handler bodies.
//!
//! Each handler takes an explicit request context instead of an ambient
//! request object. The attendance mutations write to the store first and
//! invoke the bridge only on success, so persistence and notification
//! stay causally ordered.

use crate::auth::{hash_password, validate_password, verify_password, TokenIssuer};
use crate::bridge::AttendanceBridge;
use crate::error::AppError;
use crate::store::{EventRecord, EventStore};
use checkin_common::{Identity, UserPublic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-request context, built once at the edge and passed explicitly.
pub struct RequestContext<'a, S> {
    pub identity: Option<Identity>,
    pub store: &'a S,
    pub bridge: &'a AttendanceBridge,
    pub tokens: &'a TokenIssuer,
}

impl<'a, S> RequestContext<'a, S> {
    fn require_identity(&self) -> Result<&Identity, AppError> {
        self.identity
            .as_ref()
            .ok_or_else(|| AppError::Auth("Authentication required".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventInput {
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Token plus the user it belongs to, returned by register and login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub token: String,
    pub user: UserPublic,
}

/// Event projection returned by the read and mutation handlers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendee_count: usize,
    pub is_requester_attending: bool,
}

impl EventPayload {
    fn from_record(record: EventRecord, requester: Option<&str>) -> Self {
        let is_requester_attending = requester
            .map(|user_id| record.attendees.iter().any(|a| a == user_id))
            .unwrap_or(false);
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            location: record.location,
            start_time: record.start_time,
            end_time: record.end_time,
            attendee_count: record.attendees.len(),
            is_requester_attending,
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !local.contains(char::is_whitespace)
        && !domain.contains(char::is_whitespace)
        && !domain.contains('@')
        && domain.contains('.')
}

/// Create an account and issue a token for it.
pub async fn register<S: EventStore>(
    ctx: &RequestContext<'_, S>,
    input: RegisterInput,
) -> Result<AuthPayload, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::InvalidInput("Name must not be empty".to_string()));
    }
    if !is_valid_email(&input.email) {
        return Err(AppError::InvalidInput("Invalid email format".to_string()));
    }
    validate_password(&input.password)?;

    let hash = hash_password(&input.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;
    let user = ctx
        .store
        .create_user(input.name.trim(), &input.email, Some(hash))
        .await?;

    let token = ctx.tokens.issue(&user.id, &user.email)?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok(AuthPayload {
        token,
        user: user.public(),
    })
}

/// Check credentials and issue a token.
pub async fn login<S: EventStore>(
    ctx: &RequestContext<'_, S>,
    input: LoginInput,
) -> Result<AuthPayload, AppError> {
    let user = ctx
        .store
        .find_user_by_email(&input.email)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid email or password".to_string()))?;

    if !verify_password(user.password_hash.as_deref(), &input.password) {
        return Err(AppError::Auth("Invalid email or password".to_string()));
    }

    let token = ctx.tokens.issue(&user.id, &user.email)?;
    Ok(AuthPayload {
        token,
        user: user.public(),
    })
}

/// The authenticated user's own profile.
pub async fn me<S: EventStore>(ctx: &RequestContext<'_, S>) -> Result<UserPublic, AppError> {
    let identity = ctx.require_identity()?;
    let user = ctx
        .store
        .find_user(&identity.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(user.public())
}

/// All events, soonest first. Works unauthenticated.
pub async fn list_events<S: EventStore>(
    ctx: &RequestContext<'_, S>,
) -> Result<Vec<EventPayload>, AppError> {
    let requester = ctx.identity.as_ref().map(|i| i.user_id.as_str());
    let events = ctx.store.list_events().await?;
    Ok(events
        .into_iter()
        .map(|record| EventPayload::from_record(record, requester))
        .collect())
}

/// One event by id. Works unauthenticated.
pub async fn get_event<S: EventStore>(
    ctx: &RequestContext<'_, S>,
    event_id: &str,
) -> Result<EventPayload, AppError> {
    let requester = ctx.identity.as_ref().map(|i| i.user_id.as_str());
    let record = ctx
        .store
        .find_event(event_id)
        .await?
        .ok_or(AppError::EventNotFound)?;
    Ok(EventPayload::from_record(record, requester))
}

/// Create an event. Requires authentication; the creator does not
/// automatically attend.
pub async fn create_event<S: EventStore>(
    ctx: &RequestContext<'_, S>,
    input: CreateEventInput,
) -> Result<EventPayload, AppError> {
    ctx.require_identity()?;
    if input.name.trim().is_empty() {
        return Err(AppError::InvalidInput("Name must not be empty".to_string()));
    }
    if input.end_time <= input.start_time {
        return Err(AppError::InvalidInput(
            "End time must be after start time".to_string(),
        ));
    }

    let record = ctx
        .store
        .create_event(crate::store::NewEvent {
            name: input.name.trim().to_string(),
            description: input.description,
            location: input.location,
            start_time: input.start_time,
            end_time: input.end_time,
        })
        .await?;
    tracing::info!(event_id = %record.id, "event created");
    Ok(EventPayload::from_record(record, None))
}

/// Attend an event. On success every connection viewing the event's room
/// is notified with the fresh attendee count.
pub async fn join_event<S: EventStore>(
    ctx: &RequestContext<'_, S>,
    event_id: &str,
) -> Result<EventPayload, AppError> {
    let identity = ctx.require_identity()?.clone();
    let user = ctx
        .store
        .find_user(&identity.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let attendee_count = ctx.store.add_attendee(event_id, &user.id).await?;
    ctx.bridge
        .attendance_changed(event_id, &user.public(), attendee_count);

    tracing::info!(user_id = %user.id, event_id = %event_id, "user joined event");
    get_event(ctx, event_id).await
}

/// Stop attending an event, with the same notification contract as
/// [`join_event`].
pub async fn leave_event<S: EventStore>(
    ctx: &RequestContext<'_, S>,
    event_id: &str,
) -> Result<EventPayload, AppError> {
    let identity = ctx.require_identity()?.clone();
    let user = ctx
        .store
        .find_user(&identity.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let attendee_count = ctx.store.remove_attendee(event_id, &user.id).await?;
    ctx.bridge
        .attendance_changed(event_id, &user.public(), attendee_count);

    tracing::info!(user_id = %user.id, event_id = %event_id, "user left event");
    get_event(ctx, event_id).await
}
