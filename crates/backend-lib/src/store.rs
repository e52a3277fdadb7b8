// ============================
// backend-lib/src/store.rs
// ============================
//! Event store abstraction with an in-memory implementation.
//!
//! The relational engine behind this interface is deliberately out of
//! scope; everything above it depends only on the `EventStore` trait.
//! Attendance lives here and nowhere else. The presence registry tracks
//! who is *viewing* a room, which is a different set.

use crate::error::AppError;
use async_trait::async_trait;
use checkin_common::{UserId, UserPublic};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// A user row as the store returns it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Projection safe to put on the wire.
    pub fn public(&self) -> UserPublic {
        UserPublic {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// An event row with its current attendee set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendees: Vec<UserId>,
}

impl EventRecord {
    pub fn attendee_count(&self) -> usize {
        self.attendees.len()
    }
}

/// Input for creating an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Repository-style interface to the relational store.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    /// Create a user. Fails with `EmailTaken` on a duplicate email.
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: Option<String>,
    ) -> Result<UserRecord, AppError>;

    async fn find_event(&self, id: &str) -> Result<Option<EventRecord>, AppError>;

    /// All events, ordered by start time ascending.
    async fn list_events(&self) -> Result<Vec<EventRecord>, AppError>;

    async fn create_event(&self, new: NewEvent) -> Result<EventRecord, AppError>;

    /// Record attendance and return the new attendee count.
    /// Fails with `AlreadyAttending` without changing anything.
    async fn add_attendee(&self, event_id: &str, user_id: &str) -> Result<usize, AppError>;

    /// Remove attendance and return the new attendee count.
    /// Fails with `NotAttending` without changing anything.
    async fn remove_attendee(&self, event_id: &str, user_id: &str) -> Result<usize, AppError>;

    async fn count_attendees(&self, event_id: &str) -> Result<usize, AppError>;

    async fn is_attending(&self, event_id: &str, user_id: &str) -> Result<bool, AppError>;
}

struct EventRow {
    id: String,
    name: String,
    description: Option<String>,
    location: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    attendees: HashSet<UserId>,
}

impl EventRow {
    fn record(&self) -> EventRecord {
        let mut attendees: Vec<UserId> = self.attendees.iter().cloned().collect();
        attendees.sort();
        EventRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            attendees,
        }
    }
}

/// In-memory store backing the binary and the test suites.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: std::sync::Arc<DashMap<UserId, UserRecord>>,
    events: std::sync::Arc<DashMap<String, EventRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user with a caller-chosen id. Used by seeding and tests.
    pub fn insert_user(&self, user: UserRecord) {
        self.users.insert(user.id.clone(), user);
    }

    /// Insert an event with a caller-chosen id. Used by seeding and tests.
    pub fn insert_event(&self, id: &str, new: NewEvent) {
        self.events.insert(
            id.to_string(),
            EventRow {
                id: id.to_string(),
                name: new.name,
                description: new.description,
                location: new.location,
                start_time: new.start_time,
                end_time: new.end_time,
                attendees: HashSet::new(),
            },
        );
    }

    /// Seed the demo identities behind the static token table, plus a
    /// couple of events to browse.
    pub fn seed_demo(&self) {
        let demo_users = [
            ("demo-user-id", "Demo User", "demo@example.com"),
            ("john-user-id", "John Doe", "john@example.com"),
            ("jane-user-id", "Jane Smith", "jane@example.com"),
            ("alice-user-id", "Alice Johnson", "alice@example.com"),
            ("bob-user-id", "Bob Wilson", "bob@example.com"),
        ];
        for (id, name, email) in demo_users {
            self.insert_user(UserRecord {
                id: id.to_string(),
                name: name.to_string(),
                email: email.to_string(),
                password_hash: None,
                avatar: Some(avatar_url(name)),
                created_at: Utc::now(),
            });
        }

        let now = Utc::now();
        self.insert_event(
            "evt-product-launch",
            NewEvent {
                name: "Product Launch Party".to_string(),
                description: Some("Celebrate the v2 launch with the whole team.".to_string()),
                location: Some("Main Hall".to_string()),
                start_time: now + Duration::days(1),
                end_time: now + Duration::days(1) + Duration::hours(3),
            },
        );
        self.insert_event(
            "evt-team-offsite",
            NewEvent {
                name: "Team Offsite".to_string(),
                description: Some("Quarterly planning and hiking.".to_string()),
                location: Some("Mountain View Lodge".to_string()),
                start_time: now + Duration::days(7),
                end_time: now + Duration::days(9),
            },
        );
    }
}

/// Placeholder avatar for seeded users, matching the shape real
/// registrations get.
pub fn avatar_url(name: &str) -> String {
    let encoded: String = name
        .chars()
        .map(|c| if c == ' ' { '+' } else { c })
        .collect();
    format!("https://ui-avatars.com/api/?name={encoded}&size=150")
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.get(id).map(|u| u.value().clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(|u| u.value().clone()))
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: Option<String>,
    ) -> Result<UserRecord, AppError> {
        if self.find_user_by_email(email).await?.is_some() {
            return Err(AppError::EmailTaken);
        }
        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            avatar: Some(avatar_url(name)),
            created_at: Utc::now(),
        };
        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_event(&self, id: &str) -> Result<Option<EventRecord>, AppError> {
        Ok(self.events.get(id).map(|row| row.record()))
    }

    async fn list_events(&self) -> Result<Vec<EventRecord>, AppError> {
        let mut events: Vec<EventRecord> = self.events.iter().map(|row| row.record()).collect();
        events.sort_by_key(|e| e.start_time);
        Ok(events)
    }

    async fn create_event(&self, new: NewEvent) -> Result<EventRecord, AppError> {
        let row = EventRow {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            location: new.location,
            start_time: new.start_time,
            end_time: new.end_time,
            attendees: HashSet::new(),
        };
        let record = row.record();
        self.events.insert(row.id.clone(), row);
        Ok(record)
    }

    async fn add_attendee(&self, event_id: &str, user_id: &str) -> Result<usize, AppError> {
        let mut row = self.events.get_mut(event_id).ok_or(AppError::EventNotFound)?;
        if !row.attendees.insert(user_id.to_string()) {
            return Err(AppError::AlreadyAttending);
        }
        Ok(row.attendees.len())
    }

    async fn remove_attendee(&self, event_id: &str, user_id: &str) -> Result<usize, AppError> {
        let mut row = self.events.get_mut(event_id).ok_or(AppError::EventNotFound)?;
        if !row.attendees.remove(user_id) {
            return Err(AppError::NotAttending);
        }
        Ok(row.attendees.len())
    }

    async fn count_attendees(&self, event_id: &str) -> Result<usize, AppError> {
        let row = self.events.get(event_id).ok_or(AppError::EventNotFound)?;
        Ok(row.attendees.len())
    }

    async fn is_attending(&self, event_id: &str, user_id: &str) -> Result<bool, AppError> {
        let row = self.events.get(event_id).ok_or(AppError::EventNotFound)?;
        Ok(row.attendees.contains(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> NewEvent {
        let now = Utc::now();
        NewEvent {
            name: name.to_string(),
            description: None,
            location: None,
            start_time: now,
            end_time: now + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn add_and_remove_attendee() {
        let store = MemoryStore::new();
        store.insert_event("evt-1", event("Test"));

        assert_eq!(store.add_attendee("evt-1", "user-a").await.unwrap(), 1);
        assert_eq!(store.add_attendee("evt-1", "user-b").await.unwrap(), 2);
        assert!(store.is_attending("evt-1", "user-a").await.unwrap());

        assert_eq!(store.remove_attendee("evt-1", "user-a").await.unwrap(), 1);
        assert!(!store.is_attending("evt-1", "user-a").await.unwrap());
        assert_eq!(store.count_attendees("evt-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_join_is_an_error_and_changes_nothing() {
        let store = MemoryStore::new();
        store.insert_event("evt-1", event("Test"));

        store.add_attendee("evt-1", "user-a").await.unwrap();
        let err = store.add_attendee("evt-1", "user-a").await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyAttending));
        assert_eq!(store.count_attendees("evt-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn leaving_when_not_attending_is_an_error() {
        let store = MemoryStore::new();
        store.insert_event("evt-1", event("Test"));

        let err = store.remove_attendee("evt-1", "user-a").await.unwrap_err();
        assert!(matches!(err, AppError::NotAttending));
    }

    #[tokio::test]
    async fn unknown_event_is_an_error() {
        let store = MemoryStore::new();
        let err = store.add_attendee("missing", "user-a").await.unwrap_err();
        assert!(matches!(err, AppError::EventNotFound));
        assert!(store.find_event("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.create_user("A", "a@example.com", None).await.unwrap();
        let err = store
            .create_user("A2", "A@Example.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmailTaken));
    }

    #[tokio::test]
    async fn list_events_ordered_by_start_time() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert_event(
            "evt-later",
            NewEvent {
                start_time: now + Duration::days(2),
                end_time: now + Duration::days(2) + Duration::hours(1),
                ..event("Later")
            },
        );
        store.insert_event(
            "evt-sooner",
            NewEvent {
                start_time: now + Duration::days(1),
                end_time: now + Duration::days(1) + Duration::hours(1),
                ..event("Sooner")
            },
        );

        let events = store.list_events().await.unwrap();
        assert_eq!(events[0].id, "evt-sooner");
        assert_eq!(events[1].id, "evt-later");
    }

    #[tokio::test]
    async fn seed_demo_matches_static_tokens() {
        let store = MemoryStore::new();
        store.seed_demo();
        let user = store.find_user("demo-user-id").await.unwrap().unwrap();
        assert_eq!(user.email, "demo@example.com");
        assert_eq!(store.list_events().await.unwrap().len(), 2);
    }
}
