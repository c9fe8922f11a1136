use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::UserSession;

/// Per-user sessions, keyed by user id
///
/// Sessions live for the lifetime of the process; leaving a room does not
/// forget what a user liked.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, UserSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<&UserSession> {
        self.sessions.get(user_id)
    }

    pub fn get_mut(&mut self, user_id: &str) -> Option<&mut UserSession> {
        self.sessions.get_mut(user_id)
    }

    /// Returns the user's session, creating it on first sight
    ///
    /// An existing session keeps its liked items; the display name is
    /// refreshed and preferences are replaced only when supplied.
    pub fn attach(
        &mut self,
        user_id: &str,
        user_name: &str,
        preferences: Option<Value>,
        now: DateTime<Utc>,
    ) -> &mut UserSession {
        let session = self.sessions.entry(user_id.to_string()).or_insert_with(|| {
            tracing::debug!(user_id = %user_id, "Session created");
            UserSession::new(
                user_id.to_string(),
                user_name.to_string(),
                crate::models::default_preferences(),
                now,
            )
        });

        session.name = user_name.to_string();
        if let Some(preferences) = preferences {
            session.preferences = preferences;
        }
        session
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
