use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use super::ItemId;

/// Per-user liked-item state, shared by every room the user is in
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub id: String,
    pub name: String,
    pub liked_items: HashSet<ItemId>,
    /// Client-supplied preferences, stored and returned untouched
    pub preferences: Value,
    pub created_at: DateTime<Utc>,
}

/// Preferences attached to a session when the client sends none
pub fn default_preferences() -> Value {
    json!({ "contentType": [], "genres": [] })
}

impl UserSession {
    pub fn new(id: String, name: String, preferences: Value, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            liked_items: HashSet::new(),
            preferences,
            created_at,
        }
    }

    /// Records a like; returns false when the item was already liked
    pub fn like(&mut self, item_id: ItemId) -> bool {
        self.liked_items.insert(item_id)
    }

    pub fn likes(&self, item_id: ItemId) -> bool {
        self.liked_items.contains(&item_id)
    }
}
