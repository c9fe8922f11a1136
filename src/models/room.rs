use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ItemId, Match};

/// Length of a generated room code
pub const ROOM_CODE_LEN: usize = 6;

/// Characters a room code is drawn from
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Room codes are matched case-insensitively by upper-casing before lookup
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// A named, code-addressed group of users collaborating on matching
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    /// Member user ids in join order; never contains duplicates
    pub members: Vec<String>,
    /// Append-only
    pub matches: Vec<Match>,
    /// Flips to false when the last member leaves and never flips back
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(id: String, name: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            members: Vec::new(),
            matches: Vec::new(),
            is_active: true,
            created_at,
        }
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    /// Appends the user unless already present; returns whether it was added
    pub fn add_member(&mut self, user_id: &str) -> bool {
        if self.has_member(user_id) {
            return false;
        }
        self.members.push(user_id.to_string());
        true
    }

    /// Removes the user; closes the room when it empties out
    pub fn remove_member(&mut self, user_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != user_id);
        let removed = self.members.len() != before;
        if removed && self.members.is_empty() {
            self.is_active = false;
        }
        removed
    }

    pub fn has_match(&self, item_id: ItemId, users: &[String]) -> bool {
        self.matches.iter().any(|m| m.covers(item_id, users))
    }

    /// Inactive and created strictly before `cutoff`
    pub fn is_expired(&self, cutoff: DateTime<Utc>) -> bool {
        !self.is_active && self.created_at < cutoff
    }
}
