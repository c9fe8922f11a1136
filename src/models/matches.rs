use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ItemId;

/// A set of two or more room members who all liked the same item
///
/// `users` keeps room-member order at detection time, but identity for
/// de-duplication is the item plus the *set* of user ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub item_id: ItemId,
    pub users: Vec<String>,
    pub matched_at: DateTime<Utc>,
}

impl Match {
    pub fn new(item_id: ItemId, users: Vec<String>, matched_at: DateTime<Utc>) -> Self {
        Self {
            item_id,
            users,
            matched_at,
        }
    }

    /// True when this record covers `item_id` and exactly the given users
    pub fn covers(&self, item_id: ItemId, users: &[String]) -> bool {
        if self.item_id != item_id || self.users.len() != users.len() {
            return false;
        }
        let ours: HashSet<&str> = self.users.iter().map(String::as_str).collect();
        users.iter().all(|u| ours.contains(u.as_str()))
    }
}
