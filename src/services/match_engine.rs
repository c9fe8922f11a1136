use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{ItemId, Match, Room};

use super::SessionStore;

/// A match newly recorded in a room
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub room_id: String,
    #[serde(rename = "match")]
    pub record: Match,
}

/// Fan-out point between match detection and whoever delivers matches
///
/// Every subscriber gets its own receiver; dropping the receiver
/// unsubscribes. A subscriber that falls behind only loses its own backlog.
#[derive(Debug, Clone)]
pub struct MatchNotifier {
    sender: broadcast::Sender<MatchEvent>,
}

impl MatchNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn publish(&self, event: MatchEvent) {
        // Err only means nobody is listening right now
        if self.sender.send(event).is_err() {
            tracing::debug!("Match recorded with no subscribers");
        }
    }
}

/// Checks one room for a new match on `item_id`
///
/// The qualifying set is every member whose session likes the item, in
/// member order. A match is appended only when that set has at least two
/// users and no earlier record covers the identical set.
pub fn detect_match(
    room: &mut Room,
    sessions: &SessionStore,
    item_id: ItemId,
    now: DateTime<Utc>,
) -> Option<Match> {
    let likers: Vec<String> = room
        .members
        .iter()
        .filter(|member| sessions.get(member).is_some_and(|s| s.likes(item_id)))
        .cloned()
        .collect();

    if likers.len() < 2 || room.has_match(item_id, &likers) {
        return None;
    }

    let record = Match::new(item_id, likers, now);
    room.matches.push(record.clone());
    Some(record)
}
