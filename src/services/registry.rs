use std::sync::Arc;

use chrono::Duration;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

use crate::{
    config::Config,
    error::AppResult,
    models::{ItemId, Match, Room, UserSession},
};

use super::{
    match_engine::{detect_match, MatchEvent, MatchNotifier},
    Clock, RoomLimits, RoomRegistry, SessionStore, SystemClock,
};

/// Registry shared between request handlers, the hub and background tasks
pub type SharedRegistry = Arc<RwLock<Registry>>;

/// Single owner of all room and session state
///
/// Mutations go through `&mut self`, so wrapping the registry in one lock
/// serializes them.
pub struct Registry {
    rooms: RoomRegistry,
    sessions: SessionStore,
    notifier: MatchNotifier,
    clock: Arc<dyn Clock>,
    retention_hours: i64,
}

impl Registry {
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            rooms: RoomRegistry::new(RoomLimits {
                max_rooms: config.max_rooms,
                max_room_members: config.max_room_members,
            }),
            sessions: SessionStore::new(),
            notifier: MatchNotifier::new(config.match_channel_capacity),
            clock,
            retention_hours: config.room_retention_hours,
        }
    }

    pub fn shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Creates a room; a full registry is swept once before giving up
    pub fn create_room(&mut self, name: &str) -> AppResult<Room> {
        if self.rooms.len() >= self.rooms.limits().max_rooms {
            self.cleanup_old_rooms(self.retention_hours);
        }

        let now = self.clock.now();
        let room = self.rooms.create_room(name, now)?.clone();
        tracing::info!(room_id = %room.id, room_name = %room.name, "Room created");
        Ok(room)
    }

    /// Exact lookup; callers upper-case user-supplied codes first
    pub fn get_room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Admits a user, creating their session if needed
    ///
    /// Re-joining is a successful no-op.
    pub fn join_room(
        &mut self,
        room_id: &str,
        user_id: &str,
        user_name: &str,
        preferences: Option<Value>,
    ) -> AppResult<()> {
        let added = self.rooms.join(room_id, user_id).map_err(|e| {
            tracing::info!(room_id = %room_id, user_id = %user_id, error = %e, "Join rejected");
            e
        })?;

        let now = self.clock.now();
        self.sessions.attach(user_id, user_name, preferences, now);

        if added {
            tracing::info!(room_id = %room_id, user_id = %user_id, "User joined room");
        }
        Ok(())
    }

    /// Removes the user from the room; returns whether they were a member
    pub fn leave_room(&mut self, room_id: &str, user_id: &str) -> AppResult<bool> {
        let departure = self.rooms.leave(room_id, user_id)?;
        if departure.removed {
            tracing::info!(room_id = %room_id, user_id = %user_id, "User left room");
        }
        if departure.closed {
            tracing::info!(room_id = %room_id, "Room closed, last member left");
        }
        Ok(departure.removed)
    }

    /// Deletes inactive rooms older than `max_age_hours`; returns their ids
    pub fn cleanup_old_rooms(&mut self, max_age_hours: i64) -> Vec<String> {
        let cutoff = self.clock.now() - Duration::hours(max_age_hours);
        let removed = self.rooms.remove_expired(cutoff);
        if !removed.is_empty() {
            tracing::info!(
                removed = removed.len(),
                remaining = self.rooms.len(),
                "Removed stale rooms"
            );
        }
        removed
    }

    /// Records a like and returns any matches it completed
    ///
    /// Unknown users and repeat likes produce nothing. Each new match is
    /// also published to subscribers.
    pub fn add_liked_movie(&mut self, user_id: &str, item_id: ItemId) -> Vec<Match> {
        let Some(session) = self.sessions.get_mut(user_id) else {
            tracing::debug!(user_id = %user_id, item_id, "Like from user without a session");
            return Vec::new();
        };
        if !session.like(item_id) {
            return Vec::new();
        }

        let now = self.clock.now();
        let mut found = Vec::new();
        for room in self.rooms.rooms_with_member_mut(user_id) {
            if let Some(record) = detect_match(room, &self.sessions, item_id, now) {
                tracing::info!(
                    room_id = %room.id,
                    item_id,
                    users = ?record.users,
                    "Match found"
                );
                self.notifier.publish(MatchEvent {
                    room_id: room.id.clone(),
                    record: record.clone(),
                });
                found.push(record);
            }
        }
        found
    }

    /// Receiver for matches recorded from now on; drop it to unsubscribe
    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.notifier.subscribe()
    }

    /// Handle for subscribing without holding the registry lock
    pub fn notifier(&self) -> MatchNotifier {
        self.notifier.clone()
    }

    pub fn session(&self, user_id: &str) -> Option<&UserSession> {
        self.sessions.get(user_id)
    }

    /// Sessions of the room's members, in member order
    pub fn member_sessions<'a>(&'a self, room: &'a Room) -> impl Iterator<Item = &'a UserSession> {
        room.members.iter().filter_map(|id| self.sessions.get(id))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
