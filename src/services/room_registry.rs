use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::{
    error::{AppError, AppResult},
    models::{Room, ROOM_CODE_ALPHABET, ROOM_CODE_LEN},
};

/// Attempts at drawing an unused room code before giving up
const MAX_CODE_ATTEMPTS: usize = 64;

/// Outcome of a leave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// The user was a member and is gone now
    pub removed: bool,
    /// The room lost its last member and became inactive
    pub closed: bool,
}

/// Upper bounds on tracked rooms and per-room membership
#[derive(Debug, Clone, Copy)]
pub struct RoomLimits {
    pub max_rooms: usize,
    pub max_room_members: usize,
}

impl Default for RoomLimits {
    fn default() -> Self {
        Self {
            max_rooms: 10_000,
            max_room_members: 50,
        }
    }
}

/// Draws a 6-character code from `[A-Z0-9]`
pub fn generate_room_code<R: Rng>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Owns every tracked room, active or waiting for cleanup
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    limits: RoomLimits,
}

impl RoomRegistry {
    pub fn new(limits: RoomLimits) -> Self {
        Self {
            rooms: HashMap::new(),
            limits,
        }
    }

    /// Creates a room under a fresh code; never replaces a tracked room
    pub fn create_room(&mut self, name: &str, now: DateTime<Utc>) -> AppResult<&Room> {
        self.create_room_with(name, now, &mut rand::thread_rng())
    }

    pub fn create_room_with<R: Rng>(
        &mut self,
        name: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> AppResult<&Room> {
        if self.rooms.len() >= self.limits.max_rooms {
            return Err(AppError::CapacityExceeded(
                "Too many rooms, try again later".to_string(),
            ));
        }

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = generate_room_code(rng);
            if self.rooms.contains_key(&code) {
                tracing::debug!(code = %code, attempt, "Room code collision, regenerating");
                continue;
            }

            let room = Room::new(code.clone(), name.to_string(), now);
            return Ok(self.rooms.entry(code).or_insert(room));
        }

        Err(AppError::Internal(
            "Could not allocate a unique room code".to_string(),
        ))
    }

    /// Exact, case-sensitive lookup
    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Adds the user to the room's members
    ///
    /// Returns `Ok(false)` when the user was already a member.
    pub fn join(&mut self, room_id: &str, user_id: &str) -> AppResult<bool> {
        let max_members = self.limits.max_room_members;
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        if !room.is_active {
            return Err(AppError::RoomInactive("Room is no longer active".to_string()));
        }
        if room.has_member(user_id) {
            return Ok(false);
        }
        if room.members.len() >= max_members {
            return Err(AppError::RoomFull("Room is full".to_string()));
        }

        Ok(room.add_member(user_id))
    }

    /// Removes the user; leaving a room you are not in is a no-op
    pub fn leave(&mut self, room_id: &str, user_id: &str) -> AppResult<Departure> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        let removed = room.remove_member(user_id);
        Ok(Departure {
            removed,
            closed: removed && !room.is_active,
        })
    }

    /// Drops every inactive room created before `cutoff`; returns their ids
    pub fn remove_expired(&mut self, cutoff: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .rooms
            .values()
            .filter(|room| room.is_expired(cutoff))
            .map(|room| room.id.clone())
            .collect();

        for id in &expired {
            self.rooms.remove(id);
        }
        expired
    }

    /// Rooms that currently list `user_id` as a member
    pub fn rooms_with_member_mut<'a>(
        &'a mut self,
        user_id: &'a str,
    ) -> impl Iterator<Item = &'a mut Room> + 'a {
        self.rooms
            .values_mut()
            .filter(move |room| room.has_member(user_id))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn limits(&self) -> RoomLimits {
        self.limits
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Duration;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn test_generated_codes_use_the_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let code = generate_room_code(&mut rng);
            assert_eq!(code.len(), ROOM_CODE_LEN);
            assert!(code.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_codes_are_unique_across_tracked_rooms() {
        let mut registry = RoomRegistry::default();
        let now = Utc::now();
        let mut seen = HashSet::new();
        for i in 0..1_000 {
            let room = registry.create_room(&format!("room {i}"), now).unwrap();
            assert!(seen.insert(room.id.clone()));
        }
        assert_eq!(registry.len(), 1_000);
    }

    #[test]
    fn test_collision_regenerates_instead_of_overwriting() {
        let mut registry = RoomRegistry::default();
        let now = Utc::now();

        // Same seed produces the same first code twice
        let first = registry
            .create_room_with("first", now, &mut StdRng::seed_from_u64(1))
            .unwrap()
            .id
            .clone();
        let second = registry
            .create_room_with("second", now, &mut StdRng::seed_from_u64(1))
            .unwrap()
            .id
            .clone();

        assert_ne!(first, second);
        assert_eq!(registry.get(&first).unwrap().name, "first");
        assert_eq!(registry.get(&second).unwrap().name, "second");
    }

    #[test]
    fn test_room_limit_rejects_creation() {
        let mut registry = RoomRegistry::new(RoomLimits {
            max_rooms: 1,
            max_room_members: 2,
        });
        registry.create_room("one", Utc::now()).unwrap();
        let err = registry.create_room("two", Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded(_)));
    }

    #[test]
    fn test_join_rules() {
        let mut registry = RoomRegistry::new(RoomLimits {
            max_rooms: 10,
            max_room_members: 2,
        });
        let id = registry.create_room("r", Utc::now()).unwrap().id.clone();

        assert!(registry.join(&id, "a").unwrap());
        assert!(!registry.join(&id, "a").unwrap());
        assert!(registry.join(&id, "b").unwrap());
        assert!(matches!(registry.join(&id, "c"), Err(AppError::RoomFull(_))));
        // Existing members may re-join a full room
        assert!(!registry.join(&id, "b").unwrap());
        assert!(matches!(registry.join("NOPE00", "a"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let mut registry = RoomRegistry::default();
        let id = registry.create_room("r", Utc::now()).unwrap().id.clone();
        let lower = id.to_lowercase();
        if lower != id {
            assert!(registry.get(&lower).is_none());
        }
        assert!(registry.get(&id).is_some());
    }

    #[test]
    fn test_closed_room_rejects_join() {
        let mut registry = RoomRegistry::default();
        let id = registry.create_room("r", Utc::now()).unwrap().id.clone();
        registry.join(&id, "a").unwrap();
        assert_eq!(
            registry.leave(&id, "a").unwrap(),
            Departure {
                removed: true,
                closed: true
            }
        );
        assert!(matches!(registry.join(&id, "a"), Err(AppError::RoomInactive(_))));
    }

    #[test]
    fn test_leave_unknown_room_fails_and_stranger_is_noop() {
        let mut registry = RoomRegistry::default();
        let id = registry.create_room("r", Utc::now()).unwrap().id.clone();
        registry.join(&id, "a").unwrap();
        let departure = registry.leave(&id, "stranger").unwrap();
        assert!(!departure.removed);
        assert!(!departure.closed);
        assert_eq!(registry.get(&id).unwrap().members.len(), 1);
        assert!(matches!(registry.leave("NOPE00", "a"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_remove_expired_spares_active_and_young_rooms() {
        let mut registry = RoomRegistry::default();
        let old = Utc::now() - Duration::hours(30);
        let young = Utc::now() - Duration::hours(1);

        let active_old = registry.create_room("active old", old).unwrap().id.clone();
        let closed_old = registry.create_room("closed old", old).unwrap().id.clone();
        let closed_young = registry.create_room("closed young", young).unwrap().id.clone();
        registry.get_mut(&closed_old).unwrap().is_active = false;
        registry.get_mut(&closed_young).unwrap().is_active = false;

        let removed = registry.remove_expired(Utc::now() - Duration::hours(24));
        assert_eq!(removed, vec![closed_old.clone()]);
        assert!(registry.get(&active_old).is_some());
        assert!(registry.get(&closed_young).is_some());
        assert!(registry.get(&closed_old).is_none());
    }
}
