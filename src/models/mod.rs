mod matches;
mod room;
mod session;

pub use matches::Match;
pub use room::{normalize_room_code, Room, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
pub use session::{default_preferences, UserSession};

/// Catalog item identifier (a movie or show), opaque to this service
pub type ItemId = i64;
