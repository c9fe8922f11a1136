//! Room, session and match state plus the connection hub that delivers
//! match events to sockets.

pub mod cleanup;
pub mod clock;
pub mod hub;
pub mod match_engine;
pub mod registry;
pub mod room_registry;
pub mod session_store;

pub use cleanup::spawn_cleanup_task;
pub use clock::{Clock, ManualClock, SystemClock};
pub use hub::{Binding, ConnectionId, Hub};
pub use match_engine::{MatchEvent, MatchNotifier};
pub use registry::{Registry, SharedRegistry};
pub use room_registry::{Departure, RoomLimits, RoomRegistry};
pub use session_store::SessionStore;
