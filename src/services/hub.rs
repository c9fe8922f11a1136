use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::protocol::ServerMessage;

use super::{MatchEvent, SharedRegistry};

/// Identifies one live socket
pub type ConnectionId = Uuid;

/// The (user, room) identity a connection claimed with `join`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub user_id: String,
    pub room_id: String,
    pub user_name: String,
}

struct Connection {
    sender: mpsc::UnboundedSender<ServerMessage>,
    binding: Option<Binding>,
}

/// Maps live connections to their bindings and delivers outbound messages
#[derive(Clone)]
pub struct Hub {
    registry: SharedRegistry,
    connections: Arc<RwLock<HashMap<ConnectionId, Connection>>>,
}

impl Hub {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a connection with no binding yet
    ///
    /// Returns false, leaving the existing entry untouched, when `id` is
    /// already registered.
    pub async fn connect(
        &self,
        id: ConnectionId,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> bool {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&id) {
            tracing::warn!(connection_id = %id, "Duplicate connection id refused");
            return false;
        }
        connections.insert(
            id,
            Connection {
                sender,
                binding: None,
            },
        );
        tracing::debug!(connection_id = %id, "Connection registered");
        true
    }

    pub async fn binding(&self, id: ConnectionId) -> Option<Binding> {
        self.connections
            .read()
            .await
            .get(&id)
            .and_then(|conn| conn.binding.clone())
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Joins the bound user to the room and returns the `joined` reply
    ///
    /// A connection holds at most one membership: re-binding to another
    /// room or user leaves the previous one first. The binding is recorded
    /// only when the registry admits the user.
    pub async fn join(
        &self,
        id: ConnectionId,
        binding: Binding,
        preferences: Option<Value>,
    ) -> ServerMessage {
        let previous = self.binding(id).await;

        let result = {
            let mut registry = self.registry.write().await;
            if let Some(prev) = previous.as_ref().filter(|prev| {
                prev.room_id != binding.room_id || prev.user_id != binding.user_id
            }) {
                if let Err(e) = registry.leave_room(&prev.room_id, &prev.user_id) {
                    tracing::debug!(error = %e, room_id = %prev.room_id, "Previous room already gone");
                }
            }
            registry.join_room(
                &binding.room_id,
                &binding.user_id,
                &binding.user_name,
                preferences,
            )
        };

        let room_id = binding.room_id.clone();
        let mut connections = self.connections.write().await;
        match result {
            Ok(()) => {
                if let Some(conn) = connections.get_mut(&id) {
                    conn.binding = Some(binding);
                }
                ServerMessage::joined(&room_id, Ok(()))
            }
            Err(e) => {
                if previous.is_some() {
                    if let Some(conn) = connections.get_mut(&id) {
                        conn.binding = None;
                    }
                }
                ServerMessage::joined(&room_id, Err(e.to_string()))
            }
        }
    }

    /// Drops the connection and leaves the room it was bound to
    pub async fn disconnect(&self, id: ConnectionId) {
        let removed = self.connections.write().await.remove(&id);
        let Some(binding) = removed.and_then(|conn| conn.binding) else {
            tracing::debug!(connection_id = %id, "Unbound connection closed");
            return;
        };

        if let Err(e) = self
            .registry
            .write()
            .await
            .leave_room(&binding.room_id, &binding.user_id)
        {
            tracing::warn!(
                connection_id = %id,
                room_id = %binding.room_id,
                error = %e,
                "Leave on disconnect failed"
            );
        }
    }

    /// Queues a message for one connection; false if it is gone
    pub async fn send(&self, id: ConnectionId, message: ServerMessage) -> bool {
        let sender = match self.connections.read().await.get(&id) {
            Some(conn) => conn.sender.clone(),
            None => return false,
        };
        deliver(id, &sender, message)
    }

    /// Sends a `match` event to every connection bound to the event's room
    ///
    /// Works on a snapshot of the connection set; closed connections are
    /// logged and skipped. Returns how many sends were queued.
    pub async fn broadcast_match(&self, event: &MatchEvent) -> usize {
        let targets: Vec<(ConnectionId, mpsc::UnboundedSender<ServerMessage>)> = self
            .connections
            .read()
            .await
            .iter()
            .filter(|(_, conn)| {
                conn.binding
                    .as_ref()
                    .is_some_and(|b| b.room_id == event.room_id)
            })
            .map(|(id, conn)| (*id, conn.sender.clone()))
            .collect();

        let message = ServerMessage::Match {
            room_id: event.room_id.clone(),
            record: event.record.clone(),
        };

        let delivered = targets
            .iter()
            .filter(|(id, sender)| deliver(*id, sender, message.clone()))
            .count();

        tracing::debug!(
            room_id = %event.room_id,
            targets = targets.len(),
            delivered,
            "Match broadcast"
        );
        delivered
    }

    /// Drains match events into `broadcast_match` until the channel closes
    pub async fn run(self, mut events: broadcast::Receiver<MatchEvent>) {
        tracing::info!("Match fan-out started");
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.broadcast_match(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Match fan-out lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::info!("Match fan-out stopped");
    }
}

fn deliver(
    id: ConnectionId,
    sender: &mpsc::UnboundedSender<ServerMessage>,
    message: ServerMessage,
) -> bool {
    match sender.send(message) {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!(connection_id = %id, "Send to closed connection");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        config::Config,
        models::Match,
        services::{MatchNotifier, Registry},
    };

    fn hub() -> Hub {
        Hub::new(Registry::new(&Config::default()).shared())
    }

    fn binding(user: &str, room: &str) -> Binding {
        Binding {
            user_id: user.to_string(),
            room_id: room.to_string(),
            user_name: user.to_string(),
        }
    }

    async fn room(hub: &Hub) -> String {
        hub.registry.write().await.create_room("r").unwrap().id
    }

    #[tokio::test]
    async fn test_join_binds_on_success_only() {
        let hub = hub();
        let room_id = room(&hub).await;
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.connect(id, tx).await;

        let reply = hub.join(id, binding("a", "NOPE00"), None).await;
        assert!(matches!(reply, ServerMessage::Joined { success: false, .. }));
        assert!(hub.binding(id).await.is_none());

        let reply = hub.join(id, binding("a", &room_id), None).await;
        assert_eq!(reply, ServerMessage::joined(&room_id, Ok(())));
        assert_eq!(hub.binding(id).await, Some(binding("a", &room_id)));
    }

    #[tokio::test]
    async fn test_rebinding_leaves_previous_room() {
        let hub = hub();
        let first = room(&hub).await;
        let second = room(&hub).await;
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.connect(id, tx).await;

        hub.join(id, binding("a", &first), None).await;
        hub.join(id, binding("a", &second), None).await;

        let registry = hub.registry.read().await;
        assert!(!registry.get_room(&first).unwrap().has_member("a"));
        assert!(registry.get_room(&second).unwrap().has_member("a"));
    }

    #[tokio::test]
    async fn test_disconnect_leaves_room() {
        let hub = hub();
        let room_id = room(&hub).await;
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.connect(id, tx).await;
        hub.join(id, binding("a", &room_id), None).await;

        hub.disconnect(id).await;
        assert_eq!(hub.connection_count().await, 0);
        let registry = hub.registry.read().await;
        let room = registry.get_room(&room_id).unwrap();
        assert!(room.members.is_empty());
        assert!(!room.is_active);
    }

    #[tokio::test]
    async fn test_broadcast_targets_room_and_survives_closed_receivers() {
        let hub = hub();
        let room_id = room(&hub).await;
        let other_room = room(&hub).await;

        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();
        hub.connect(a, tx_a).await;
        hub.connect(b, tx_b).await;
        hub.connect(c, tx_c).await;
        hub.join(a, binding("a", &room_id), None).await;
        hub.join(b, binding("b", &room_id), None).await;
        hub.join(c, binding("c", &other_room), None).await;

        // b's socket writer is gone
        drop(rx_b);

        let event = MatchEvent {
            room_id: room_id.clone(),
            record: Match::new(42, vec!["a".into(), "b".into()], Utc::now()),
        };
        assert_eq!(hub.broadcast_match(&event).await, 1);

        let Some(ServerMessage::Match { room_id: got, record }) = rx_a.recv().await else {
            panic!("expected a match event");
        };
        assert_eq!(got, room_id);
        assert_eq!(record.item_id, 42);
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_unknown_connection() {
        let hub = hub();
        assert!(!hub.send(Uuid::new_v4(), ServerMessage::room_checked(None)).await);
    }

    #[tokio::test]
    async fn test_duplicate_connection_id_is_refused() {
        let hub = hub();
        let room_id = room(&hub).await;
        let shared = Uuid::new_v4();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();

        assert!(hub.connect(shared, tx_a).await);
        hub.join(shared, binding("A", &room_id), None).await;
        assert!(!hub.connect(shared, tx_b).await);

        // The first socket keeps its binding
        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(hub.binding(shared).await, Some(binding("A", &room_id)));

        hub.disconnect(shared).await;
        let registry = hub.registry.read().await;
        let room = registry.get_room(&room_id).unwrap();
        assert!(room.members.is_empty());
        assert!(!room.is_active);
    }

    #[tokio::test]
    async fn test_fan_out_continues_after_lag() {
        let hub = hub();
        let room_id = room(&hub).await;
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.connect(id, tx).await;
        hub.join(id, binding("a", &room_id), None).await;

        let notifier = MatchNotifier::new(1);
        let events = notifier.subscribe();
        let event = |item_id| MatchEvent {
            room_id: room_id.clone(),
            record: Match::new(item_id, vec!["a".into(), "b".into()], Utc::now()),
        };

        // Capacity 1: only the newest of these survives for the receiver
        for item_id in 1..=3 {
            notifier.publish(event(item_id));
        }
        let fanout = tokio::spawn(hub.clone().run(events));

        let Some(ServerMessage::Match { record, .. }) = rx.recv().await else {
            panic!("expected a match event after the lag");
        };
        assert_eq!(record.item_id, 3);

        notifier.publish(event(4));
        let Some(ServerMessage::Match { record, .. }) = rx.recv().await else {
            panic!("expected a later match event");
        };
        assert_eq!(record.item_id, 4);

        fanout.abort();
    }
}
