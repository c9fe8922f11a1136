use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    middleware::RequestId,
    protocol::{ClientMessage, ServerMessage},
    services::{Binding, ConnectionId},
};

use super::AppState;

/// Upgrades `GET /ws` to the match socket
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Response {
    // Minted server-side; the request id is client-controlled
    let connection_id = Uuid::new_v4();
    ws.on_upgrade(move |socket| {
        handle_socket(socket, state, connection_id).instrument(tracing::info_span!(
            "ws_connection",
            connection_id = %connection_id,
            request_id = %request_id,
        ))
    })
}

async fn handle_socket(socket: WebSocket, state: AppState, connection_id: ConnectionId) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    if !state.hub.connect(connection_id, tx).await {
        tracing::error!("Connection id already registered, dropping socket");
        return;
    }
    tracing::info!("Client connected");

    let writer = tokio::spawn(
        async move {
            while let Some(message) = rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to encode outbound message");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
        .in_current_span(),
    );

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_text(&state, connection_id, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Socket read failed");
                break;
            }
        }
    }

    state.hub.disconnect(connection_id).await;
    writer.abort();
    tracing::info!("Client disconnected");
}

/// Parses one frame and queues the reply, if any
///
/// Bad frames are logged and dropped; the connection stays open.
pub async fn handle_text(state: &AppState, connection_id: ConnectionId, text: &str) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed frame");
            return;
        }
    };

    if let Some(reply) = dispatch(state, connection_id, message).await {
        state.hub.send(connection_id, reply).await;
    }
}

/// Applies one client message and returns the direct reply
///
/// Matches triggered by `likedMovie` are not replies; they reach every
/// connection in the room through the hub's fan-out.
pub async fn dispatch(
    state: &AppState,
    connection_id: ConnectionId,
    message: ClientMessage,
) -> Option<ServerMessage> {
    match message {
        ClientMessage::CreateRoom(msg) => {
            let result = state.registry.write().await.create_room(&msg.room_name);
            Some(match result {
                Ok(room) => ServerMessage::room_created(Ok(&room)),
                Err(e) => ServerMessage::room_created(Err(e.to_string())),
            })
        }
        ClientMessage::CheckRoom(msg) => {
            let registry = state.registry.read().await;
            let room = registry.get_room(&msg.room_code);
            tracing::debug!(room_code = %msg.room_code, found = room.is_some(), "Room checked");
            Some(ServerMessage::room_checked(room))
        }
        ClientMessage::Join(msg) => {
            let binding = Binding {
                user_id: msg.user_id,
                room_id: msg.room_id,
                user_name: msg.user_name,
            };
            Some(state.hub.join(connection_id, binding, msg.preferences).await)
        }
        ClientMessage::LikedMovie(msg) => {
            let matches = state
                .registry
                .write()
                .await
                .add_liked_movie(&msg.user_id, msg.movie_id);
            tracing::debug!(
                user_id = %msg.user_id,
                item_id = msg.movie_id,
                room_id = %msg.room_id,
                new_matches = matches.len(),
                "Like recorded"
            );
            None
        }
        ClientMessage::Unknown => None,
    }
}
