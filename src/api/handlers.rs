use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{normalize_room_code, Match},
    protocol::RoomSummary,
};

use super::AppState;

// Request/Response types

/// Body of `POST /api/rooms`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomActionRequest {
    pub action: Option<String>,
    pub room_name: Option<String>,
    pub room_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub success: bool,
    pub room: RoomSummary,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub id: String,
    pub name: String,
}

/// Full snapshot of a room, including every recorded match
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetailsResponse {
    pub id: String,
    pub name: String,
    pub code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub members: Vec<MemberResponse>,
    pub matches: Vec<Match>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Create or look up a room without an open socket
pub async fn room_action(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<RoomActionRequest>, JsonRejection>,
) -> AppResult<Json<RoomResponse>> {
    let Json(request) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;

    match request.action.as_deref() {
        Some("create") => {
            let name = non_empty(request.room_name)
                .ok_or_else(|| AppError::InvalidInput("Room name is required".to_string()))?;

            let room = state.registry.write().await.create_room(&name)?;
            tracing::info!(request_id = %request_id, room_id = %room.id, "Room created over HTTP");

            Ok(Json(RoomResponse {
                success: true,
                room: RoomSummary::from(&room),
            }))
        }
        Some("check") => {
            let code = non_empty(request.room_code)
                .ok_or_else(|| AppError::InvalidInput("Room code is required".to_string()))?;
            let code = normalize_room_code(&code);

            let registry = state.registry.read().await;
            let room = registry
                .get_room(&code)
                .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;
            tracing::debug!(request_id = %request_id, room_id = %room.id, "Room checked");

            Ok(Json(RoomResponse {
                success: true,
                room: RoomSummary::from(room),
            }))
        }
        _ => Err(AppError::InvalidInput("Invalid action".to_string())),
    }
}

/// Room snapshot with members and matches, for clients catching up
pub async fn get_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<RoomDetailsResponse>> {
    let registry = state.registry.read().await;
    let room = registry
        .get_room(&normalize_room_code(&code))
        .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

    let members = registry
        .member_sessions(room)
        .map(|session| MemberResponse {
            id: session.id.clone(),
            name: session.name.clone(),
        })
        .collect();

    Ok(Json(RoomDetailsResponse {
        id: room.id.clone(),
        name: room.name.clone(),
        code: room.id.clone(),
        is_active: room.is_active,
        created_at: room.created_at,
        members,
        matches: room.matches.clone(),
    }))
}
