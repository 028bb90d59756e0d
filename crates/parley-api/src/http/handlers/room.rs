//! Room HTTP handlers.
//!
//! Live rooms (hub state):
//! - POST /ws/createRoom              - Register a room in the hub, persist best-effort
//! - GET  /ws/getRooms                - Rooms registered in the hub
//! - GET  /ws/getClients/{room_id}    - Members currently connected to a room
//!
//! Persisted rooms (message service):
//! - POST /api/rooms                  - Persist a room, then register it in the hub
//! - GET  /api/rooms                  - All rooms, most recently active first
//! - GET  /api/rooms/{room_id}        - Single room

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use parley_core::service::MessageService;
use parley_types::error::ServiceError;
use parley_types::room::{MemberSummary, Room, RoomSummary, SYSTEM_OWNER};
use serde::{Deserialize, Serialize};

use crate::http::error::AppError;
use crate::http::response::{Envelope, RequestStamp};
use crate::state::AppState;

/// Request body for POST /ws/createRoom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLiveRoomRequest {
    pub id: String,
    pub name: String,
}

/// Request body for POST /api/rooms.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Live rooms
// ---------------------------------------------------------------------------

/// POST /ws/createRoom - Register a room in the hub.
///
/// The room is joinable as soon as this returns. Persisting it runs in the
/// background; failures are logged and do not affect the response.
pub async fn create_live_room(
    State(state): State<AppState>,
    Json(req): Json<CreateLiveRoomRequest>,
) -> Result<Json<Envelope<CreateLiveRoomRequest>>, AppError> {
    let stamp = RequestStamp::new();

    require("id", &req.id)?;
    require("name", &req.name)?;

    if !state.hub.create_room(&req.id, &req.name, SYSTEM_OWNER).await {
        return Err(ServiceError::Conflict(format!("room '{}' already exists", req.id)).into());
    }

    let messages = state.messages.clone();
    let (id, name) = (req.id.clone(), req.name.clone());
    tokio::spawn(async move {
        match messages.create_room(&id, &name, SYSTEM_OWNER).await {
            Ok(_) => tracing::debug!(room_id = %id, "live room persisted"),
            Err(e) => tracing::warn!(room_id = %id, error = %e, "failed to persist live room"),
        }
    });

    let join_link = format!("/ws/joinRoom/{}", req.id);
    Ok(Json(stamp.ok(req).link("join", join_link)))
}

/// GET /ws/getRooms - Rooms registered in the hub.
pub async fn list_live_rooms(
    State(state): State<AppState>,
) -> Json<Envelope<Vec<RoomSummary>>> {
    let stamp = RequestStamp::new();
    Json(stamp.ok(state.hub.rooms().await))
}

/// GET /ws/getClients/{room_id} - Members of a hub room. Unknown rooms
/// yield an empty list.
pub async fn list_live_members(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Json<Envelope<Vec<MemberSummary>>> {
    let stamp = RequestStamp::new();
    Json(stamp.ok(state.hub.members(&room_id).await))
}

// ---------------------------------------------------------------------------
// Persisted rooms
// ---------------------------------------------------------------------------

/// POST /api/rooms - Persist a room and make it joinable.
pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Envelope<Room>>), AppError> {
    let stamp = RequestStamp::new();

    require("id", &req.id)?;
    require("name", &req.name)?;
    require("ownerId", &req.owner_id)?;

    let room = state
        .messages
        .create_room(&req.id, &req.name, &req.owner_id)
        .await?;

    if !state.hub.create_room(&room.id, &room.name, &room.owner_id).await {
        tracing::debug!(room_id = %room.id, "room already live in hub");
    }

    let self_link = format!("/api/rooms/{}", room.id);
    let join_link = format!("/ws/joinRoom/{}", room.id);
    Ok((
        StatusCode::CREATED,
        Json(stamp.ok(room).link("self", self_link).link("join", join_link)),
    ))
}

/// GET /api/rooms - All persisted rooms.
pub async fn list_rooms(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<Room>>>, AppError> {
    let stamp = RequestStamp::new();

    let rooms = state.messages.get_rooms().await?;
    Ok(Json(stamp.ok(rooms)))
}

/// GET /api/rooms/{room_id} - Single persisted room.
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Envelope<Room>>, AppError> {
    let stamp = RequestStamp::new();

    let room = state.messages.get_room_by_id(&room_id).await?;
    let history_link = format!("/api/messages/room/{}", room.id);
    Ok(Json(stamp.ok(room).link("messages", history_link)))
}
