//! Read-only room statistics and membership.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::frame::MemberInfo;
use crate::services;
use crate::services::room::ServerStats;
use crate::state::AppState;

/// `GET /api/rooms` — live rooms and member counts.
pub async fn list_rooms(State(state): State<AppState>) -> Json<ServerStats> {
    Json(services::room::server_stats(&state).await)
}

/// `GET /api/rooms/{room_id}/stats` — drawing statistics for one live room.
pub async fn room_stats(State(state): State<AppState>, Path(room_id): Path<String>) -> Response {
    match services::room::room_stats(&state, &room_id).await {
        Some(stats) => Json(stats).into_response(),
        None => (StatusCode::NOT_FOUND, "room not found").into_response(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMembers {
    pub room_id: String,
    pub member_count: usize,
    pub members: Vec<MemberInfo>,
}

/// `GET /api/rooms/{room_id}/members` — members of one live room in join order.
pub async fn room_members(State(state): State<AppState>, Path(room_id): Path<String>) -> Response {
    let Some(members) = services::room::list_members(&state, &room_id).await else {
        return (StatusCode::NOT_FOUND, "room not found").into_response();
    };
    Json(RoomMembers { room_id, member_count: members.len(), members }).into_response()
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
