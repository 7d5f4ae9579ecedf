//! Room service — membership registry, room lifecycle and statistics.
//!
//! DESIGN
//! ======
//! Rooms are created on first join and evicted, history included, when the
//! last member leaves. Queries never create rooms; only `ensure_room` and
//! `join_room` do.
//!
//! LOCK ORDER
//! ==========
//! Room mutex first, then the room map. The map lock is never held while
//! waiting on a room, so a busy room cannot stall membership changes in
//! other rooms.
//!
//! Eviction removes a room from the map while holding that room's lock. A
//! join therefore re-checks, under the room lock, that the room it locked is
//! still the mapped one and retries on a fresh room if it was evicted.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::frame::{MemberInfo, ServerFrame};
use crate::history::HistoryStats;
use crate::state::{AppState, ConnectedUser, RoomHandle, RoomState};

// =============================================================================
// TYPES
// =============================================================================

/// A room entered by `join_room`, still locked.
pub struct JoinedRoom {
    pub handle: RoomHandle,
    pub room: OwnedMutexGuard<RoomState>,
    /// `false` if the connection was already a member.
    pub added: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub member_count: usize,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub total_rooms: usize,
    pub total_users: usize,
    pub rooms: Vec<RoomSummary>,
}

// =============================================================================
// ROOM IDS
// =============================================================================

/// Resolve a client-supplied room name. Blank or absent selects the
/// configured default room.
#[must_use]
pub fn resolve_room_id(state: &AppState, requested: Option<&str>) -> String {
    match requested.map(str::trim) {
        Some(room) if !room.is_empty() => room.to_string(),
        _ => state.config.default_room.clone(),
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Return the room, creating it empty if absent. Idempotent. Live traffic
/// creates rooms through `join_room`, which runs the same step under its
/// own map lock.
#[cfg(test)]
pub async fn ensure_room(state: &AppState, room_id: &str) -> RoomHandle {
    let mut rooms = state.rooms.write().await;
    ensure_room_locked(state, &mut rooms, room_id)
}

fn ensure_room_locked(
    state: &AppState,
    rooms: &mut HashMap<String, RoomHandle>,
    room_id: &str,
) -> RoomHandle {
    if let Some(handle) = rooms.get(room_id) {
        return handle.clone();
    }
    let handle = Arc::new(Mutex::new(RoomState::new(room_id, state.config.history_limit)));
    rooms.insert(room_id.to_string(), handle.clone());
    info!(%room_id, "room created");
    handle
}

/// Look up a live room without creating it.
pub async fn get_room(state: &AppState, room_id: &str) -> Option<RoomHandle> {
    state.rooms.read().await.get(room_id).cloned()
}

/// Ensure the room exists, lock it, and add the member. The room stays
/// locked so the caller can send the join notifications in the same
/// critical section.
pub async fn join_room(
    state: &AppState,
    room_id: &str,
    user: ConnectedUser,
    tx: mpsc::Sender<ServerFrame>,
) -> JoinedRoom {
    let (handle, mut room) = loop {
        let handle = {
            let mut rooms = state.rooms.write().await;
            ensure_room_locked(state, &mut rooms, room_id)
        };
        let room = handle.clone().lock_owned().await;
        if is_mapped(state, room_id, &handle).await {
            break (handle, room);
        }
        debug!(%room_id, "room evicted before join, retrying");
    };

    let connection_id = user.connection_id;
    let added = room.add_member(user, tx);
    info!(%room_id, %connection_id, members = room.member_count(), "member joined room");
    JoinedRoom { handle, room, added }
}

/// Remove a member. `notify` runs inside the room's critical section after
/// removal, so farewell frames are ordered with every other room event.
/// An emptied room is evicted along with its history.
pub async fn leave_room(
    state: &AppState,
    room_id: &str,
    connection_id: Uuid,
    notify: impl FnOnce(&mut RoomState, &ConnectedUser),
) -> Option<ConnectedUser> {
    let handle = get_room(state, room_id).await?;
    let mut room = handle.lock().await;

    let removed = room.remove_member(connection_id);
    if let Some(user) = &removed {
        info!(%room_id, %connection_id, remaining = room.member_count(), "member left room");
        notify(&mut *room, user);
    }

    if room.member_count() == 0 {
        let mut rooms = state.rooms.write().await;
        if rooms.get(room_id).is_some_and(|mapped| Arc::ptr_eq(mapped, &handle)) {
            rooms.remove(room_id);
            info!(%room_id, "evicted room from memory");
        }
    }
    removed
}

async fn is_mapped(state: &AppState, room_id: &str, handle: &RoomHandle) -> bool {
    state.rooms.read().await.get(room_id).is_some_and(|mapped| Arc::ptr_eq(mapped, handle))
}

/// Drop every room. Called once on shutdown.
pub async fn shutdown(state: &AppState) -> usize {
    let mut rooms = state.rooms.write().await;
    let count = rooms.len();
    rooms.clear();
    info!(rooms = count, "dropped all rooms");
    count
}

// =============================================================================
// QUERIES
// =============================================================================

/// Members of a live room in join order.
pub async fn list_members(state: &AppState, room_id: &str) -> Option<Vec<MemberInfo>> {
    let handle = get_room(state, room_id).await?;
    let members = handle.lock().await.list_members();
    Some(members)
}

/// Drawing statistics for a live room.
pub async fn room_stats(state: &AppState, room_id: &str) -> Option<HistoryStats> {
    let handle = get_room(state, room_id).await?;
    let stats = handle.lock().await.history.stats();
    Some(stats)
}

/// Server-wide room and member counts.
pub async fn server_stats(state: &AppState) -> ServerStats {
    // Snapshot handles, then release the map before touching any room.
    let handles: Vec<RoomHandle> = state.rooms.read().await.values().cloned().collect();

    let mut rooms = Vec::with_capacity(handles.len());
    for handle in handles {
        let room = handle.lock().await;
        rooms.push(RoomSummary {
            room_id: room.room_id.clone(),
            member_count: room.member_count(),
            created_at: room.created_at,
        });
    }
    rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));

    ServerStats { total_rooms: rooms.len(), total_users: rooms.iter().map(|r| r.member_count).sum(), rooms }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
