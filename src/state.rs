//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is built once in `main` and injected into Axum handlers via
//! the `State` extractor. It owns a map of live rooms. Each room sits behind
//! its own mutex: every mutation of one room (draw, undo, redo, clear, join,
//! leave) runs inside that room's critical section, while different rooms
//! proceed in parallel.
//!
//! A room's critical section covers both its stroke history and its member
//! set, and outbound frames are queued on member channels before the lock
//! is released. Queueing is non-blocking (`try_send`), so a slow member never
//! stalls the room, and every member sees the room's events in the order
//! they were applied.
//!
//! A member whose queue is full misses cursor updates silently. Missing any
//! other frame would leave its canvas out of step with the room, so the room
//! drops that member's sender instead. Its connection then winds down and the
//! client rejoins with a fresh snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::frame::{MemberInfo, ServerFrame, now_ms};
use crate::history::StrokeHistory;

// =============================================================================
// CONNECTED USER
// =============================================================================

/// One live, joined connection.
#[derive(Debug, Clone)]
pub struct ConnectedUser {
    pub connection_id: Uuid,
    pub display_name: String,
    pub display_color: String,
    /// Informational only; nothing evicts idle users.
    pub last_active_at: i64,
}

impl ConnectedUser {
    #[must_use]
    pub fn new(connection_id: Uuid, display_name: impl Into<String>, display_color: impl Into<String>) -> Self {
        Self {
            connection_id,
            display_name: display_name.into(),
            display_color: display_color.into(),
            last_active_at: now_ms(),
        }
    }

    #[must_use]
    pub fn info(&self) -> MemberInfo {
        MemberInfo {
            id: self.connection_id,
            display_name: self.display_name.clone(),
            display_color: self.display_color.clone(),
        }
    }
}

// =============================================================================
// ROOM STATE
// =============================================================================

/// Per-room live state. Never persisted.
pub struct RoomState {
    pub room_id: String,
    /// Milliseconds since Unix epoch.
    pub created_at: i64,
    pub history: StrokeHistory,
    /// Members in join order, unique by connection id.
    members: Vec<ConnectedUser>,
    /// Outbound channel per member connection.
    clients: HashMap<Uuid, mpsc::Sender<ServerFrame>>,
}

impl RoomState {
    #[must_use]
    pub fn new(room_id: impl Into<String>, history_limit: usize) -> Self {
        Self {
            room_id: room_id.into(),
            created_at: now_ms(),
            history: StrokeHistory::with_limit(history_limit),
            members: Vec::new(),
            clients: HashMap::new(),
        }
    }

    /// Add a member. Returns `false` (and changes nothing) if the
    /// connection is already a member.
    pub fn add_member(&mut self, user: ConnectedUser, tx: mpsc::Sender<ServerFrame>) -> bool {
        if self.is_member(user.connection_id) {
            return false;
        }
        self.clients.insert(user.connection_id, tx);
        self.members.push(user);
        true
    }

    /// Remove a member, returning it if present.
    pub fn remove_member(&mut self, connection_id: Uuid) -> Option<ConnectedUser> {
        self.clients.remove(&connection_id);
        let index = self.members.iter().position(|m| m.connection_id == connection_id)?;
        Some(self.members.remove(index))
    }

    #[must_use]
    pub fn is_member(&self, connection_id: Uuid) -> bool {
        self.members.iter().any(|m| m.connection_id == connection_id)
    }

    pub fn member(&self, connection_id: Uuid) -> Option<&ConnectedUser> {
        self.members.iter().find(|m| m.connection_id == connection_id)
    }

    pub fn member_mut(&mut self, connection_id: Uuid) -> Option<&mut ConnectedUser> {
        self.members.iter_mut().find(|m| m.connection_id == connection_id)
    }

    #[must_use]
    pub fn list_members(&self) -> Vec<MemberInfo> {
        self.members.iter().map(ConnectedUser::info).collect()
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Queue a frame for every member, optionally excluding one. Never
    /// blocks.
    pub fn broadcast(&mut self, frame: &ServerFrame, exclude: Option<Uuid>) {
        let recipients: Vec<Uuid> =
            self.members.iter().map(|m| m.connection_id).filter(|id| exclude != Some(*id)).collect();
        for connection_id in recipients {
            self.send_to(connection_id, frame.clone());
        }
    }

    /// Queue a frame for one member. A full queue drops ephemeral frames; for
    /// any other frame the member's sender is released, closing its
    /// outbound stream.
    pub fn send_to(&mut self, connection_id: Uuid, frame: ServerFrame) {
        let Some(tx) = self.clients.get(&connection_id) else {
            return;
        };
        let kind = frame.kind();
        let ephemeral = frame.is_ephemeral();
        match tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) if ephemeral => {}
            Err(e) => {
                self.clients.remove(&connection_id);
                let reason = if matches!(e, TrySendError::Full(_)) { "queue full" } else { "channel closed" };
                tracing::warn!(room_id = %self.room_id, %connection_id, kind, reason, "dropping member sender");
            }
        }
    }
}

/// Shared handle to one room's state.
pub type RoomHandle = Arc<Mutex<RoomState>>;

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self { config: Arc::new(config), rooms: Arc::new(RwLock::new(HashMap::new())) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::history::{Point, StrokeInput, Tool};
    use tokio::time::{Duration, timeout};

    /// Create a test `AppState` with default config.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(ServerConfig::default())
    }

    /// Create a test `AppState` with a small history bound.
    #[must_use]
    pub fn test_app_state_with_limit(history_limit: usize) -> AppState {
        AppState::new(ServerConfig { history_limit, ..ServerConfig::default() })
    }

    /// A member with a fresh id plus the receiving end of its channel.
    #[must_use]
    pub fn test_member(name: &str) -> (ConnectedUser, mpsc::Sender<ServerFrame>, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(64);
        (ConnectedUser::new(Uuid::new_v4(), name, "#8a8178"), tx, rx)
    }

    #[must_use]
    pub fn brush_input() -> StrokeInput {
        StrokeInput {
            tool: Tool::Brush,
            start: Point::new(0.0, 0.0),
            end: Point::new(10.0, 10.0),
            color: "#000".into(),
            width: 3.0,
        }
    }

    /// Member count of a room, zero when it is not live.
    pub async fn member_count(state: &AppState, room_id: &str) -> usize {
        crate::services::room::list_members(state, room_id).await.map_or(0, |members| members.len())
    }

    pub async fn recv_frame(rx: &mut mpsc::Receiver<ServerFrame>) -> ServerFrame {
        timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("frame receive timed out")
            .expect("frame channel closed unexpectedly")
    }

    pub async fn assert_no_frame(rx: &mut mpsc::Receiver<ServerFrame>) {
        assert!(
            timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
            "expected no frame"
        );
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
