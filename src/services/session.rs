//! Session coordinator — one per websocket connection.
//!
//! DESIGN
//! ======
//! A session moves `Unjoined → Joined → Closed`. Only `join` is accepted
//! while unjoined; every other frame is dropped until the join handshake
//! completes, and everything is dropped once closed.
//!
//! Each frame is handled inside its room's critical section: the history or
//! membership mutation happens first, then the resulting frames are queued
//! for their recipients before the lock is released. Queueing never blocks,
//! so broadcast order always matches the order mutations were applied.
//!
//! Recipients per event:
//! - draw: every member except the sender (it already drew locally)
//! - undo / redo: every member, sender included, but only if something changed
//! - clear: every member
//! - cursor: every member except the sender; never stored

use tokio::sync::{MutexGuard, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::frame::{ClientFrame, ServerFrame, now_ms};
use crate::history::{Stroke, StrokeInput};
use crate::services::room::{self, JoinedRoom};
use crate::state::{AppState, ConnectedUser, RoomHandle, RoomState};

/// Longest accepted display name or color.
pub const MAX_DISPLAY_LEN: usize = 64;

const ANONYMOUS: &str = "Anonymous";
const DEFAULT_DISPLAY_COLOR: &str = "#000000";

// =============================================================================
// SESSION
// =============================================================================

enum Phase {
    Unjoined,
    Joined { room_id: String, handle: RoomHandle },
    Closed,
}

pub struct Session {
    connection_id: Uuid,
    /// Handed to the room on join, so the room holds the only sender.
    tx: Option<mpsc::Sender<ServerFrame>>,
    phase: Phase,
}

impl Session {
    /// A fresh, unjoined session. `tx` feeds the connection's outbound queue.
    #[must_use]
    pub fn new(connection_id: Uuid, tx: mpsc::Sender<ServerFrame>) -> Self {
        Self { connection_id, tx: Some(tx), phase: Phase::Unjoined }
    }

    #[must_use]
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Room this session joined, if any.
    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        match &self.phase {
            Phase::Joined { room_id, .. } => Some(room_id),
            _ => None,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.phase, Phase::Closed)
    }

    /// Apply one inbound frame.
    pub async fn handle(&mut self, state: &AppState, frame: ClientFrame) {
        let id = self.connection_id;
        match frame {
            ClientFrame::Join { display_name, display_color, room } => {
                self.join(state, &display_name, &display_color, room.as_deref()).await;
            }
            ClientFrame::Draw(input) => {
                let Some(mut room) = self.lock_room("draw").await else {
                    return;
                };
                apply_draw(&mut room, id, input);
            }
            ClientFrame::Undo => {
                let Some(mut room) = self.lock_room("undo").await else {
                    return;
                };
                apply_undo(&mut room, id);
            }
            ClientFrame::Redo => {
                let Some(mut room) = self.lock_room("redo").await else {
                    return;
                };
                apply_redo(&mut room, id);
            }
            ClientFrame::ClearCanvas => {
                let Some(mut room) = self.lock_room("clearCanvas").await else {
                    return;
                };
                apply_clear(&mut room, id);
            }
            ClientFrame::CursorMove { x, y } => {
                let Some(mut room) = self.lock_room("cursorMove").await else {
                    return;
                };
                relay_cursor(&mut room, id, x, y);
            }
        }
    }

    /// Transport closed. Leaves the room and notifies the remaining members.
    /// Idempotent; the session ignores everything afterwards.
    pub async fn close(&mut self, state: &AppState) {
        let phase = std::mem::replace(&mut self.phase, Phase::Closed);
        let Phase::Joined { room_id, .. } = phase else {
            return;
        };

        let id = self.connection_id;
        room::leave_room(state, &room_id, id, |room, _user| {
            room.broadcast(&ServerFrame::MemberLeft { id }, None);
            let members = room.list_members();
            room.broadcast(&ServerFrame::MemberList { members }, None);
        })
        .await;
    }

    async fn join(&mut self, state: &AppState, display_name: &str, display_color: &str, requested_room: Option<&str>) {
        let (Phase::Unjoined, Some(tx)) = (&self.phase, self.tx.take()) else {
            debug!(connection_id = %self.connection_id, "session: ignoring repeated join");
            return;
        };

        let room_id = room::resolve_room_id(state, requested_room);
        let user = ConnectedUser::new(
            self.connection_id,
            clean_display(display_name, ANONYMOUS),
            clean_display(display_color, DEFAULT_DISPLAY_COLOR),
        );
        let info = user.info();

        let JoinedRoom { handle, mut room, added } = room::join_room(state, &room_id, user, tx).await;
        if added {
            let snapshot = ServerFrame::snapshot(room.history.snapshot());
            room.send_to(self.connection_id, snapshot);
            let members = room.list_members();
            room.broadcast(&ServerFrame::MemberList { members }, None);
            room.broadcast(&ServerFrame::MemberJoined(info), Some(self.connection_id));
        }
        drop(room);

        self.phase = Phase::Joined { room_id, handle };
    }

    /// Lock the joined room and record activity. `None` (frame dropped)
    /// before join or after close.
    async fn lock_room(&self, kind: &'static str) -> Option<MutexGuard<'_, RoomState>> {
        let Phase::Joined { handle, .. } = &self.phase else {
            debug!(connection_id = %self.connection_id, kind, "session: dropping frame outside joined state");
            return None;
        };
        let mut room = handle.lock().await;
        if let Some(member) = room.member_mut(self.connection_id) {
            member.last_active_at = now_ms();
        }
        Some(room)
    }
}

// =============================================================================
// EVENT HANDLERS
// =============================================================================

/// Stamp and append a stroke, then relay it to everyone but the author.
/// Invalid strokes are dropped.
pub fn apply_draw(room: &mut RoomState, author: Uuid, input: StrokeInput) -> Option<Stroke> {
    if let Err(e) = input.validate() {
        debug!(room_id = %room.room_id, %author, error = %e, "session: dropping invalid stroke");
        return None;
    }

    let stroke = room.history.append(input.into_stroke(author, now_ms()));
    debug!(room_id = %room.room_id, %author, history = room.history.len(), "stroke added");

    room.broadcast(&ServerFrame::StrokeApplied { stroke: stroke.clone() }, Some(author));
    Some(stroke)
}

/// Global undo. Broadcasts the fresh canvas to the whole room on success.
pub fn apply_undo(room: &mut RoomState, requester: Uuid) -> bool {
    let Some(author) = room.history.undo(requester).map(|s| s.author_id) else {
        debug!(room_id = %room.room_id, %requester, "nothing to undo");
        return false;
    };
    info!(room_id = %room.room_id, %requester, stroke_author = %author, "undo applied");

    let frame = ServerFrame::UndoApplied { requester_id: requester, state: room.history.snapshot() };
    room.broadcast(&frame, None);
    true
}

/// Global redo. Broadcasts the fresh canvas to the whole room on success.
pub fn apply_redo(room: &mut RoomState, requester: Uuid) -> bool {
    let Some(author) = room.history.redo().map(|s| s.author_id) else {
        debug!(room_id = %room.room_id, %requester, "nothing to redo");
        return false;
    };
    info!(room_id = %room.room_id, %requester, stroke_author = %author, "redo applied");

    let frame = ServerFrame::RedoApplied { requester_id: requester, state: room.history.snapshot() };
    room.broadcast(&frame, None);
    true
}

/// Wipe the room's history and tell every member, unconditionally.
pub fn apply_clear(room: &mut RoomState, requester: Uuid) {
    room.history.clear();
    info!(room_id = %room.room_id, %requester, "canvas cleared");
    room.broadcast(&ServerFrame::CanvasCleared { requester_id: requester }, None);
}

/// Relay a cursor position to the other members. Nothing is stored.
pub fn relay_cursor(room: &mut RoomState, sender: Uuid, x: f64, y: f64) {
    if !(x.is_finite() && y.is_finite()) {
        return;
    }
    let Some(member) = room.member(sender) else {
        return;
    };
    let frame = ServerFrame::CursorUpdate {
        id: sender,
        display_name: member.display_name.clone(),
        display_color: member.display_color.clone(),
        x,
        y,
    };
    room.broadcast(&frame, Some(sender));
}

// =============================================================================
// HELPERS
// =============================================================================

/// Trim and bound a client-chosen display string, falling back when blank.
fn clean_display(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    trimmed.chars().take(MAX_DISPLAY_LEN).collect()
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
