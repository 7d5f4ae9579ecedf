//! Frames — the typed wire vocabulary between clients and the server.
//!
//! ARCHITECTURE
//! ============
//! Every websocket text message is one JSON frame. Client frames are
//! decoded into the closed `ClientFrame` set and dispatched by a single
//! `match` in the session coordinator; server frames are the closed
//! `ServerFrame` set. Unknown `type` values fail to decode and are dropped
//! by the transport.
//!
//! DESIGN
//! ======
//! - Flat objects with a camelCase `type` discriminator, e.g.
//!   `{"type":"cursorMove","x":10,"y":20}`.
//! - Field names are camelCase on the wire.
//! - Frames carry no request ids: the server never replies to a specific
//!   request, it only broadcasts resulting state.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::history::{CanvasState, Stroke, StrokeInput};

// =============================================================================
// CLIENT FRAMES
// =============================================================================

/// Inbound events. Everything except `Join` requires a joined session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    Join {
        display_name: String,
        display_color: String,
        /// Room to join. Absent or blank selects the default room.
        #[serde(default)]
        room: Option<String>,
    },
    Draw(StrokeInput),
    Undo,
    Redo,
    ClearCanvas,
    CursorMove { x: f64, y: f64 },
}

impl ClientFrame {
    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Draw(_) => "draw",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::ClearCanvas => "clearCanvas",
            Self::CursorMove { .. } => "cursorMove",
        }
    }
}

// =============================================================================
// SERVER FRAMES
// =============================================================================

/// Public view of a room member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub id: Uuid,
    pub display_name: String,
    pub display_color: String,
}

/// Outbound events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// First frame on every connection; tells the client its own id.
    Connected { id: Uuid },
    StateSnapshot { strokes: Vec<Stroke>, cursor_index: i64 },
    MemberList { members: Vec<MemberInfo> },
    MemberJoined(MemberInfo),
    MemberLeft { id: Uuid },
    StrokeApplied { stroke: Stroke },
    UndoApplied { requester_id: Uuid, state: CanvasState },
    RedoApplied { requester_id: Uuid, state: CanvasState },
    CanvasCleared { requester_id: Uuid },
    CursorUpdate { id: Uuid, display_name: String, display_color: String, x: f64, y: f64 },
}

impl ServerFrame {
    /// Snapshot frame for a freshly joined client.
    #[must_use]
    pub fn snapshot(state: CanvasState) -> Self {
        Self::StateSnapshot { strokes: state.strokes, cursor_index: state.cursor_index }
    }

    /// Ephemeral frames may be dropped and are kept out of the logs.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::CursorUpdate { .. })
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::StateSnapshot { .. } => "stateSnapshot",
            Self::MemberList { .. } => "memberList",
            Self::MemberJoined(_) => "memberJoined",
            Self::MemberLeft { .. } => "memberLeft",
            Self::StrokeApplied { .. } => "strokeApplied",
            Self::UndoApplied { .. } => "undoApplied",
            Self::RedoApplied { .. } => "redoApplied",
            Self::CanvasCleared { .. } => "canvasCleared",
            Self::CursorUpdate { .. } => "cursorUpdate",
        }
    }
}

// =============================================================================
// CLOCK
// =============================================================================

/// Current time as milliseconds since Unix epoch.
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
