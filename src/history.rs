//! Stroke history — the per-room append/undo/redo log.
//!
//! DESIGN
//! ======
//! A room's drawing is one ordered log plus a cursor. Strokes at or before
//! the cursor that are not marked undone form the active canvas; strokes
//! after the cursor are reachable only through redo. Appending after an
//! undo truncates everything past the cursor, like any undo stack.
//!
//! Undo and redo are global: any member may undo or redo any stroke,
//! whoever drew it. Both walk the log linearly from the cursor. Interactive
//! undo chains stay near the cursor, so the walk is short in practice and
//! the cursor remains the only index into the log.
//!
//! The log is bounded. Past the retention limit the oldest stroke is
//! evicted and the cursor slides down with it.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::frame::now_ms;

/// Default number of strokes retained per room.
pub const DEFAULT_HISTORY_LIMIT: usize = 5000;

/// Longest accepted color string.
pub const MAX_COLOR_LEN: usize = 64;

const DEFAULT_COLOR: &str = "#000000";

// =============================================================================
// STROKE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Brush,
    Eraser,
}

/// Canvas coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[cfg(test)]
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A stroke as submitted by a client, before the server stamps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeInput {
    pub tool: Tool,
    pub start: Point,
    pub end: Point,
    #[serde(default = "default_color")]
    pub color: String,
    pub width: f64,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrokeError {
    #[error("stroke width must be positive and finite, got {0}")]
    InvalidWidth(f64),
    #[error("stroke coordinates must be finite")]
    NonFinitePoint,
    #[error("stroke color longer than {MAX_COLOR_LEN} characters")]
    ColorTooLong,
}

impl StrokeInput {
    /// Reject payloads no client could render.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint: non-positive or non-finite
    /// width, a non-finite coordinate, or an oversized color string.
    pub fn validate(&self) -> Result<(), StrokeError> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(StrokeError::InvalidWidth(self.width));
        }
        if !(self.start.is_finite() && self.end.is_finite()) {
            return Err(StrokeError::NonFinitePoint);
        }
        if self.color.chars().count() > MAX_COLOR_LEN {
            return Err(StrokeError::ColorTooLong);
        }
        Ok(())
    }

    /// Stamp author and creation time.
    #[must_use]
    pub fn into_stroke(self, author_id: Uuid, created_at: i64) -> Stroke {
        Stroke {
            tool: self.tool,
            start: self.start,
            end: self.end,
            color: self.color,
            width: self.width,
            author_id,
            created_at,
            undone: false,
            undone_by: None,
            undone_at: None,
        }
    }
}

/// One drawing operation. Only the `undone*` fields change after append.
///
/// `undone_by` and `undone_at` describe the undo currently in effect and are
/// `None` whenever `undone` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub tool: Tool,
    pub start: Point,
    pub end: Point,
    pub color: String,
    pub width: f64,
    pub author_id: Uuid,
    /// Milliseconds since Unix epoch, non-decreasing within a room.
    pub created_at: i64,
    pub undone: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undone_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undone_at: Option<i64>,
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Active canvas: everything a client needs to repaint from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasState {
    pub strokes: Vec<Stroke>,
    /// History step: `strokes.len() - 1`, so `-1` for a blank canvas.
    pub cursor_index: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_strokes: usize,
    pub undone_strokes: usize,
    pub active_strokes: usize,
    pub unique_authors: usize,
    pub cursor_index: i64,
}

// =============================================================================
// STROKE HISTORY
// =============================================================================

#[derive(Debug, Clone)]
pub struct StrokeHistory {
    strokes: VecDeque<Stroke>,
    /// Last "current" index. `None` is the empty / all-undone position.
    cursor: Option<usize>,
    limit: usize,
    last_created_at: i64,
}

impl StrokeHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// History retaining at most `limit` strokes (at least one).
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self { strokes: VecDeque::new(), cursor: None, limit: limit.max(1), last_created_at: 0 }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    #[cfg(test)]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[cfg(test)]
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Cursor in wire form, where `-1` means no current stroke.
    #[must_use]
    pub fn cursor_index(&self) -> i64 {
        self.cursor.map_or(-1, |c| i64::try_from(c).unwrap_or(i64::MAX))
    }

    /// Full log including undone and redo-able strokes.
    #[cfg(test)]
    pub fn strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.strokes.iter()
    }

    /// Number of strokes at or before the cursor.
    fn head_len(&self) -> usize {
        self.cursor.map_or(0, |c| c + 1)
    }

    /// Append a stroke, discarding any redo tail first. Returns the stroke
    /// as stored, with `created_at` clamped to keep the room's clock monotonic.
    pub fn append(&mut self, mut stroke: Stroke) -> Stroke {
        self.strokes.truncate(self.head_len());

        stroke.created_at = stroke.created_at.max(self.last_created_at);
        stroke.undone = false;
        stroke.undone_by = None;
        stroke.undone_at = None;
        self.last_created_at = stroke.created_at;

        self.strokes.push_back(stroke.clone());
        let mut cursor = self.strokes.len() - 1;
        while self.strokes.len() > self.limit {
            self.strokes.pop_front();
            cursor -= 1;
        }
        self.cursor = Some(cursor);
        stroke
    }

    /// Undo the most recent active stroke, whoever drew it.
    pub fn undo(&mut self, requester: Uuid) -> Option<&Stroke> {
        self.undo_at(requester, now_ms())
    }

    /// Undo with an explicit timestamp (for testing).
    pub fn undo_at(&mut self, requester: Uuid, now: i64) -> Option<&Stroke> {
        let cursor = self.cursor?;
        let index = (0..=cursor).rev().find(|&i| !self.strokes[i].undone)?;

        self.cursor = index.checked_sub(1);
        let stroke = &mut self.strokes[index];
        stroke.undone = true;
        stroke.undone_by = Some(requester);
        stroke.undone_at = Some(now);
        Some(&*stroke)
    }

    /// Redo the nearest undone stroke past the cursor, whoever undid it.
    pub fn redo(&mut self) -> Option<&Stroke> {
        let from = self.head_len();
        let index = (from..self.strokes.len()).find(|&i| self.strokes[i].undone)?;

        self.cursor = Some(index);
        let stroke = &mut self.strokes[index];
        stroke.undone = false;
        stroke.undone_by = None;
        stroke.undone_at = None;
        Some(&*stroke)
    }

    /// Drop the whole log. Not undoable.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.cursor = None;
    }

    /// Strokes a client should render, in paint order.
    #[must_use]
    pub fn active_strokes(&self) -> Vec<Stroke> {
        self.strokes.iter().take(self.head_len()).filter(|s| !s.undone).cloned().collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> CanvasState {
        if self.is_empty() {
            return CanvasState { strokes: Vec::new(), cursor_index: -1 };
        }
        let strokes = self.active_strokes();
        let cursor_index = i64::try_from(strokes.len()).unwrap_or(i64::MAX) - 1;
        CanvasState { strokes, cursor_index }
    }

    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        let undone_strokes = self.strokes.iter().filter(|s| s.undone).count();
        let unique_authors = self.strokes.iter().map(|s| s.author_id).collect::<HashSet<_>>().len();
        HistoryStats {
            total_strokes: self.strokes.len(),
            undone_strokes,
            active_strokes: self.strokes.len() - undone_strokes,
            unique_authors,
            cursor_index: self.cursor_index(),
        }
    }
}

impl Default for StrokeHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
