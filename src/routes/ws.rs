//! WebSocket handler — bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection ID and enters a `select!` loop:
//! - Incoming client frames → parse → hand to the connection's `Session`
//! - Frames queued by room peers → forward to the client
//!
//! The session owns every room concern. This layer only moves JSON text
//! between the socket and the session, so the session never touches the
//! transport.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `connected` with the connection id
//! 2. Client sends `join` → session enters its room
//! 3. Client frames → session → room broadcasts
//! 4. Close → session leaves the room, remaining members are told

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{ClientFrame, ServerFrame};
use crate::services::session::Session;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();

    // Per-connection queue fed by the room this connection joins.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerFrame>(state.config.client_channel_capacity);

    if send_frame(&mut socket, &ServerFrame::Connected { id: connection_id }).await.is_err() {
        return;
    }

    info!(%connection_id, "ws: client connected");

    let mut session = Session::new(connection_id, client_tx);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        process_inbound_text(&state, &mut session, text.as_str()).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            frame = client_rx.recv() => {
                // The room released our sender: this client fell behind.
                let Some(frame) = frame else {
                    warn!(%connection_id, "ws: outbound stream closed by room, disconnecting");
                    break;
                };
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(%connection_id, room_id = session.room_id().unwrap_or("-"), "ws: client disconnected");
    session.close(&state).await;
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse one inbound text frame and apply it to the session. Malformed or
/// unknown frames are logged and dropped; the connection stays open.
async fn process_inbound_text(state: &AppState, session: &mut Session, text: &str) {
    let Some(frame) = decode_client_frame(session.connection_id(), text) else {
        return;
    };
    if !matches!(frame, ClientFrame::CursorMove { .. }) {
        debug!(connection_id = %session.connection_id(), kind = frame.kind(), "ws: recv frame");
    }
    session.handle(state, frame).await;
}

fn decode_client_frame(connection_id: Uuid, text: &str) -> Option<ClientFrame> {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(%connection_id, error = %e, "ws: dropping malformed frame");
            None
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if !frame.is_ephemeral() {
        debug!(kind = frame.kind(), "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
