//! Domain services used by the websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `room` owns the membership registry and room lifecycle; `session` is the
//! per-connection coordinator that turns client frames into history and
//! membership mutations plus broadcasts. Route handlers stay focused on
//! transport concerns.

pub mod room;
pub mod session;
