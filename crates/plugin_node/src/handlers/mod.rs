//! Event handlers for the node plugin.
//!
//! Each handler maps one host event onto the session registry and hands any
//! resulting notifications to a [`Presenter`](crate::presentation::Presenter).
//! They are plain functions so they can run outside the event system.

pub mod reward;
pub mod session;

use event_system::{EventError, PlayerId};
use session_registry::{SessionError, SessionId};

pub use reward::on_block_broken;
pub use session::{on_player_connected, on_player_disconnected};

/// Sessions are keyed by the player's UUID.
pub fn session_id(player_id: PlayerId) -> SessionId {
    SessionId(player_id.0)
}

pub(crate) fn handler_error(player_id: PlayerId, error: SessionError) -> EventError {
    EventError::HandlerExecution(format!("session {}: {}", player_id, error))
}
