//! # Session lifecycle
//!
//! `player_connected` creates (or re-binds) a session and greets the player;
//! `player_disconnected` forgets it.

use event_system::{EventError, LiveHandle, PlayerConnectedEvent, PlayerDisconnectedEvent};
use session_registry::{SessionRegistry, SessionValue};
use std::sync::Arc;
use tracing::{debug, info};

use super::{handler_error, session_id};
use crate::presentation::{ActionBar, ChatMessage, ClickAction, Presenter, Title};
use crate::settings::NodeSettings;

/// Registers the joining player and sends the welcome screen.
///
/// A player who is already tracked (reconnect under the same id) keeps their
/// coins and is re-bound to the new connection under the name they joined
/// with.
pub fn on_player_connected(
    registry: &SessionRegistry,
    presenter: &dyn Presenter,
    settings: &NodeSettings,
    event: &PlayerConnectedEvent,
    handle: Option<Arc<dyn LiveHandle>>,
) -> Result<(), EventError> {
    let id = session_id(event.player_id);

    let rebound = registry.update_and_get(&id, |current| {
        current
            .with_live_handle(handle.as_ref())
            .with_display_name(event.name.as_str())
    });

    let session = match rebound {
        Some(session) => {
            info!(
                "Session restored for player: {} ({} coins, connection {})",
                session.display_name(),
                session.counter(),
                event.connection_id
            );
            session
        }
        None => {
            let fresh = SessionValue::create(id, event.name.as_str(), handle.as_ref())
                .map_err(|e| handler_error(event.player_id, e))?;
            registry.add(fresh.clone());
            info!("Session created for player: {}", fresh.display_name());
            Arc::new(fresh)
        }
    };

    presenter.present(
        event.player_id,
        Title::new(&settings.welcome_title, &settings.welcome_subtitle).build(),
    );
    presenter.present(
        event.player_id,
        ActionBar::new("&eYou have %coins% coins")
            .placeholder("%coins%", session.counter().to_string())
            .build(),
    );
    presenter.present(
        event.player_id,
        ChatMessage::new("&aRunning example")
            .hover("This is a hover message!")
            .click(ClickAction::RunCommand("/example".to_string()))
            .build(),
    );

    debug!("Welcome sent to {}", session.display_name());
    Ok(())
}

/// Drops the player's session. Unknown players are ignored.
pub fn on_player_disconnected(
    registry: &SessionRegistry,
    event: &PlayerDisconnectedEvent,
) -> Result<(), EventError> {
    match registry.remove(&session_id(event.player_id)) {
        Some(session) => info!(
            "Session removed for player: {} ({:?}, {} coins)",
            session.display_name(),
            event.reason,
            session.counter()
        ),
        None => debug!("Disconnect for untracked player {}", event.player_id),
    }
    Ok(())
}
