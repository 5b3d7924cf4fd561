//! # Block-break rewards
//!
//! Every broken block grants `coins_per_block` coins to the breaking player's
//! session. The increment goes through [`SessionRegistry::try_update`], so
//! concurrent breaks by the same player never lose coins.

use event_system::{BlockBrokenEvent, EventError};
use session_registry::SessionRegistry;
use tracing::debug;

use super::{handler_error, session_id};
use crate::presentation::{ChatMessage, Presenter};
use crate::settings::NodeSettings;

/// Credits the player and reports the action and the new total.
///
/// A break from a player who is no longer tracked (quit before the handler
/// ran) is ignored.
pub fn on_block_broken(
    registry: &SessionRegistry,
    presenter: &dyn Presenter,
    settings: &NodeSettings,
    event: &BlockBrokenEvent,
) -> Result<(), EventError> {
    let reward = i64::from(settings.coins_per_block);
    let id = session_id(event.player_id);

    let Some(session) = registry
        .try_update(&id, |current| current.with_increment(reward))
        .map_err(|e| handler_error(event.player_id, e))?
    else {
        debug!("Ignoring {} break from untracked player {}", event.block, event.player_id);
        return Ok(());
    };

    // Total comes from the committed value, not the pre-update snapshot.
    presenter.present(
        event.player_id,
        ChatMessage::new(format!(
            "{} Break Block by %player% and add %reward% coin",
            settings.message_prefix
        ))
        .placeholder("%player%", session.display_name())
        .placeholder("%reward%", reward.to_string())
        .build(),
    );
    presenter.present(
        event.player_id,
        ChatMessage::new(format!("{} You have now %coins% coins.", settings.message_prefix))
            .placeholder("%coins%", session.counter().to_string())
            .build(),
    );

    debug!(
        "{} broke {} at ({}, {}, {}): {} coins",
        session.display_name(),
        event.block,
        event.position.x,
        event.position.y,
        event.position.z,
        session.counter()
    );
    Ok(())
}
