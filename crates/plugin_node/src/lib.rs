//! # Node Plugin
//!
//! Tracks player sessions and rewards block breaking with coins.
//!
//! - `player_connected` → session created in the [`SessionRegistry`] and a
//!   welcome title, action bar and chat line are sent
//! - `client:world:block_broken` → session coins incremented atomically, the
//!   player is told the new total
//! - `player_disconnected` → session removed
//!
//! The registry is constructed by the host and handed to the plugin, so the
//! host can inspect it (stats, pruning) while the plugin mutates it.

use async_trait::async_trait;
use event_system::{
    register_handlers, BlockBrokenEvent, EventSystem, LogLevel, PlayerConnectedEvent,
    PlayerDisconnectedEvent, PluginError, ServerContext, SimplePlugin, WORLD_NAMESPACE,
};
use session_registry::SessionRegistry;
use std::sync::Arc;

pub mod handlers;
pub mod presentation;
pub mod settings;

use presentation::{ContextPresenter, Presenter};
pub use settings::NodeSettings;

/// Session tracking and reward plugin
pub struct NodePlugin {
    name: String,
    registry: Arc<SessionRegistry>,
    settings: Arc<NodeSettings>,
    presenter: Option<Arc<dyn Presenter>>,
}

impl NodePlugin {
    pub fn new(registry: Arc<SessionRegistry>, settings: NodeSettings) -> Self {
        Self {
            name: "node".to_string(),
            registry,
            settings: Arc::new(settings),
            presenter: None,
        }
    }

    /// Uses `presenter` instead of delivering through the server context.
    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

#[async_trait]
impl SimplePlugin for NodePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn register_handlers(
        &mut self,
        events: Arc<EventSystem>,
        context: Arc<dyn ServerContext>,
    ) -> Result<(), PluginError> {
        self.settings
            .validate()
            .map_err(PluginError::InitializationFailed)?;

        let presenter: Arc<dyn Presenter> = match &self.presenter {
            Some(presenter) => Arc::clone(presenter),
            None => Arc::new(ContextPresenter::new(Arc::clone(&context))),
        };

        let join = {
            let registry = Arc::clone(&self.registry);
            let presenter = Arc::clone(&presenter);
            let settings = Arc::clone(&self.settings);
            let context = Arc::clone(&context);
            move |event: PlayerConnectedEvent| {
                let handle = context.player_handle(event.player_id);
                handlers::on_player_connected(&registry, presenter.as_ref(), &settings, &event, handle)
            }
        };

        let quit = {
            let registry = Arc::clone(&self.registry);
            move |event: PlayerDisconnectedEvent| handlers::on_player_disconnected(&registry, &event)
        };

        let block_broken = {
            let registry = Arc::clone(&self.registry);
            let presenter = Arc::clone(&presenter);
            let settings = Arc::clone(&self.settings);
            move |event: BlockBrokenEvent| {
                handlers::on_block_broken(&registry, presenter.as_ref(), &settings, &event)
            }
        };

        register_handlers!(events;
            core {
                "player_connected" => join,
                "player_disconnected" => quit,
            }
            client {
                WORLD_NAMESPACE, "block_broken" => block_broken,
            }
        );

        context.log(
            LogLevel::Info,
            &format!(
                "NodePlugin: handlers registered ({} coin(s) per block)",
                self.settings.coins_per_block
            ),
        );
        Ok(())
    }

    async fn on_init(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        context.log(
            LogLevel::Info,
            &format!("NodePlugin: session tracking active on {}", context.server_name()),
        );
        Ok(())
    }

    async fn on_shutdown(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        context.log(
            LogLevel::Info,
            &format!(
                "NodePlugin: shutting down with {} tracked sessions",
                self.registry.len()
            ),
        );
        self.registry.clear();
        Ok(())
    }
}
