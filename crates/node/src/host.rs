//! # Node host
//!
//! [`NodeHost`] is the [`ServerContext`] handed to plugins. It owns the live
//! player connections (plugins only ever see weak references through
//! [`LiveHandle`]) and "delivers" notifications by logging them.

use async_trait::async_trait;
use dashmap::DashMap;
use event_system::{
    EventSystem, LiveHandle, LogLevel, PlayerId, ServerContext, ServerError, SimplePlugin,
};
use plugin_node::presentation::Notification;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Connection object for one simulated player.
#[derive(Debug)]
pub struct SimulatedConnection {
    pub player_id: PlayerId,
    pub name: String,
    online: AtomicBool,
}

impl SimulatedConnection {
    pub fn new(player_id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            player_id,
            name: name.into(),
            online: AtomicBool::new(true),
        }
    }

    pub fn close(&self) {
        self.online.store(false, Ordering::SeqCst);
    }
}

impl LiveHandle for SimulatedConnection {
    fn is_connected(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

pub struct NodeHost {
    name: String,
    events: Arc<EventSystem>,
    connections: DashMap<PlayerId, Arc<SimulatedConnection>>,
    delivered: AtomicU64,
}

impl NodeHost {
    pub fn new(name: impl Into<String>, events: Arc<EventSystem>) -> Self {
        Self {
            name: name.into(),
            events,
            connections: DashMap::new(),
            delivered: AtomicU64::new(0),
        }
    }

    /// Opens (or replaces) the connection for `player_id`.
    pub fn connect(&self, player_id: PlayerId, name: &str) -> Arc<SimulatedConnection> {
        let connection = Arc::new(SimulatedConnection::new(player_id, name));
        if let Some(previous) = self.connections.insert(player_id, Arc::clone(&connection)) {
            previous.close();
        }
        connection
    }

    /// Closes and forgets the connection for `player_id`.
    pub fn disconnect(&self, player_id: PlayerId) -> Option<Arc<SimulatedConnection>> {
        let (_, connection) = self.connections.remove(&player_id)?;
        connection.close();
        Some(connection)
    }

    pub fn is_online(&self, player_id: PlayerId) -> bool {
        self.connections.contains_key(&player_id)
    }

    pub fn online_players(&self) -> Vec<PlayerId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn notifications_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Runs handler registration then initialization for every plugin.
    pub async fn load_plugins(
        self: &Arc<Self>,
        plugins: &mut [Box<dyn SimplePlugin>],
    ) -> Result<(), event_system::PluginError> {
        let context: Arc<dyn ServerContext> = self.clone();

        for plugin in plugins.iter_mut() {
            info!("🔌 Registering handlers for {} v{}", plugin.name(), plugin.version());
            plugin
                .register_handlers(Arc::clone(&self.events), Arc::clone(&context))
                .await?;
        }
        for plugin in plugins.iter_mut() {
            plugin.on_init(Arc::clone(&context)).await?;
        }
        Ok(())
    }

    /// Shuts plugins down in reverse load order. Failures are logged.
    pub async fn shutdown_plugins(self: &Arc<Self>, plugins: &mut [Box<dyn SimplePlugin>]) {
        let context: Arc<dyn ServerContext> = self.clone();

        for plugin in plugins.iter_mut().rev() {
            if let Err(e) = plugin.on_shutdown(Arc::clone(&context)).await {
                error!("❌ Plugin {} failed to shut down: {}", plugin.name(), e);
            }
        }
    }
}

#[async_trait]
impl ServerContext for NodeHost {
    fn events(&self) -> Arc<EventSystem> {
        Arc::clone(&self.events)
    }

    fn server_name(&self) -> &str {
        &self.name
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => error!("{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Info => info!("{}", message),
            LogLevel::Debug => debug!("{}", message),
            LogLevel::Trace => trace!("{}", message),
        }
    }

    fn player_handle(&self, player_id: PlayerId) -> Option<Arc<dyn LiveHandle>> {
        self.connections
            .get(&player_id)
            .map(|entry| Arc::clone(entry.value()) as Arc<dyn LiveHandle>)
    }

    async fn send_to_player(&self, player_id: PlayerId, data: &[u8]) -> Result<(), ServerError> {
        let connection = self
            .connections
            .get(&player_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ServerError::PlayerNotConnected(player_id))?;

        let notification =
            Notification::from_bytes(data).map_err(|e| ServerError::Internal(e.to_string()))?;

        match notification {
            Notification::Chat { text, .. } => debug!("💬 [{}] {}", connection.name, text),
            Notification::Title { title, subtitle, .. } => {
                debug!("🪧 [{}] {} / {}", connection.name, title, subtitle)
            }
            Notification::ActionBar { text } => trace!("📟 [{}] {}", connection.name, text),
        }

        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_system::create_event_system;
    use plugin_node::presentation::ChatMessage;

    #[test]
    fn test_handles_are_weakly_observable() {
        let host = NodeHost::new("test", create_event_system());
        let player = PlayerId::new();

        host.connect(player, "p1");
        let handle = host.player_handle(player).unwrap();
        assert!(handle.is_connected());

        let weak = Arc::downgrade(&handle);
        drop(handle);
        assert!(weak.upgrade().is_some());

        host.disconnect(player);
        assert!(weak.upgrade().is_none());
        assert!(host.player_handle(player).is_none());
    }

    #[test]
    fn test_reconnect_closes_previous_connection() {
        let host = NodeHost::new("test", create_event_system());
        let player = PlayerId::new();

        let first = host.connect(player, "p1");
        let second = host.connect(player, "p1");

        assert!(!first.is_connected());
        assert!(second.is_connected());
        assert_eq!(host.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_send_to_player() {
        let host = NodeHost::new("test", create_event_system());
        let player = PlayerId::new();
        let data = ChatMessage::new("hello").build().to_bytes().unwrap();

        assert!(matches!(
            host.send_to_player(player, &data).await,
            Err(ServerError::PlayerNotConnected(_))
        ));

        host.connect(player, "p1");
        host.send_to_player(player, &data).await.unwrap();
        assert!(host.send_to_player(player, b"not json").await.is_err());
        assert_eq!(host.notifications_delivered(), 1);
    }
}
