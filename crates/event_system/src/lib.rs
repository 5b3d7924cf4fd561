//! Core event system for the node host
//!
//! The host raises two families of events:
//!
//! - `core:<name>` for player lifecycle (`player_connected`,
//!   `player_disconnected`)
//! - `client:<namespace>:<name>` for actions a player performs in the world,
//!   e.g. `client:world:block_broken`
//!
//! Events travel as JSON. Each subscriber names the payload type it expects
//! and receives a freshly decoded copy, so handlers never share state through
//! the event itself.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use session_registry::LiveHandle;

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block coordinates in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Position {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Anything that can be sent through the [`EventSystem`].
pub trait Event: Serialize + DeserializeOwned + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Serialize + DeserializeOwned + Send + Sync + std::fmt::Debug + 'static {}

/// Type-erased subscriber: decodes the payload into its own event type.
trait Subscriber: Send + Sync {
    fn deliver(&self, data: &[u8]) -> Result<(), EventError>;
    fn payload_type(&self) -> TypeId;
    fn label(&self) -> &str;
}

struct Typed<T, F> {
    label: String,
    handler: F,
    _payload: std::marker::PhantomData<fn(T)>,
}

impl<T, F> Subscriber for Typed<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync,
{
    fn deliver(&self, data: &[u8]) -> Result<(), EventError> {
        let event: T = serde_json::from_slice(data).map_err(|source| EventError::Decode {
            expected: type_name::<T>(),
            source,
        })?;
        (self.handler)(event)
    }

    fn payload_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn label(&self) -> &str {
        &self.label
    }
}

fn core_key(event_name: &str) -> String {
    format!("core:{event_name}")
}

fn client_key(namespace: &str, event_name: &str) -> String {
    format!("client:{namespace}:{event_name}")
}

#[derive(Default)]
struct Counters {
    handlers: AtomicUsize,
    emitted: AtomicU64,
    failures: AtomicU64,
}

/// Registry of subscribers keyed by event key.
#[derive(Default)]
pub struct EventSystem {
    subscribers: RwLock<HashMap<String, Vec<Arc<dyn Subscriber>>>>,
    counters: Counters,
}

impl EventSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `core:<event_name>`.
    pub async fn on_core<T, F>(&self, event_name: &str, handler: F) -> Result<(), EventError>
    where
        T: Event,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.subscribe(core_key(event_name), handler).await
    }

    /// Subscribe to `client:<namespace>:<event_name>`.
    pub async fn on_client<T, F>(
        &self,
        namespace: &str,
        event_name: &str,
        handler: F,
    ) -> Result<(), EventError>
    where
        T: Event,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.subscribe(client_key(namespace, event_name), handler).await
    }

    async fn subscribe<T, F>(&self, key: String, handler: F) -> Result<(), EventError>
    where
        T: Event,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        if key.ends_with(':') {
            return Err(EventError::InvalidKey(key));
        }

        let subscriber = Arc::new(Typed::<T, F> {
            label: format!("{}::{}", key, type_name::<T>()),
            handler,
            _payload: std::marker::PhantomData,
        });

        let mut subscribers = self.subscribers.write().await;
        let slot = subscribers.entry(key.clone()).or_default();
        if slot
            .iter()
            .any(|existing| existing.payload_type() != TypeId::of::<T>())
        {
            warn!("Subscribers of {} disagree on the payload type", key);
        }
        slot.push(subscriber);
        drop(subscribers);

        self.counters.handlers.fetch_add(1, Ordering::Relaxed);
        info!("📝 Registered handler for {}", key);
        Ok(())
    }

    /// Emit `core:<event_name>`.
    pub async fn emit_core<T: Event>(&self, event_name: &str, event: &T) -> Result<(), EventError> {
        self.dispatch(&core_key(event_name), event).await
    }

    /// Emit `client:<namespace>:<event_name>`.
    pub async fn emit_client<T: Event>(
        &self,
        namespace: &str,
        event_name: &str,
        event: &T,
    ) -> Result<(), EventError> {
        self.dispatch(&client_key(namespace, event_name), event).await
    }

    /// Runs every subscriber of `key` in registration order.
    ///
    /// Only encoding the event can fail the emit; a failing subscriber is
    /// logged and counted and the rest still run.
    async fn dispatch<T: Event>(&self, key: &str, event: &T) -> Result<(), EventError> {
        let data = serde_json::to_vec(event).map_err(EventError::Encode)?;

        // Snapshot so subscribers run without the map lock.
        let targets = match self.subscribers.read().await.get(key) {
            Some(targets) => targets.clone(),
            None => {
                warn!("⚠️ No handlers for event: {}", key);
                return Ok(());
            }
        };

        debug!("📤 Emitting {} to {} handlers", key, targets.len());
        for subscriber in &targets {
            if let Err(e) = subscriber.deliver(&data) {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                error!("❌ Handler {} failed: {}", subscriber.label(), e);
            }
        }

        self.counters.emitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> EventSystemStats {
        EventSystemStats {
            total_handlers: self.counters.handlers.load(Ordering::Relaxed),
            events_emitted: self.counters.emitted.load(Ordering::Relaxed),
            handler_failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Player connected to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConnectedEvent {
    pub player_id: PlayerId,
    pub name: String,
    pub connection_id: String,
    pub timestamp: u64,
}

/// Player disconnected from the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDisconnectedEvent {
    pub player_id: PlayerId,
    pub connection_id: String,
    pub reason: DisconnectReason,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    ClientDisconnect,
    ServerShutdown,
}

/// Namespace for world interaction events
pub const WORLD_NAMESPACE: &str = "world";

/// A player broke a block (`client:world:block_broken`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockBrokenEvent {
    pub player_id: PlayerId,
    pub block: String,
    pub position: Position,
    pub timestamp: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventSystemStats {
    pub total_handlers: usize,
    pub events_emitted: u64,
    pub handler_failures: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Failed to encode event: {0}")]
    Encode(serde_json::Error),
    #[error("Payload is not a {expected}: {source}")]
    Decode {
        expected: &'static str,
        source: serde_json::Error,
    },
    #[error("Invalid event key: {0}")]
    InvalidKey(String),
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
}

// ============================================================================
// Plugin Interface
// ============================================================================

/// Lifecycle contract every in-process plugin implements.
///
/// The host calls `register_handlers`, then `on_init` once every plugin has
/// registered, and `on_shutdown` in reverse load order on exit.
#[async_trait]
pub trait SimplePlugin: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    async fn register_handlers(
        &mut self,
        events: Arc<EventSystem>,
        context: Arc<dyn ServerContext>,
    ) -> Result<(), PluginError>;

    async fn on_init(&mut self, _context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        Ok(())
    }

    async fn on_shutdown(&mut self, _context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Registers core and client handlers in one block.
///
/// Registration failures become [`PluginError::ExecutionError`], so the macro
/// must be used inside an async fn returning `Result<_, PluginError>`.
#[macro_export]
macro_rules! register_handlers {
    ($events:expr;
     $(core { $($core_name:expr => $core_handler:expr),* $(,)? })?
     $(client { $($namespace:expr, $client_name:expr => $client_handler:expr),* $(,)? })?
    ) => {{
        $($(
            $events
                .on_core($core_name, $core_handler)
                .await
                .map_err(|e| $crate::PluginError::ExecutionError(e.to_string()))?;
        )*)?
        $($(
            $events
                .on_client($namespace, $client_name, $client_handler)
                .await
                .map_err(|e| $crate::PluginError::ExecutionError(e.to_string()))?;
        )*)?
    }};
}

/// What the host exposes to plugins.
#[async_trait]
pub trait ServerContext: Send + Sync {
    fn events(&self) -> Arc<EventSystem>;
    fn server_name(&self) -> &str;
    fn log(&self, level: LogLevel, message: &str);

    /// Live connection for a player, if the host currently holds one
    fn player_handle(&self, player_id: PlayerId) -> Option<Arc<dyn LiveHandle>>;

    /// Deliver an encoded notification to one player
    async fn send_to_player(&self, player_id: PlayerId, data: &[u8]) -> Result<(), ServerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin initialization failed: {0}")]
    InitializationFailed(String),
    #[error("Plugin execution error: {0}")]
    ExecutionError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Player not connected: {0}")]
    PlayerNotConnected(PlayerId),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn create_event_system() -> Arc<EventSystem> {
    Arc::new(EventSystem::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Serialize, Deserialize)]
    struct TestEvent {
        message: String,
    }

    fn test_event(message: &str) -> TestEvent {
        TestEvent {
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_emit() {
        let events = create_event_system();
        let seen = Arc::new(AtomicUsize::new(0));

        let core_seen = seen.clone();
        events
            .on_core("server_started", move |event: TestEvent| {
                assert_eq!(event.message, "up");
                core_seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        let client_seen = seen.clone();
        events
            .on_client(WORLD_NAMESPACE, "block_broken", move |event: BlockBrokenEvent| {
                assert_eq!(event.block, "stone");
                assert_eq!(event.position, Position::new(1, 64, -3));
                client_seen.fetch_add(10, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        events.emit_core("server_started", &test_event("up")).await.unwrap();
        events
            .emit_client(
                WORLD_NAMESPACE,
                "block_broken",
                &BlockBrokenEvent {
                    player_id: PlayerId::new(),
                    block: "stone".to_string(),
                    position: Position::new(1, 64, -3),
                    timestamp: current_timestamp(),
                },
            )
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 11);
        assert_eq!(
            events.stats(),
            EventSystemStats {
                total_handlers: 2,
                events_emitted: 2,
                handler_failures: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_core_and_client_keys_do_not_collide() {
        let events = create_event_system();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        events
            .on_client(WORLD_NAMESPACE, "tick", move |_: TestEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        events.emit_core("tick", &test_event("x")).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_others() {
        let events = create_event_system();
        let seen = Arc::new(AtomicUsize::new(0));

        events
            .on_core("ping", |_: TestEvent| {
                Err(EventError::HandlerExecution("boom".to_string()))
            })
            .await
            .unwrap();

        let after = seen.clone();
        events
            .on_core("ping", move |_: TestEvent| {
                after.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        events.emit_core("ping", &test_event("x")).await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(events.stats().handler_failures, 1);
    }

    #[tokio::test]
    async fn test_emit_without_handlers_is_ok() {
        let events = create_event_system();
        events.emit_core("nobody_listens", &test_event("x")).await.unwrap();

        assert_eq!(events.stats().events_emitted, 0);
    }

    #[tokio::test]
    async fn test_mismatched_payload_is_reported_per_handler() {
        let events = create_event_system();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        events
            .on_core("player_connected", move |_: PlayerConnectedEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        events.emit_core("player_connected", &test_event("wrong")).await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(events.stats().handler_failures, 1);
    }

    #[tokio::test]
    async fn test_empty_event_name_is_rejected() {
        let events = create_event_system();
        let result = events.on_core("", |_: TestEvent| Ok(())).await;

        assert!(matches!(result, Err(EventError::InvalidKey(_))));
        assert_eq!(events.stats().total_handlers, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_handler_may_subscribe_during_emit() {
        let events = create_event_system();

        let inner = Arc::clone(&events);
        events
            .on_core("nested", move |_: TestEvent| {
                let inner = Arc::clone(&inner);
                // Would deadlock if the map lock were held across dispatch.
                tokio::task::block_in_place(|| {
                    tokio::runtime::Handle::current()
                        .block_on(inner.on_core("later", |_: TestEvent| Ok(())))
                })
            })
            .await
            .unwrap();

        let runtime_events = Arc::clone(&events);
        tokio::spawn(async move {
            runtime_events.emit_core("nested", &test_event("x")).await.unwrap();
        })
        .await
        .unwrap();

        assert_eq!(events.stats().total_handlers, 2);
    }

    #[tokio::test]
    async fn test_register_handlers_macro() -> Result<(), PluginError> {
        let events = create_event_system();

        register_handlers!(events;
            core {
                "player_connected" => |_: PlayerConnectedEvent| Ok(()),
                "player_disconnected" => |_: PlayerDisconnectedEvent| Ok(())
            }
            client {
                WORLD_NAMESPACE, "block_broken" => |_: BlockBrokenEvent| Ok(())
            }
        );

        assert_eq!(events.stats().total_handlers, 3);
        Ok(())
    }

    #[test]
    fn test_player_id_parse_round_trip() {
        let id = PlayerId::new();
        assert_eq!(PlayerId::from_str(&id.to_string()).unwrap(), id);
        assert!(PlayerId::from_str("not-a-uuid").is_err());
    }
}
