//! Simulated player population.
//!
//! Each tick, offline players may join, online players break a block in
//! parallel (one task per player), and some players leave. Schedules are
//! derived from the tick number so runs are reproducible.

use event_system::{
    current_timestamp, BlockBrokenEvent, DisconnectReason, PlayerConnectedEvent,
    PlayerDisconnectedEvent, PlayerId, Position, ServerContext, WORLD_NAMESPACE,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error};

use crate::host::NodeHost;

const BLOCKS: [&str; 4] = ["stone", "dirt", "oak_log", "coal_ore"];
const JOIN_EVERY: u64 = 3;
const LEAVE_EVERY: u64 = 17;

#[derive(Debug, Clone)]
struct SimPlayer {
    id: PlayerId,
    name: String,
}

/// Summary of what happened in one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub joined: usize,
    pub left: usize,
    pub blocks_broken: usize,
}

pub struct Simulation {
    host: Arc<NodeHost>,
    roster: Vec<SimPlayer>,
    tick: u64,
}

impl Simulation {
    pub fn new(host: Arc<NodeHost>, players: usize) -> Self {
        let roster = (0..players)
            .map(|i| SimPlayer {
                id: PlayerId::new(),
                name: format!("Player_{}", i + 1),
            })
            .collect();

        Self {
            host,
            roster,
            tick: 0,
        }
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.roster.iter().map(|p| p.id).collect()
    }

    pub async fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let tick = self.tick;
        let mut report = TickReport::default();

        let mut breakers = Vec::new();
        for (index, player) in self.roster.iter().enumerate() {
            let phase = tick + index as u64;
            if !self.host.is_online(player.id) {
                if phase % JOIN_EVERY == 0 {
                    connect(&self.host, player).await;
                    report.joined += 1;
                }
            } else if phase % LEAVE_EVERY == 0 {
                disconnect(&self.host, player.id, DisconnectReason::ClientDisconnect).await;
                report.left += 1;
            } else {
                breakers.push((player.id, phase));
            }
        }

        let tasks = breakers.into_iter().map(|(player_id, phase)| {
            let events = self.host.events();
            tokio::spawn(async move {
                let event = BlockBrokenEvent {
                    player_id,
                    block: BLOCKS[(phase % BLOCKS.len() as u64) as usize].to_string(),
                    position: Position::new(phase as i64 % 64, 64, tick as i64 % 64),
                    timestamp: current_timestamp(),
                };
                events.emit_client(WORLD_NAMESPACE, "block_broken", &event).await
            })
        });

        for result in join_all(tasks).await {
            match result {
                Ok(Ok(())) => report.blocks_broken += 1,
                Ok(Err(e)) => error!("❌ Failed to emit block break: {}", e),
                Err(e) => error!("❌ Block break task panicked: {}", e),
            }
        }

        debug!("Tick {}: {:?}", tick, report);
        report
    }

    /// Disconnects every online player with [`DisconnectReason::ServerShutdown`].
    pub async fn disconnect_all(&self) -> usize {
        let online = self.host.online_players();
        for player_id in &online {
            disconnect(&self.host, *player_id, DisconnectReason::ServerShutdown).await;
        }
        online.len()
    }
}

async fn connect(host: &NodeHost, player: &SimPlayer) {
    let connection = host.connect(player.id, &player.name);
    let event = PlayerConnectedEvent {
        player_id: player.id,
        name: player.name.clone(),
        connection_id: format!("sim-{:p}", Arc::as_ptr(&connection)),
        timestamp: current_timestamp(),
    };
    if let Err(e) = host.events().emit_core("player_connected", &event).await {
        error!("❌ Failed to emit player_connected: {}", e);
    }
}

async fn disconnect(host: &NodeHost, player_id: PlayerId, reason: DisconnectReason) {
    let connection_id = host
        .disconnect(player_id)
        .map(|c| format!("sim-{:p}", Arc::as_ptr(&c)))
        .unwrap_or_default();
    let event = PlayerDisconnectedEvent {
        player_id,
        connection_id,
        reason,
        timestamp: current_timestamp(),
    };
    if let Err(e) = host.events().emit_core("player_disconnected", &event).await {
        error!("❌ Failed to emit player_disconnected: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_system::{create_event_system, SimplePlugin};
    use plugin_node::handlers::session_id;
    use plugin_node::{NodePlugin, NodeSettings};
    use session_registry::SessionRegistry;

    async fn setup(players: usize) -> (Arc<NodeHost>, Arc<SessionRegistry>, Simulation, Vec<Box<dyn SimplePlugin>>) {
        let host = Arc::new(NodeHost::new("sim-test", create_event_system()));
        let registry = Arc::new(SessionRegistry::new());
        let mut plugins: Vec<Box<dyn SimplePlugin>> = vec![Box::new(NodePlugin::new(
            Arc::clone(&registry),
            NodeSettings::default(),
        ))];
        host.load_plugins(&mut plugins).await.unwrap();
        let simulation = Simulation::new(Arc::clone(&host), players);
        (host, registry, simulation, plugins)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_registry_mirrors_online_players() {
        let (host, registry, mut simulation, _plugins) = setup(6).await;

        let mut total_broken = 0;
        for _ in 0..40 {
            total_broken += simulation.tick().await.blocks_broken;

            assert_eq!(registry.len(), host.connection_count());
            for player_id in host.online_players() {
                assert!(registry.get(&session_id(player_id)).unwrap().is_active());
            }
        }

        let coins: u64 = registry.snapshot().iter().map(|s| s.counter()).sum();
        assert!(coins <= total_broken as u64);
        assert_eq!(registry.stats().updates_applied as usize, total_broken);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disconnect_all_empties_registry() {
        let (host, registry, mut simulation, mut plugins) = setup(4).await;
        for _ in 0..5 {
            simulation.tick().await;
        }
        assert!(host.connection_count() > 0);

        let disconnected = simulation.disconnect_all().await;
        assert!(disconnected > 0);
        assert_eq!(host.connection_count(), 0);
        assert!(registry.is_empty());
        assert_eq!(registry.prune_inactive(), 0);

        host.shutdown_plugins(&mut plugins).await;
        assert!(simulation.player_ids().iter().all(|id| registry.get(&session_id(*id)).is_none()));
    }
}
