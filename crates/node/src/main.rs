//! Node host entry point.
//!
//! Loads configuration, installs logging, wires the node plugin into a
//! [`NodeHost`] and drives the simulated population until a shutdown signal
//! arrives.

use anyhow::{anyhow, Context, Result};
use event_system::{create_event_system, SimplePlugin};
use plugin_node::NodePlugin;
use session_registry::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod cli;
mod config;
mod host;
mod logging;
mod signals;
mod simulation;

use cli::CliArgs;
use config::AppConfig;
use host::NodeHost;
use logging::setup_logging;
use signals::wait_for_shutdown;
use simulation::Simulation;

pub struct Application {
    config: AppConfig,
}

impl Application {
    pub async fn new(args: CliArgs) -> Result<Self> {
        // Configuration is loaded before logging exists.
        let mut config = AppConfig::load_from_file(&args.config_path)
            .await
            .map_err(|e| anyhow!("Failed to load {}: {}", args.config_path.display(), e))?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(players) = args.players {
            config.server.simulated_players = players;
        }

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        setup_logging(&config.logging, args.json_logs).context("Failed to initialize logging")?;
        display_banner();
        info!("📂 Config: {}", args.config_path.display());

        Ok(Self { config })
    }

    pub async fn run(self) -> Result<()> {
        let server = &self.config.server;
        info!("📋 Configuration Summary:");
        info!("  🏷️ Name: {}", server.name);
        info!("  👥 Simulated players: {}", server.simulated_players);
        info!("  ⏱️ Tick interval: {}ms", server.tick_interval_ms);
        info!("  🪙 Coins per block: {}", self.config.node.coins_per_block);

        let events = create_event_system();
        let registry = Arc::new(SessionRegistry::new());
        let host = Arc::new(NodeHost::new(server.name.clone(), Arc::clone(&events)));

        let mut plugins: Vec<Box<dyn SimplePlugin>> = vec![Box::new(NodePlugin::new(
            Arc::clone(&registry),
            self.config.node.clone(),
        ))];
        host.load_plugins(&mut plugins)
            .await
            .context("Failed to load plugins")?;

        let initial = events.stats();
        info!("📊 Handlers registered: {}", initial.total_handlers);

        let mut simulation = Simulation::new(Arc::clone(&host), server.simulated_players);
        let mut ticks = tokio::time::interval(Duration::from_millis(server.tick_interval_ms));
        let mut reports = tokio::time::interval(Duration::from_secs(server.stats_interval_secs));
        // The first tick of an interval completes immediately.
        reports.tick().await;

        let shutdown = wait_for_shutdown();
        tokio::pin!(shutdown);

        info!("✅ Node host is running");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        loop {
            tokio::select! {
                result = &mut shutdown => {
                    match result {
                        Ok(signal) => info!("📡 Received {}", signal),
                        Err(e) => error!("❌ Signal handling failed: {}", e),
                    }
                    break;
                }
                _ = ticks.tick() => {
                    simulation.tick().await;
                }
                _ = reports.tick() => {
                    let pruned = registry.prune_inactive();
                    if pruned > 0 {
                        warn!("🧹 Pruned {} inactive sessions", pruned);
                    }
                    log_stats(&registry, &host, &events);
                }
            }
        }

        info!("🛑 Shutdown signal received, initiating graceful shutdown...");
        let disconnected = simulation.disconnect_all().await;
        info!("👋 Disconnected {} players", disconnected);
        host.shutdown_plugins(&mut plugins).await;

        info!("📊 Final Statistics:");
        log_stats(&registry, &host, &events);
        info!("✅ Node host shutdown complete");
        Ok(())
    }
}

fn log_stats(
    registry: &SessionRegistry,
    host: &NodeHost,
    events: &event_system::EventSystem,
) {
    let sessions = registry.stats();
    let event_stats = events.stats();
    info!(
        "📊 Sessions: {} tracked | {} added | {} removed | {} updates ({} missed, {} rejected, {} retries)",
        sessions.tracked_sessions,
        sessions.sessions_added,
        sessions.sessions_removed,
        sessions.updates_applied,
        sessions.updates_missed,
        sessions.updates_rejected,
        sessions.commit_retries
    );
    info!(
        "📊 Host: {} online | {} notifications | {} events emitted ({} handler failures)",
        host.connection_count(),
        host.notifications_delivered(),
        event_stats.events_emitted,
        event_stats.handler_failures
    );
}

fn display_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("╔══════════════════════════════════════╗");
    info!("║            🪙 MC-NODE HOST            ║");
    info!("║                v{:<8}              ║", version);
    info!("║  Session registry + coin rewards     ║");
    info!("╚══════════════════════════════════════╝");
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    }
}
