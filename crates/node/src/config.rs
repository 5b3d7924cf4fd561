//! Configuration management for the node host.
//!
//! Loads [`AppConfig`] from TOML, writing a default file when none exists,
//! and validates it before the host starts.

use plugin_node::NodeSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

fn default_tick_interval() -> u64 {
    500
}

fn default_simulated_players() -> usize {
    8
}

fn default_stats_interval() -> u64 {
    30
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host settings
    pub server: ServerSettings,
    /// Node plugin settings
    #[serde(default)]
    pub node: NodeSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Host-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Name reported to plugins
    pub name: String,
    /// Simulation tick interval in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Size of the simulated player population
    #[serde(default = "default_simulated_players")]
    pub simulated_players: usize,
    /// Seconds between statistics reports and inactive-session pruning
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                name: "mc-node".to_string(),
                tick_interval_ms: default_tick_interval(),
                simulated_players: default_simulated_players(),
                stats_interval_secs: default_stats_interval(),
            },
            node: NodeSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration there and
    /// returns it.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.name.is_empty() {
            return Err("Server name cannot be empty".to_string());
        }

        if self.server.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than zero".to_string());
        }

        if self.server.stats_interval_secs == 0 {
            return Err("stats_interval_secs must be greater than zero".to_string());
        }

        self.node.validate()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
