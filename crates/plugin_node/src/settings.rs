//! Plugin settings, read from the host's `[node]` configuration table.

use serde::{Deserialize, Serialize};

fn default_coins_per_block() -> u32 {
    1
}

fn default_message_prefix() -> String {
    "&a[MC-NODE]".to_string()
}

fn default_welcome_title() -> String {
    "&a&lWelcome".to_string()
}

fn default_welcome_subtitle() -> String {
    "&b&lMC-Node".to_string()
}

/// Reward and greeting configuration for [`NodePlugin`](crate::NodePlugin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Coins granted for every broken block
    #[serde(default = "default_coins_per_block")]
    pub coins_per_block: u32,
    /// Prefix prepended to every chat notification
    #[serde(default = "default_message_prefix")]
    pub message_prefix: String,
    /// Title shown when a player joins
    #[serde(default = "default_welcome_title")]
    pub welcome_title: String,
    /// Subtitle shown when a player joins
    #[serde(default = "default_welcome_subtitle")]
    pub welcome_subtitle: String,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            coins_per_block: default_coins_per_block(),
            message_prefix: default_message_prefix(),
            welcome_title: default_welcome_title(),
            welcome_subtitle: default_welcome_subtitle(),
        }
    }
}

impl NodeSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.coins_per_block == 0 {
            return Err("coins_per_block must be greater than zero".to_string());
        }
        if self.welcome_title.is_empty() {
            return Err("welcome_title cannot be empty".to_string());
        }
        Ok(())
    }
}
