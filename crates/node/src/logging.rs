//! Logging system setup
//!
//! Structured logging through `tracing`, filtered by `RUST_LOG` when set and
//! by the configured level otherwise.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSettings;

/// Installs the global subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn setup_logging(config: &LoggingSettings, json_override: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_override || config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        let settings = LoggingSettings {
            level: "debug".to_string(),
            json_format: false,
        };

        // Another test may already own the global subscriber.
        let _ = setup_logging(&settings, false);
        assert!(setup_logging(&settings, true).is_err());
    }
}
