use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::CoreError;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `stock_tracker_core=debug`.
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

/// Install a console subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), CoreError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| CoreError::LoggingInit(e.to_string()))?;

    tracing::info!(level = %config.log_level, "Console logging initialized");
    Ok(())
}
