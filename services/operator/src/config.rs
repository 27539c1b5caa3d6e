//! Configuration for the operator.

use anyhow::Result;

/// Operator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds between aggregation passes.
    pub sync_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let sync_interval_secs = std::env::var("FLEETD_SYNC_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let log_level = std::env::var("FLEETD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            sync_interval_secs,
            log_level,
        })
    }
}
