//! Configuration types for pyth-feed

use crate::asset::AssetRegistry;
use crate::feed::HERMES_URL;
use crate::subscription::TransportMode;
use crate::telemetry::LogFormat;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    /// Extra or overriding `symbol = "feed id"` entries on top of the built-in table
    #[serde(default)]
    pub assets: BTreeMap<String, String>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Price feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Hermes API base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Initial transport for new subscriptions
    #[serde(default)]
    pub transport: TransportMode,

    /// Polling interval (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Cache time-to-live (milliseconds)
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Batch request timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    HERMES_URL.to_string()
}
fn default_poll_interval_ms() -> u64 {
    5_000
}
fn default_cache_ttl_ms() -> u64 {
    60_000
}
fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            transport: TransportMode::Stream,
            poll_interval_ms: default_poll_interval_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Serve Prometheus metrics on this port when set
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the feed cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feed.poll_interval_ms == 0 {
            anyhow::bail!("feed.poll_interval_ms must be greater than zero");
        }
        if self.feed.endpoint.trim().is_empty() {
            anyhow::bail!("feed.endpoint must not be empty");
        }
        if let Some((symbol, _)) = self.assets.iter().find(|(_, id)| id.trim().is_empty()) {
            anyhow::bail!("assets.\"{}\" has an empty feed id", symbol);
        }
        AssetRegistry::with_overrides(&self.assets)?;
        Ok(())
    }
}
