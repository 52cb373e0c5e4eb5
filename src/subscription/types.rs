//! Subscription state types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Transport health as observed by the subscription manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Per-symbol transport lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    /// No subscriber has asked for this symbol yet
    Idle,
    /// Reading a server-push stream
    Streaming,
    /// Fetching on a fixed interval
    Polling,
    /// The last subscriber left and the transport was torn down
    Stopped,
}

/// Which transport a new symbol starts with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Try streaming first, fall back to polling
    #[default]
    Stream,
    /// Poll only
    Poll,
}

/// Default polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5_000);

/// Transport selection for a subscription manager
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub mode: TransportMode,
    pub poll_interval: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            mode: TransportMode::Stream,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
