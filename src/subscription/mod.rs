//! Subscription module
//!
//! Per-symbol live updates with stream → poll fallback, connection status
//! tracking and callback fan-out.

mod manager;
mod status;
mod transport;
mod types;

pub use manager::{Subscription, SubscriptionManager};
pub use status::{ConnectionMonitor, StatusListener};
pub use types::{ConnectionStatus, ManagerOptions, TransportMode, TransportState, DEFAULT_POLL_INTERVAL};
