//! pyth-feed: Pyth oracle price data feed
//!
//! This library provides the core components for:
//! - Asset symbol to Pyth feed id resolution
//! - Batch price fetches from the Hermes REST API
//! - Short-lived price cache shared by reads and live updates
//! - Per-symbol live subscriptions with stream-to-poll fallback
//! - Connection status tracking for UI bindings
//! - Logging and Prometheus metrics

pub mod asset;
pub mod cache;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod feed;
pub mod service;
pub mod subscription;
pub mod telemetry;

pub use asset::{AssetRegistry, AssetSymbol};
pub use error::{FeedError, Result};
pub use feed::{PricePoint, PriceSnapshot};
pub use service::DataFeed;
pub use subscription::{ConnectionStatus, Subscription};
