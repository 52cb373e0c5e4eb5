//! Feed facade
//!
//! Single entry point for UI bindings: batch reads, live subscriptions and
//! connection status. Each `DataFeed` is an independent, explicitly owned
//! instance; nothing is shared globally.

use crate::asset::{AssetRegistry, AssetSymbol};
use crate::cache::{PriceCache, DEFAULT_TTL};
use crate::config::Config;
use crate::error::Result;
use crate::feed::{HermesClient, HermesConfig, PriceSnapshot, PriceSource};
use crate::subscription::{
    ConnectionMonitor, ConnectionStatus, ManagerOptions, StatusListener, Subscription,
    SubscriptionManager, TransportMode, TransportState,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Composed price feed service
pub struct DataFeed {
    registry: Arc<AssetRegistry>,
    cache: Arc<PriceCache>,
    status: Arc<ConnectionMonitor>,
    subscriptions: SubscriptionManager,
}

impl DataFeed {
    /// Build a feed backed by the Hermes API
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = Arc::new(AssetRegistry::with_overrides(&config.assets)?);
        let hermes = HermesConfig {
            base_url: config.feed.endpoint.clone(),
            request_timeout: config.feed.request_timeout(),
            streaming: config.feed.transport == TransportMode::Stream,
            ..HermesConfig::default()
        };
        let client = HermesClient::with_config(hermes, registry.clone())?;

        Ok(Self::builder(Arc::new(client))
            .registry(registry)
            .cache_ttl(config.feed.cache_ttl())
            .poll_interval(config.feed.poll_interval())
            .transport(config.feed.transport)
            .build())
    }

    /// Start building a feed around any price source
    pub fn builder(source: Arc<dyn PriceSource>) -> DataFeedBuilder {
        DataFeedBuilder {
            source,
            registry: None,
            cache_ttl: DEFAULT_TTL,
            options: ManagerOptions::default(),
        }
    }

    /// Latest snapshot per symbol; see [`SubscriptionManager::get_latest`]
    pub async fn get_latest(&self, symbols: &[AssetSymbol]) -> Result<Vec<PriceSnapshot>> {
        self.subscriptions.get_latest(symbols).await
    }

    /// Live updates for `symbol`. Must be called within a Tokio runtime.
    pub fn subscribe<F>(&self, symbol: &AssetSymbol, callback: F) -> Result<Subscription>
    where
        F: Fn(&PriceSnapshot) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(symbol, callback)
    }

    pub fn subscribe_channel(
        &self,
        symbol: &AssetSymbol,
    ) -> Result<(Subscription, mpsc::UnboundedReceiver<PriceSnapshot>)> {
        self.subscriptions.subscribe_channel(symbol)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.status.status()
    }

    /// Register a connection status listener; drop the handle to remove it
    pub fn on_connection_status_change<F>(&self, listener: F) -> StatusListener
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        self.status.on_change(listener)
    }

    pub fn watch_connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.watch()
    }

    /// Fresh cached prices keyed by symbol
    pub fn latest_prices(&self) -> HashMap<AssetSymbol, PriceSnapshot> {
        self.cache.fresh_entries()
    }

    pub fn transport_state(&self, symbol: &AssetSymbol) -> TransportState {
        self.subscriptions.transport_state(symbol)
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }
}

/// Builder for [`DataFeed`]
pub struct DataFeedBuilder {
    source: Arc<dyn PriceSource>,
    registry: Option<Arc<AssetRegistry>>,
    cache_ttl: Duration,
    options: ManagerOptions,
}

impl DataFeedBuilder {
    pub fn registry(mut self, registry: Arc<AssetRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = interval;
        self
    }

    pub fn transport(mut self, mode: TransportMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn build(self) -> DataFeed {
        let registry = self.registry.unwrap_or_default();
        let cache = Arc::new(PriceCache::new(self.cache_ttl));
        let status = Arc::new(ConnectionMonitor::new());
        let subscriptions = SubscriptionManager::new(
            self.source,
            registry.clone(),
            cache.clone(),
            status.clone(),
            self.options,
        );

        DataFeed {
            registry,
            cache,
            status,
            subscriptions,
        }
    }
}
