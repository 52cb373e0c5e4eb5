//! Subscription manager
//!
//! Owns the per-symbol transports, multiplexes subscriber callbacks and serves
//! cache-first batch reads.

use super::transport::{lock, Subscriber, SymbolChannel, TransportContext};
use super::{ConnectionMonitor, ManagerOptions, TransportState};
use crate::asset::{AssetRegistry, AssetSymbol};
use crate::cache::PriceCache;
use crate::error::Result;
use crate::feed::{PriceSnapshot, PriceSource};
use crate::telemetry::{set_gauge, GaugeMetric};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

#[derive(Default)]
struct Channels {
    active: HashMap<AssetSymbol, SymbolChannel>,
    stopped: HashSet<AssetSymbol>,
}

struct Shared {
    source: Arc<dyn PriceSource>,
    registry: Arc<AssetRegistry>,
    cache: Arc<PriceCache>,
    status: Arc<ConnectionMonitor>,
    options: ManagerOptions,
    channels: Mutex<Channels>,
    next_id: AtomicU64,
}

impl Shared {
    /// Drop one registration; tear the transport down if it was the last one
    ///
    /// The count check and the teardown happen under the same lock.
    fn remove(&self, symbol: &AssetSymbol, id: u64) {
        let mut channels = lock(&self.channels);

        let now_empty = match channels.active.get(symbol) {
            Some(channel) => {
                let mut subscribers = lock(&channel.subscribers);
                subscribers.retain(|s| s.id != id);
                subscribers.is_empty()
            }
            None => return,
        };

        if now_empty {
            if let Some(channel) = channels.active.remove(symbol) {
                channel.stop();
                channels.stopped.insert(symbol.clone());
                tracing::info!(symbol = %symbol, "Last subscriber left, transport stopped");
            }
        }

        report_gauges(&channels);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let channels = std::mem::take(&mut *lock(&self.channels));
        for (_, channel) in channels.active {
            channel.stop();
        }
    }
}

/// Multiplexes live updates per symbol over one shared transport
pub struct SubscriptionManager {
    shared: Arc<Shared>,
}

impl SubscriptionManager {
    pub fn new(
        source: Arc<dyn PriceSource>,
        registry: Arc<AssetRegistry>,
        cache: Arc<PriceCache>,
        status: Arc<ConnectionMonitor>,
        options: ManagerOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                registry,
                cache,
                status,
                options,
                channels: Mutex::new(Channels::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Latest snapshots, cache first
    ///
    /// Cache misses are fetched in a single batch and written back to the
    /// cache. Results follow the first-seen order of `symbols`; duplicates are
    /// collapsed, and symbols the upstream did not return are left out.
    pub async fn get_latest(&self, symbols: &[AssetSymbol]) -> Result<Vec<PriceSnapshot>> {
        let mut unique: Vec<&AssetSymbol> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            self.shared.registry.resolve(symbol)?;
            if !unique.contains(&symbol) {
                unique.push(symbol);
            }
        }

        let mut found: HashMap<AssetSymbol, PriceSnapshot> = HashMap::with_capacity(unique.len());
        let mut misses: Vec<AssetSymbol> = Vec::new();
        for symbol in &unique {
            match self.shared.cache.get(symbol) {
                Some(snapshot) => {
                    found.insert((*symbol).clone(), snapshot);
                }
                None => misses.push((*symbol).clone()),
            }
        }

        if !misses.is_empty() {
            tracing::debug!(hits = found.len(), misses = misses.len(), "Fetching cache misses");
            for snapshot in self.shared.source.fetch_latest(&misses).await? {
                if misses.contains(&snapshot.symbol) {
                    self.shared.cache.put(snapshot.symbol.clone(), snapshot.clone());
                    found.insert(snapshot.symbol.clone(), snapshot);
                }
            }
        }

        Ok(unique
            .into_iter()
            .filter_map(|symbol| found.remove(symbol))
            .collect())
    }

    /// Register `callback` for live updates on `symbol`
    ///
    /// The first subscriber for a symbol starts its transport; later ones
    /// share it. Returns immediately; delivery happens on the transport task.
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<F>(&self, symbol: &AssetSymbol, callback: F) -> Result<Subscription>
    where
        F: Fn(&PriceSnapshot) + Send + Sync + 'static,
    {
        let asset_id = self.shared.registry.resolve(symbol)?;
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        let subscriber = Subscriber {
            id,
            active: active.clone(),
            callback: Arc::new(callback),
        };

        let mut channels = lock(&self.shared.channels);
        match channels.active.get(symbol) {
            Some(channel) => {
                lock(&channel.subscribers).push(subscriber);
                tracing::debug!(symbol = %symbol, subscription = id, "Joined existing transport");
            }
            None => {
                let shared = &self.shared;
                let ctx = TransportContext {
                    symbol: symbol.clone(),
                    id: asset_id,
                    source: shared.source.clone(),
                    cache: shared.cache.clone(),
                    status: shared.status.clone(),
                    mode: shared.options.mode,
                    poll_interval: shared.options.poll_interval,
                    subscribers: Arc::new(Mutex::new(vec![subscriber])),
                    state: Arc::new(Mutex::new(TransportState::Idle)),
                };
                channels.stopped.remove(symbol);
                channels.active.insert(symbol.clone(), SymbolChannel::spawn(ctx));
                tracing::info!(symbol = %symbol, mode = ?shared.options.mode, "Started transport");
            }
        }
        report_gauges(&channels);

        Ok(Subscription {
            id,
            symbol: symbol.clone(),
            active,
            shared: Arc::downgrade(&self.shared),
        })
    }

    /// Channel flavour of [`subscribe`](Self::subscribe)
    ///
    /// The receiver is unbounded so no update is dropped for a slow reader.
    pub fn subscribe_channel(
        &self,
        symbol: &AssetSymbol,
    ) -> Result<(Subscription, mpsc::UnboundedReceiver<PriceSnapshot>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(symbol, move |snapshot| {
            let _ = tx.send(snapshot.clone());
        })?;
        Ok((subscription, rx))
    }

    /// Transport state for `symbol`
    pub fn transport_state(&self, symbol: &AssetSymbol) -> TransportState {
        let channels = lock(&self.shared.channels);
        match channels.active.get(symbol) {
            Some(channel) => channel.state(),
            None if channels.stopped.contains(symbol) => TransportState::Stopped,
            None => TransportState::Idle,
        }
    }

    /// Number of live registrations for `symbol`
    pub fn subscriber_count(&self, symbol: &AssetSymbol) -> usize {
        lock(&self.shared.channels)
            .active
            .get(symbol)
            .map(|channel| lock(&channel.subscribers).len())
            .unwrap_or(0)
    }

    /// Symbols with a running transport
    pub fn active_symbols(&self) -> Vec<AssetSymbol> {
        let mut symbols: Vec<AssetSymbol> = lock(&self.shared.channels).active.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

fn report_gauges(channels: &Channels) {
    let subscribers: usize = channels
        .active
        .values()
        .map(|channel| lock(&channel.subscribers).len())
        .sum();
    set_gauge(GaugeMetric::ActiveTransports, channels.active.len() as f64);
    set_gauge(GaugeMetric::ActiveSubscribers, subscribers as f64);
}

/// Handle for one live registration
///
/// Cancelling stops callback invocations for this registration only; the
/// shared transport stops when its last registration is cancelled. Dropping
/// the handle cancels it.
pub struct Subscription {
    id: u64,
    symbol: AssetSymbol,
    active: Arc<AtomicBool>,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn symbol(&self) -> &AssetSymbol {
        &self.symbol
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Cancel this registration. Idempotent.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(symbol = %self.symbol, subscription = self.id, "Unsubscribed");
        if let Some(shared) = self.shared.upgrade() {
            shared.remove(&self.symbol, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("symbol", &self.symbol)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::feed::{ChunkStream, PricePoint};
    use crate::subscription::{ConnectionStatus, TransportMode};
    use async_trait::async_trait;
    use std::time::Duration;

    fn snapshot(symbol: &AssetSymbol, mantissa: i64) -> PriceSnapshot {
        let point = PricePoint::from_raw(mantissa, 1, -2, 1_700_000_000);
        PriceSnapshot::new(symbol.clone(), point.clone(), point)
    }

    #[derive(Default)]
    struct CountingSource {
        calls: Mutex<Vec<Vec<AssetSymbol>>>,
        fail: AtomicBool,
        no_streaming: bool,
        opens: AtomicU64,
    }

    impl CountingSource {
        fn calls(&self) -> Vec<Vec<AssetSymbol>> {
            lock(&self.calls).clone()
        }
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        async fn fetch_latest(&self, symbols: &[AssetSymbol]) -> Result<Vec<PriceSnapshot>> {
            lock(&self.calls).push(symbols.to_vec());
            if self.fail.load(Ordering::SeqCst) {
                return Err(FeedError::Transport("503 Service Unavailable".into()));
            }
            // Reverse to prove results are matched by symbol, not position
            Ok(symbols.iter().rev().map(|s| snapshot(s, 10_000)).collect())
        }

        async fn open_stream(&self, _symbol: &AssetSymbol) -> Result<ChunkStream> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Err(FeedError::StreamUnsupported)
        }

        fn supports_streaming(&self) -> bool {
            !self.no_streaming
        }
    }

    fn manager(source: Arc<CountingSource>, mode: TransportMode) -> (SubscriptionManager, Arc<PriceCache>, Arc<ConnectionMonitor>) {
        let cache = Arc::new(PriceCache::default());
        let status = Arc::new(ConnectionMonitor::new());
        let manager = SubscriptionManager::new(
            source,
            Arc::new(AssetRegistry::default()),
            cache.clone(),
            status.clone(),
            ManagerOptions {
                mode,
                poll_interval: Duration::from_secs(5),
            },
        );
        (manager, cache, status)
    }

    fn btc() -> AssetSymbol {
        AssetSymbol::from("BTC/USD")
    }

    fn eth() -> AssetSymbol {
        AssetSymbol::from("ETH/USD")
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_latest_uses_cache_within_ttl() {
        let source = Arc::new(CountingSource::default());
        let (manager, _, _) = manager(source.clone(), TransportMode::Poll);

        manager.get_latest(&[btc()]).await.unwrap();
        tokio::time::advance(Duration::from_millis(60_000)).await;
        let result = manager.get_latest(&[btc()]).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(source.calls().len(), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        manager.get_latest(&[btc()]).await.unwrap();
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_get_latest_fetches_only_misses() {
        let source = Arc::new(CountingSource::default());
        let (manager, cache, _) = manager(source.clone(), TransportMode::Poll);
        cache.put(btc(), snapshot(&btc(), 500));

        let result = manager.get_latest(&[btc(), eth()]).await.unwrap();

        assert_eq!(source.calls(), vec![vec![eth()]]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].symbol, btc());
        assert_eq!(result[0].price.price, 5.0);
        assert_eq!(result[1].symbol, eth());
        assert_eq!(result[1].price.price, 100.0);
        assert!(cache.get(&eth()).is_some());
    }

    #[tokio::test]
    async fn test_get_latest_collapses_duplicates() {
        let source = Arc::new(CountingSource::default());
        let (manager, _, _) = manager(source.clone(), TransportMode::Poll);

        let result = manager.get_latest(&[eth(), btc(), eth()]).await.unwrap();
        let symbols: Vec<AssetSymbol> = result.into_iter().map(|s| s.symbol).collect();
        assert_eq!(symbols, vec![eth(), btc()]);
        assert_eq!(source.calls(), vec![vec![eth(), btc()]]);
    }

    #[tokio::test]
    async fn test_get_latest_unknown_symbol() {
        let source = Arc::new(CountingSource::default());
        let (manager, _, _) = manager(source.clone(), TransportMode::Poll);

        let err = manager
            .get_latest(&[btc(), AssetSymbol::from("DOGE/USD")])
            .await
            .unwrap_err();
        assert_eq!(err, FeedError::UnknownSymbol("DOGE/USD".into()));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_latest_propagates_transport_error() {
        let source = Arc::new(CountingSource::default());
        source.fail.store(true, Ordering::SeqCst);
        let (manager, cache, _) = manager(source.clone(), TransportMode::Poll);

        let err = manager.get_latest(&[btc()]).await.unwrap_err();
        assert!(matches!(err, FeedError::Transport(_)));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_unknown_symbol() {
        let source = Arc::new(CountingSource::default());
        let (manager, _, _) = manager(source, TransportMode::Poll);

        let result = manager.subscribe(&AssetSymbol::from("DOGE/USD"), |_| {});
        assert!(matches!(result, Err(FeedError::UnknownSymbol(_))));
        assert_eq!(manager.transport_state(&AssetSymbol::from("DOGE/USD")), TransportState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_delivers_and_stops() {
        let source = Arc::new(CountingSource::default());
        let (manager, cache, status) = manager(source.clone(), TransportMode::Poll);
        assert_eq!(manager.transport_state(&btc()), TransportState::Idle);

        let (subscription, mut rx) = manager.subscribe_channel(&btc()).unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.symbol, btc());
        assert_eq!(manager.transport_state(&btc()), TransportState::Polling);
        assert_eq!(status.status(), ConnectionStatus::Connected);
        assert!(cache.get(&btc()).is_some());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.recv().await.is_some());
        let calls_before = source.calls().len();

        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert_eq!(manager.transport_state(&btc()), TransportState::Stopped);
        assert!(manager.active_symbols().is_empty());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls().len(), calls_before);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_transport_per_symbol() {
        let source = Arc::new(CountingSource::default());
        let (manager, _, _) = manager(source.clone(), TransportMode::Poll);

        let (first, mut rx1) = manager.subscribe_channel(&btc()).unwrap();
        let (_second, mut rx2) = manager.subscribe_channel(&btc()).unwrap();
        assert_eq!(manager.subscriber_count(&btc()), 2);
        assert_eq!(manager.active_symbols(), vec![btc()]);

        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
        // One transport: one fetch per tick regardless of subscriber count
        assert_eq!(source.calls().len(), 1);

        drop(first);
        assert_eq!(manager.subscriber_count(&btc()), 1);
        assert_eq!(manager.transport_state(&btc()), TransportState::Polling);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx2.recv().await.is_some());
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_keeps_subscription_alive() {
        let source = Arc::new(CountingSource::default());
        source.fail.store(true, Ordering::SeqCst);
        let (manager, _, status) = manager(source.clone(), TransportMode::Poll);

        let (subscription, mut rx) = manager.subscribe_channel(&btc()).unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(source.calls().len(), 3);
        assert!(rx.try_recv().is_err());
        assert_eq!(status.status(), ConnectionStatus::Disconnected);
        assert!(subscription.is_active());

        source.fail.store(false, Ordering::SeqCst);
        assert!(rx.recv().await.is_some());
        assert_eq!(status.status(), ConnectionStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_unsupported_falls_back_to_polling() {
        let source = Arc::new(CountingSource::default());
        let (manager, _, _) = manager(source.clone(), TransportMode::Stream);

        let (_subscription, mut rx) = manager.subscribe_channel(&eth()).unwrap();
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.symbol, eth());
        assert_eq!(manager.transport_state(&eth()), TransportState::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_stream_capability_polls_directly() {
        let source = Arc::new(CountingSource {
            no_streaming: true,
            ..Default::default()
        });
        let (manager, _, _) = manager(source.clone(), TransportMode::Stream);

        let (_subscription, mut rx) = manager.subscribe_channel(&btc()).unwrap();
        rx.recv().await.unwrap();

        assert_eq!(source.opens.load(Ordering::SeqCst), 0);
        assert_eq!(manager.transport_state(&btc()), TransportState::Polling);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let source = Arc::new(CountingSource::default());
        let (manager, _, _) = manager(source, TransportMode::Poll);

        let subscription = manager.subscribe(&btc(), |_| {}).unwrap();
        subscription.unsubscribe();
        subscription.unsubscribe();
        drop(subscription);
        assert_eq!(manager.transport_state(&btc()), TransportState::Stopped);

        let _again = manager.subscribe(&btc(), |_| {}).unwrap();
        assert_ne!(manager.transport_state(&btc()), TransportState::Stopped);
    }
}
