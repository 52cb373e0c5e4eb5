//! Per-symbol transport task
//!
//! One task per subscribed symbol. It streams while it can, then polls until
//! aborted by the last unsubscribe. Every inbound snapshot is written to the
//! cache once and then fanned out before the next one is read.

use super::{ConnectionMonitor, ConnectionStatus, TransportMode, TransportState};
use crate::asset::{AssetId, AssetSymbol};
use crate::cache::PriceCache;
use crate::error::FeedError;
use crate::feed::{LineDecoder, PriceSnapshot, PriceSource};
use crate::telemetry::{increment, CounterMetric};
use futures_util::StreamExt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub(crate) type PriceCallback = Arc<dyn Fn(&PriceSnapshot) + Send + Sync>;

/// A registered callback with stable identity
pub(crate) struct Subscriber {
    pub id: u64,
    pub active: Arc<AtomicBool>,
    pub callback: PriceCallback,
}

/// Running transport for one symbol
pub(crate) struct SymbolChannel {
    pub subscribers: Arc<Mutex<Vec<Subscriber>>>,
    pub state: Arc<Mutex<TransportState>>,
    task: JoinHandle<()>,
}

impl SymbolChannel {
    pub fn spawn(ctx: TransportContext) -> Self {
        let subscribers = ctx.subscribers.clone();
        let state = ctx.state.clone();
        let task = tokio::spawn(ctx.run());
        Self {
            subscribers,
            state,
            task,
        }
    }

    pub fn state(&self) -> TransportState {
        *lock(&self.state)
    }

    /// Abort the task
    ///
    /// Abort is cooperative: an update already being delivered on another
    /// worker may finish, but it sees an empty subscriber list and neither
    /// writes the cache nor calls anyone. Cancelled handles are skipped by
    /// their `active` flag; a callback that already passed that check may
    /// still run once.
    pub fn stop(self) {
        self.task.abort();
        *lock(&self.state) = TransportState::Stopped;
    }
}

/// Everything a transport task needs, without a handle back to the manager
pub(crate) struct TransportContext {
    pub symbol: AssetSymbol,
    pub id: AssetId,
    pub source: Arc<dyn PriceSource>,
    pub cache: Arc<PriceCache>,
    pub status: Arc<ConnectionMonitor>,
    pub mode: TransportMode,
    pub poll_interval: Duration,
    pub subscribers: Arc<Mutex<Vec<Subscriber>>>,
    pub state: Arc<Mutex<TransportState>>,
}

impl TransportContext {
    async fn run(self) {
        if self.mode == TransportMode::Stream && self.source.supports_streaming() {
            self.set_state(TransportState::Streaming);
            if self.stream().await {
                increment(CounterMetric::StreamFallback);
            }
        }

        self.set_state(TransportState::Polling);
        self.poll().await;
    }

    /// Read the stream until it fails or ends
    ///
    /// Returns `false` when the source turned out not to stream at all.
    async fn stream(&self) -> bool {
        let mut chunks = match self.source.open_stream(&self.symbol).await {
            Ok(chunks) => chunks,
            Err(FeedError::StreamUnsupported) => {
                tracing::debug!(symbol = %self.symbol, "Streaming unsupported, polling instead");
                return false;
            }
            Err(e) => {
                tracing::warn!(symbol = %self.symbol, error = %e, "Failed to open stream, falling back to polling");
                self.status.set(ConnectionStatus::Disconnected);
                return true;
            }
        };

        self.status.set(ConnectionStatus::Connected);
        tracing::info!(symbol = %self.symbol, "Price stream connected");

        let mut decoder = LineDecoder::new(self.symbol.clone(), self.id.clone());
        loop {
            match chunks.next().await {
                Some(Ok(chunk)) => {
                    for snapshot in decoder.push(&chunk) {
                        increment(CounterMetric::StreamUpdate);
                        self.deliver(snapshot);
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(symbol = %self.symbol, error = %e, "Stream read failed, falling back to polling");
                    self.status.set(ConnectionStatus::Disconnected);
                    return true;
                }
                None => {
                    if let Some(snapshot) = decoder.finish() {
                        increment(CounterMetric::StreamUpdate);
                        self.deliver(snapshot);
                    }
                    tracing::info!(symbol = %self.symbol, "Stream closed by upstream, falling back to polling");
                    self.status.set(ConnectionStatus::Disconnected);
                    return true;
                }
            }
        }
    }

    /// Fetch on a fixed interval forever; failures skip a tick
    async fn poll(&self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.source.fetch_latest(std::slice::from_ref(&self.symbol)).await {
                Ok(snapshots) => {
                    self.status.set(ConnectionStatus::Connected);
                    for snapshot in snapshots.into_iter().filter(|s| s.symbol == self.symbol) {
                        increment(CounterMetric::PollUpdate);
                        self.deliver(snapshot);
                    }
                }
                Err(e) => {
                    increment(CounterMetric::PollFailure);
                    tracing::warn!(symbol = %self.symbol, error = %e, "Poll fetch failed, retrying next tick");
                    self.status.set(ConnectionStatus::Disconnected);
                }
            }
        }
    }

    fn deliver(&self, snapshot: PriceSnapshot) {
        // Torn down by the last unsubscribe while this update was in flight
        if lock(&self.subscribers).is_empty() {
            return;
        }
        self.cache.put(self.symbol.clone(), snapshot.clone());
        fan_out(&self.subscribers, &snapshot);
    }

    fn set_state(&self, state: TransportState) {
        tracing::debug!(symbol = %self.symbol, ?state, "Transport state");
        *lock(&self.state) = state;
    }
}

/// Invoke every still-active subscriber in registration order
///
/// Works on a copy of the list so callbacks may unsubscribe (themselves or
/// others) mid-iteration. A panicking callback is logged and skipped.
pub(crate) fn fan_out(subscribers: &Mutex<Vec<Subscriber>>, snapshot: &PriceSnapshot) {
    let targets: Vec<(Arc<AtomicBool>, PriceCallback)> = lock(subscribers)
        .iter()
        .map(|s| (s.active.clone(), s.callback.clone()))
        .collect();

    for (active, callback) in targets {
        if !active.load(Ordering::Acquire) {
            continue;
        }
        if panic::catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
            increment(CounterMetric::CallbackPanic);
            tracing::error!(symbol = %snapshot.symbol, "Subscriber callback panicked");
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
