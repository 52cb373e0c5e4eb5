//! Feed metrics
//!
//! Recorded through the `metrics` facade; exported only when a recorder
//! (e.g. the Prometheus exporter) is installed.

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Batched latest-price request
    BatchFetch,
    /// Time to open a server-push stream
    StreamOpen,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Fresh cache read
    CacheHit,
    /// Missing or expired cache read
    CacheMiss,
    /// Snapshot received from a stream line
    StreamUpdate,
    /// Snapshot received from a poll tick
    PollUpdate,
    /// Poll tick that failed and was skipped
    PollFailure,
    /// Stream abandoned in favour of polling
    StreamFallback,
    /// Connection status changed
    StatusTransition,
    /// Subscriber callback panicked during fan-out
    CallbackPanic,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Symbols with a running transport
    ActiveTransports,
    /// Registered subscriber handles across all symbols
    ActiveSubscribers,
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::BatchFetch => "pythfeed_batch_fetch_latency_ms",
        LatencyMetric::StreamOpen => "pythfeed_stream_open_latency_ms",
    };

    ::metrics::histogram!(metric_name).record(duration.as_secs_f64() * 1000.0);
    tracing::trace!(
        metric = metric_name,
        value_ms = duration.as_millis() as u64,
        "Recording latency"
    );
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    let metric_name = match metric {
        CounterMetric::CacheHit => "pythfeed_cache_hits_total",
        CounterMetric::CacheMiss => "pythfeed_cache_misses_total",
        CounterMetric::StreamUpdate => "pythfeed_stream_updates_total",
        CounterMetric::PollUpdate => "pythfeed_poll_updates_total",
        CounterMetric::PollFailure => "pythfeed_poll_failures_total",
        CounterMetric::StreamFallback => "pythfeed_stream_fallbacks_total",
        CounterMetric::StatusTransition => "pythfeed_status_transitions_total",
        CounterMetric::CallbackPanic => "pythfeed_callback_panics_total",
    };

    ::metrics::counter!(metric_name).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::ActiveTransports => "pythfeed_active_transports",
        GaugeMetric::ActiveSubscribers => "pythfeed_active_subscribers",
    };

    ::metrics::gauge!(metric_name).set(value);
}
