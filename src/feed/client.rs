//! Hermes HTTP client
//!
//! Talks to the Pyth Hermes REST API: batched latest-price requests and the
//! per-symbol streaming endpoint.

use super::stream::ChunkStream;
use super::wire::LatestPriceResponse;
use super::{PriceSnapshot, PriceSource};
use crate::asset::{AssetId, AssetRegistry, AssetSymbol};
use crate::error::{FeedError, Result};
use crate::telemetry::{record_latency, LatencyMetric};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Hermes API base URL
pub const HERMES_URL: &str = "https://hermes.pyth.network/v2";

/// Configuration for the Hermes client
#[derive(Debug, Clone)]
pub struct HermesConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Timeout for batch requests (never applied to streams)
    pub request_timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Whether the streaming endpoint may be used
    pub streaming: bool,
}

impl Default for HermesConfig {
    fn default() -> Self {
        Self {
            base_url: HERMES_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            streaming: true,
        }
    }
}

/// Client for the Hermes price service
pub struct HermesClient {
    config: HermesConfig,
    registry: Arc<AssetRegistry>,
    http: Client,
}

impl HermesClient {
    /// Create a client with default configuration
    pub fn new(registry: Arc<AssetRegistry>) -> Result<Self> {
        Self::with_config(HermesConfig::default(), registry)
    }

    /// Create a client with custom configuration
    pub fn with_config(mut config: HermesConfig, registry: Arc<AssetRegistry>) -> Result<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| FeedError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            registry,
            http,
        })
    }

    pub fn config(&self) -> &HermesConfig {
        &self.config
    }

    fn latest_url(&self) -> String {
        format!("{}/updates/price/latest", self.config.base_url)
    }

    fn stream_url(&self) -> String {
        format!("{}/updates/price/stream", self.config.base_url)
    }
}

#[async_trait]
impl PriceSource for HermesClient {
    async fn fetch_latest(&self, symbols: &[AssetSymbol]) -> Result<Vec<PriceSnapshot>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let mut requested: HashMap<AssetId, AssetSymbol> = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            requested.insert(self.registry.resolve(symbol)?, symbol.clone());
        }
        let query: Vec<(&str, &str)> = requested.keys().map(|id| ("ids[]", id.as_str())).collect();

        tracing::debug!(count = requested.len(), "Fetching latest prices");
        let started = Instant::now();

        let response = self
            .http
            .get(self.latest_url())
            .query(&query)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Transport(format!("Hermes API error: {} - {}", status, body)));
        }

        let body = response.text().await?;
        let payload: LatestPriceResponse = serde_json::from_str(&body)?;
        record_latency(LatencyMetric::BatchFetch, started.elapsed());

        let mut snapshots = Vec::with_capacity(payload.parsed.len());
        for update in payload.parsed {
            match requested.get(&update.asset_id()) {
                Some(symbol) => snapshots.push(update.into_snapshot(symbol.clone())),
                None => {
                    let known = self.registry.symbol_for_id(&update.asset_id());
                    tracing::debug!(id = %update.id, symbol = ?known, "Ignoring unrequested feed id");
                }
            }
        }

        if snapshots.len() < requested.len() {
            tracing::warn!(
                requested = requested.len(),
                returned = snapshots.len(),
                "Hermes response is missing requested feeds"
            );
        }

        Ok(snapshots)
    }

    async fn open_stream(&self, symbol: &AssetSymbol) -> Result<ChunkStream> {
        if !self.config.streaming {
            return Err(FeedError::StreamUnsupported);
        }

        let id = self.registry.resolve(symbol)?;
        tracing::info!(symbol = %symbol, "Opening Hermes price stream");
        let started = Instant::now();

        let response = self
            .http
            .get(self.stream_url())
            .query(&[("ids[]", id.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::Transport(format!(
                "Hermes stream rejected: {}",
                response.status()
            )));
        }
        record_latency(LatencyMetric::StreamOpen, started.elapsed());

        let chunks = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| FeedError::StreamRead(e.to_string()))
            })
            .boxed();

        Ok(chunks)
    }

    fn supports_streaming(&self) -> bool {
        self.config.streaming
    }
}
