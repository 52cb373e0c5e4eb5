//! Price feed module
//!
//! Batch snapshot fetches and server-push streams against the Pyth Hermes API

mod client;
mod stream;
mod types;
mod wire;

pub use client::{HermesClient, HermesConfig, HERMES_URL};
pub use stream::{ChunkStream, LineDecoder};
pub use types::{decode_scaled, PricePoint, PriceSnapshot};

use crate::asset::AssetSymbol;
use crate::error::Result;
use async_trait::async_trait;

/// Upstream price source
///
/// `HermesClient` is the network implementation; tests provide doubles.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the latest snapshot for every symbol in one batched request
    ///
    /// Results are keyed back to symbols by feed id, not by position.
    async fn fetch_latest(&self, symbols: &[AssetSymbol]) -> Result<Vec<PriceSnapshot>>;

    /// Open a server-push channel for one symbol
    ///
    /// Returns `FeedError::StreamUnsupported` when the source has no streaming capability.
    async fn open_stream(&self, symbol: &AssetSymbol) -> Result<ChunkStream>;

    /// Whether `open_stream` is worth trying; `false` goes straight to polling
    fn supports_streaming(&self) -> bool {
        true
    }
}
