//! Newline-delimited JSON stream decoding

use super::wire::parse_stream_line;
use super::PriceSnapshot;
use crate::asset::{AssetId, AssetSymbol};
use crate::error::FeedError;
use futures_util::stream::BoxStream;

/// Raw byte chunks from a server-push channel
///
/// The stream ends when the upstream closes the connection. Callers treat the
/// end as "fall back to polling", not as a terminal failure.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, FeedError>>;

/// Splits byte chunks into lines and decodes each line independently
///
/// Lines may straddle chunk boundaries; partial bytes are buffered until the
/// next `\n` arrives.
#[derive(Debug)]
pub struct LineDecoder {
    symbol: AssetSymbol,
    id: AssetId,
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new(symbol: AssetSymbol, id: AssetId) -> Self {
        Self {
            symbol,
            id,
            buffer: Vec::new(),
        }
    }

    /// Feed one chunk, returning snapshots for every completed line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<PriceSnapshot> {
        self.buffer.extend_from_slice(chunk);

        let mut snapshots = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(snapshot) = self.decode_line(&line) {
                snapshots.push(snapshot);
            }
        }
        snapshots
    }

    /// Decode whatever unterminated line remains at end-of-stream
    pub fn finish(&mut self) -> Option<PriceSnapshot> {
        let rest = std::mem::take(&mut self.buffer);
        self.decode_line(&rest)
    }

    /// Bytes waiting for a line terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn decode_line(&self, line: &[u8]) -> Option<PriceSnapshot> {
        match std::str::from_utf8(line) {
            Ok(text) => parse_stream_line(text, &self.id, &self.symbol),
            Err(_) => {
                tracing::debug!(symbol = %self.symbol, len = line.len(), "Ignoring non-UTF-8 stream line");
                None
            }
        }
    }
}
