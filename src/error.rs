//! Error types for the price feed

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors raised by the feed components
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// Symbol is not part of the configured asset table
    #[error("Unknown asset symbol: {0}")]
    UnknownSymbol(String),

    /// Batch fetch failed (non-2xx status, network failure, or malformed payload)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The source cannot open a server-push channel
    #[error("Streaming is not supported by this price source")]
    StreamUnsupported,

    /// An open stream failed while reading
    #[error("Stream read error: {0}")]
    StreamRead(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl FeedError {
    /// Whether this error is caused by configuration rather than the network
    pub fn is_configuration(&self) -> bool {
        matches!(self, FeedError::UnknownSymbol(_) | FeedError::Config(_))
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Transport(format!("malformed payload: {}", err))
    }
}
