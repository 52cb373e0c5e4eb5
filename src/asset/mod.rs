//! Asset registry module
//!
//! Maps human-readable symbols (e.g. "BTC/USD") to oracle feed identifiers

mod registry;

pub use registry::{AssetRegistry, DEFAULT_ASSETS};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// External-facing asset key, e.g. "BTC/USD"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetSymbol(Arc<str>);

impl AssetSymbol {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(Arc::from(symbol.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for AssetSymbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AssetSymbol {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl AsRef<str> for AssetSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Oracle network feed identifier (hex)
///
/// Stored normalized: lowercase, without a `0x` prefix. The upstream API
/// returns ids without the prefix, so equality must ignore it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(Arc<str>);

impl AssetId {
    pub fn new(id: impl AsRef<str>) -> Self {
        let raw = id.as_ref().trim();
        let stripped = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        Self(Arc::from(stripped.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
