//! Static symbol → feed id lookup table

use super::{AssetId, AssetSymbol};
use crate::error::{FeedError, Result};
use std::collections::{BTreeMap, HashMap};

/// Built-in Pyth price feed ids
pub const DEFAULT_ASSETS: &[(&str, &str)] = &[
    (
        "BTC/USD",
        "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43",
    ),
    (
        "ETH/USD",
        "c96458d393fe9deb7a7d63a0ac41e2898a67a7750dbd166673279e06c868df0a",
    ),
];

/// Immutable asset table. Pure lookups, no I/O.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    by_symbol: BTreeMap<AssetSymbol, AssetId>,
    by_id: HashMap<AssetId, AssetSymbol>,
}

impl AssetRegistry {
    /// Build a registry from `(symbol, id)` pairs
    ///
    /// A later pair for the same symbol replaces the earlier one. Two symbols
    /// sharing one feed id is a `FeedError::Config`.
    pub fn new<I, S, T>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut by_symbol = BTreeMap::new();
        for (symbol, id) in entries {
            by_symbol.insert(AssetSymbol::new(symbol), AssetId::new(id));
        }

        let mut by_id = HashMap::with_capacity(by_symbol.len());
        for (symbol, id) in &by_symbol {
            if let Some(existing) = by_id.insert(id.clone(), symbol.clone()) {
                return Err(FeedError::Config(format!(
                    "feed id {} is mapped to both {} and {}",
                    id, existing, symbol
                )));
            }
        }

        Ok(Self { by_symbol, by_id })
    }

    /// Built-in table extended with `overrides`
    pub fn with_overrides<'a>(overrides: impl IntoIterator<Item = (&'a String, &'a String)>) -> Result<Self> {
        let entries = DEFAULT_ASSETS
            .iter()
            .map(|(s, id)| (s.to_string(), id.to_string()))
            .chain(overrides.into_iter().map(|(s, id)| (s.clone(), id.clone())));
        Self::new(entries)
    }

    /// Resolve a symbol to its oracle feed id
    pub fn resolve(&self, symbol: &AssetSymbol) -> Result<AssetId> {
        self.by_symbol
            .get(symbol)
            .cloned()
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))
    }

    /// Validate raw UI input
    pub fn is_valid_symbol(&self, value: &str) -> bool {
        self.by_symbol.contains_key(&AssetSymbol::new(value))
    }

    /// Validating constructor for symbols
    pub fn symbol(&self, value: &str) -> Result<AssetSymbol> {
        let symbol = AssetSymbol::new(value);
        if self.by_symbol.contains_key(&symbol) {
            Ok(symbol)
        } else {
            Err(FeedError::UnknownSymbol(value.to_string()))
        }
    }

    /// Reverse lookup used to key upstream responses back to symbols
    pub fn symbol_for_id(&self, id: &AssetId) -> Option<&AssetSymbol> {
        self.by_id.get(id)
    }

    /// All configured symbols, sorted
    pub fn symbols(&self) -> impl Iterator<Item = &AssetSymbol> {
        self.by_symbol.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&AssetSymbol, &AssetId)> {
        self.by_symbol.iter()
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        let by_symbol: BTreeMap<AssetSymbol, AssetId> = DEFAULT_ASSETS
            .iter()
            .map(|(symbol, id)| (AssetSymbol::new(symbol), AssetId::new(id)))
            .collect();
        let by_id = by_symbol
            .iter()
            .map(|(symbol, id)| (id.clone(), symbol.clone()))
            .collect();

        Self { by_symbol, by_id }
    }
}
