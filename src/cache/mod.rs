//! Price cache module
//!
//! Short-lived store of the most recent snapshot per symbol

mod price_cache;

pub use price_cache::{CacheEntry, PriceCache, DEFAULT_TTL};
