//! Upstream JSON payloads and their conversion into snapshots

use super::{PricePoint, PriceSnapshot};
use crate::asset::{AssetId, AssetSymbol};
use serde::{Deserialize, Deserializer};

/// Body of `GET /updates/price/latest`
#[derive(Debug, Deserialize)]
pub(crate) struct LatestPriceResponse {
    #[serde(default)]
    pub parsed: Vec<ParsedPriceUpdate>,
}

/// One element of `parsed`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ParsedPriceUpdate {
    pub id: String,
    pub price: RawPrice,
    pub ema_price: RawPrice,
}

/// Integer mantissa/exponent encoding used by the oracle
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPrice {
    #[serde(deserialize_with = "int_or_string")]
    pub price: i64,
    #[serde(deserialize_with = "int_or_string")]
    pub conf: u64,
    #[serde(deserialize_with = "bounded_exponent")]
    pub expo: i32,
    pub publish_time: i64,
}

/// Largest exponent magnitude a decimal price can carry
const MAX_EXPONENT: i32 = 28;

impl RawPrice {
    fn decode(&self) -> PricePoint {
        PricePoint::from_raw(self.price, self.conf, self.expo, self.publish_time)
    }
}

impl ParsedPriceUpdate {
    pub fn asset_id(&self) -> AssetId {
        AssetId::new(&self.id)
    }

    pub fn into_snapshot(self, symbol: AssetSymbol) -> PriceSnapshot {
        PriceSnapshot::new(symbol, self.price.decode(), self.ema_price.decode())
    }
}

/// A stream line is either one `parsed` element or a full envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StreamLine {
    Single(ParsedPriceUpdate),
    Envelope(LatestPriceResponse),
}

/// Decode one stream line into at most one snapshot for `id`
///
/// Blank, unparseable, or foreign-id lines yield `None`.
pub(crate) fn parse_stream_line(line: &str, id: &AssetId, symbol: &AssetSymbol) -> Option<PriceSnapshot> {
    let line = line.trim();
    let line = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);
    if line.is_empty() || !line.starts_with('{') {
        return None;
    }

    let updates = match serde_json::from_str::<StreamLine>(line) {
        Ok(StreamLine::Envelope(envelope)) => envelope.parsed,
        Ok(StreamLine::Single(update)) => vec![update],
        Err(e) => {
            tracing::debug!(error = %e, symbol = %symbol, "Ignoring unparseable stream line");
            return None;
        }
    };

    updates
        .into_iter()
        .find(|u| u.asset_id() == *id)
        .map(|u| u.into_snapshot(symbol.clone()))
}

fn bounded_exponent<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let expo = i32::deserialize(deserializer)?;
    if expo.unsigned_abs() > MAX_EXPONENT.unsigned_abs() {
        return Err(serde::de::Error::custom(format!("exponent {} out of range", expo)));
    }
    Ok(expo)
}

fn int_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Signed(i64),
        Unsigned(u64),
        Str(String),
    }

    let text = match IntOrString::deserialize(deserializer)? {
        IntOrString::Signed(n) => n.to_string(),
        IntOrString::Unsigned(n) => n.to_string(),
        IntOrString::Str(s) => s.trim().to_string(),
    };
    text.parse::<T>().map_err(serde::de::Error::custom)
}
