//! Price feed types

use crate::asset::AssetSymbol;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One oracle price reading
///
/// `price` and `confidence` are decoded as `mantissa * 10^exponent` in `f64`.
/// That is exact up to one rounding for |mantissa| < 2^53 and |exponent| <= 22,
/// which covers display use. Use [`PricePoint::exact_price`] when the value
/// feeds any arithmetic that must not drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Decoded price
    pub price: f64,
    /// Decoded confidence interval half-width
    pub confidence: f64,
    /// Publish time in unix seconds, assigned by the oracle
    pub publish_time: i64,
    /// Raw integer price
    pub price_mantissa: i64,
    /// Raw integer confidence
    pub conf_mantissa: u64,
    /// Base-10 exponent shared by price and confidence
    pub exponent: i32,
}

impl PricePoint {
    pub fn from_raw(price_mantissa: i64, conf_mantissa: u64, exponent: i32, publish_time: i64) -> Self {
        Self {
            price: decode_scaled(price_mantissa as f64, exponent),
            confidence: decode_scaled(conf_mantissa as f64, exponent),
            publish_time,
            price_mantissa,
            conf_mantissa,
            exponent,
        }
    }

    /// Price as an exact decimal, `None` if the exponent is out of decimal range
    pub fn exact_price(&self) -> Option<Decimal> {
        exact_scaled(i128::from(self.price_mantissa), self.exponent)
    }

    pub fn exact_confidence(&self) -> Option<Decimal> {
        exact_scaled(i128::from(self.conf_mantissa), self.exponent)
    }

    /// `(price - confidence, price + confidence)`
    pub fn confidence_interval(&self) -> (f64, f64) {
        (self.price - self.confidence, self.price + self.confidence)
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.publish_time, 0).single()
    }
}

/// Point-in-time reading for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub symbol: AssetSymbol,
    /// Primary aggregate price
    pub price: PricePoint,
    /// Exponential moving average companion
    pub ema_price: PricePoint,
}

impl PriceSnapshot {
    pub fn new(symbol: AssetSymbol, price: PricePoint, ema_price: PricePoint) -> Self {
        Self {
            symbol,
            price,
            ema_price,
        }
    }
}

/// `mantissa * 10^exponent`
///
/// Negative exponents divide by an exact power of ten instead of multiplying by
/// an inexact fraction, so `12345e-2` decodes to the nearest f64 of `123.45`.
pub fn decode_scaled(mantissa: f64, exponent: i32) -> f64 {
    let magnitude = i32::try_from(exponent.unsigned_abs()).unwrap_or(i32::MAX);
    if exponent < 0 {
        mantissa / 10f64.powi(magnitude)
    } else {
        mantissa * 10f64.powi(magnitude)
    }
}

fn exact_scaled(mantissa: i128, exponent: i32) -> Option<Decimal> {
    let magnitude = exponent.unsigned_abs();
    if exponent <= 0 {
        Decimal::try_from_i128_with_scale(mantissa, magnitude).ok()
    } else {
        let factor = 10i128.checked_pow(magnitude)?;
        Decimal::try_from_i128_with_scale(mantissa.checked_mul(factor)?, 0).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_negative_exponent() {
        let point = PricePoint::from_raw(12345, 7, -2, 1_700_000_000);
        assert_eq!(point.price, 123.45);
        assert_eq!(point.confidence, 0.07);
    }

    #[test]
    fn test_decode_positive_exponent() {
        assert_eq!(decode_scaled(42.0, 3), 42_000.0);
        assert_eq!(decode_scaled(42.0, 0), 42.0);
    }

    #[test]
    fn test_decode_typical_btc_price() {
        // BTC/USD is published with expo -8
        let point = PricePoint::from_raw(6_512_345_678_901, 1_234_567, -8, 1_700_000_000);
        assert!((point.price - 65_123.456_789_01).abs() < 1e-8);
        assert!((point.confidence - 0.012_345_67).abs() < 1e-12);
    }

    #[test]
    fn test_exact_price() {
        let point = PricePoint::from_raw(12345, 7, -2, 0);
        assert_eq!(point.exact_price(), Some(dec!(123.45)));
        assert_eq!(point.exact_confidence(), Some(dec!(0.07)));

        let point = PricePoint::from_raw(5, 1, 2, 0);
        assert_eq!(point.exact_price(), Some(dec!(500)));
    }

    #[test]
    fn test_exact_price_out_of_range() {
        let point = PricePoint::from_raw(1, 1, -40, 0);
        assert_eq!(point.exact_price(), None);
    }

    #[test]
    fn test_extreme_exponent_does_not_overflow() {
        let point = PricePoint::from_raw(12345, 1, i32::MIN, 0);
        assert_eq!(point.price, 0.0);
        assert_eq!(point.exact_price(), None);

        let point = PricePoint::from_raw(1, 1, i32::MAX, 0);
        assert!(point.price.is_infinite());
        assert_eq!(point.exact_price(), None);
    }

    #[test]
    fn test_confidence_interval() {
        let point = PricePoint::from_raw(10_000, 50, -2, 0);
        assert_eq!(point.confidence_interval(), (99.5, 100.5));
    }

    #[test]
    fn test_published_at() {
        let point = PricePoint::from_raw(1, 1, 0, 1_704_067_200);
        let ts = point.published_at().unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }
}
