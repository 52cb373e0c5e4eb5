//! Presentation helpers for UI bindings

use serde::Serialize;

/// Direction of a price move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Up,
    Down,
}

impl ChangeDirection {
    /// Zero counts as `Up`
    pub fn of(change: f64) -> Self {
        if change >= 0.0 {
            ChangeDirection::Up
        } else {
            ChangeDirection::Down
        }
    }
}

/// Relative change in percent, `None` when `old` is zero
pub fn percentage_change(old: f64, new: f64) -> Option<f64> {
    if old == 0.0 {
        return None;
    }
    Some((new - old) / old * 100.0)
}

/// Fixed-point rendering
pub fn format_price(price: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_change() {
        assert_eq!(percentage_change(100.0, 110.0), Some(10.0));
        assert_eq!(percentage_change(200.0, 150.0), Some(-25.0));
        assert_eq!(percentage_change(0.0, 5.0), None);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(123.456, 2), "123.46");
        assert_eq!(format_price(65_000.0, 0), "65000");
        assert_eq!(format_price(0.1, 4), "0.1000");
    }

    #[test]
    fn test_change_direction() {
        assert_eq!(ChangeDirection::of(0.0), ChangeDirection::Up);
        assert_eq!(ChangeDirection::of(1.5), ChangeDirection::Up);
        assert_eq!(ChangeDirection::of(-0.01), ChangeDirection::Down);
    }
}
