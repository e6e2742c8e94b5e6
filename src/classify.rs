//! Bar direction classification
//!
//! A bar is UP when it closes above its open, DOWN when it closes below, and
//! NEUTRAL on an exact tie. The engine compares normalized decimal prices, so a
//! tie means equality after rounding, never "close enough".

use std::fmt;

use chrono::{Datelike, NaiveDateTime, Weekday};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EquilibriumError, OHLCExt, Result, OHLC};

/// Largest decimal precision accepted for normalized prices
pub const MAX_PRECISION: u32 = 16;

/// Default decimal precision for normalized prices
pub const DEFAULT_PRECISION: u32 = 8;

// ============================================================
// DIRECTION
// ============================================================

/// Direction of a single bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    /// All directions in table-column order
    pub const ALL: [Direction; 3] = [Direction::Up, Direction::Down, Direction::Neutral];

    /// Column index used by the count arrays
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Neutral => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Neutral => "NEUTRAL",
        }
    }

    /// Direction of an open/close pair
    #[inline]
    pub fn of(open: Decimal, close: Decimal) -> Self {
        match close.cmp(&open) {
            std::cmp::Ordering::Greater => Direction::Up,
            std::cmp::Ordering::Less => Direction::Down,
            std::cmp::Ordering::Equal => Direction::Neutral,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a bar from its raw prices.
///
/// Expects finite prices. The engine itself classifies through
/// [`PriceNormalizer`], which rounds before comparing.
#[inline]
pub fn classify<T: OHLC + ?Sized>(bar: &T) -> Direction {
    let (open, close) = (bar.open(), bar.close());
    if close > open {
        Direction::Up
    } else if close < open {
        Direction::Down
    } else {
        Direction::Neutral
    }
}

// ============================================================
// NORMALIZATION
// ============================================================

/// Converts raw `f64` prices into the decimal form every comparison and sum
/// is done in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceNormalizer {
    precision: u32,
    tick_size: Option<Decimal>,
}

impl Default for PriceNormalizer {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            tick_size: None,
        }
    }
}

impl PriceNormalizer {
    /// Round prices to `precision` decimal places
    pub fn new(precision: u32) -> Result<Self> {
        if precision > MAX_PRECISION {
            return Err(EquilibriumError::InvalidConfig(format!(
                "precision {precision} exceeds maximum of {MAX_PRECISION}"
            )));
        }
        Ok(Self {
            precision,
            tick_size: None,
        })
    }

    /// Snap prices to the nearest multiple of `tick_size` before rounding
    pub fn with_tick_size(mut self, tick_size: Decimal) -> Result<Self> {
        if tick_size <= Decimal::ZERO {
            return Err(EquilibriumError::InvalidConfig(format!(
                "tick_size must be positive, got {tick_size}"
            )));
        }
        self.tick_size = Some(tick_size);
        Ok(self)
    }

    #[inline]
    pub fn precision(&self) -> u32 {
        self.precision
    }

    #[inline]
    pub fn tick_size(&self) -> Option<Decimal> {
        self.tick_size
    }

    /// Normalize a single price
    pub fn normalize(&self, value: f64) -> Result<Decimal> {
        let invalid = |reason| EquilibriumError::InvalidBar { index: 0, reason };
        if !value.is_finite() {
            return Err(invalid("price must be finite"));
        }
        let raw = Decimal::from_f64(value).ok_or_else(|| invalid("price outside decimal range"))?;
        let snapped = match self.tick_size {
            Some(tick) => raw
                .checked_div(tick)
                .and_then(|ticks| ticks.round().checked_mul(tick))
                .ok_or_else(|| invalid("price outside decimal range"))?,
            None => raw,
        };
        Ok(snapped.round_dp(self.precision))
    }

    /// Validate, normalize and classify a bar.
    pub fn classify<T: OHLC + ?Sized>(&self, bar: &T) -> Result<ClassifiedBar> {
        bar.validate()?;
        let open = self.normalize(bar.open())?;
        let close = self.normalize(bar.close())?;
        let points = close.checked_sub(open).ok_or(EquilibriumError::InvalidBar {
            index: 0,
            reason: "price outside decimal range",
        })?;
        let timestamp = bar.timestamp();
        Ok(ClassifiedBar {
            timestamp,
            weekday: timestamp.weekday(),
            open,
            close,
            direction: Direction::of(open, close),
            points,
        })
    }
}

// ============================================================
// CLASSIFIED BAR
// ============================================================

/// A bar after normalization and classification
///
/// This is the per-bar record every aggregate is folded from. `points` is the
/// unscaled `close - open` move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassifiedBar {
    pub timestamp: NaiveDateTime,
    pub weekday: Weekday,
    pub open: Decimal,
    pub close: Decimal,
    pub direction: Direction,
    pub points: Decimal,
}

impl ClassifiedBar {
    /// Contribution to the UP magnitude sum
    #[inline]
    pub fn up_magnitude(&self) -> Decimal {
        if self.direction == Direction::Up {
            self.points
        } else {
            Decimal::ZERO
        }
    }

    /// Contribution to the DOWN magnitude sum (absolute value)
    #[inline]
    pub fn down_magnitude(&self) -> Decimal {
        if self.direction == Direction::Down {
            -self.points
        } else {
            Decimal::ZERO
        }
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn bar(open: f64, close: f64) -> Bar {
        // 2024-03-06 is a Wednesday
        Bar::daily(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(), open, close)
    }

    #[test]
    fn test_classify_raw() {
        assert_eq!(classify(&bar(10.0, 12.0)), Direction::Up);
        assert_eq!(classify(&bar(10.0, 8.0)), Direction::Down);
        assert_eq!(classify(&bar(10.0, 10.0)), Direction::Neutral);
    }

    #[test]
    fn test_classify_normalized() {
        let normalizer = PriceNormalizer::default();
        let up = normalizer.classify(&bar(10.0, 12.0)).unwrap();
        assert_eq!(up.direction, Direction::Up);
        assert_eq!(up.points, dec!(2));
        assert_eq!(up.weekday, Weekday::Wed);
        assert_eq!(up.up_magnitude(), dec!(2));
        assert_eq!(up.down_magnitude(), Decimal::ZERO);

        let down = normalizer.classify(&bar(10.0, 8.5)).unwrap();
        assert_eq!(down.direction, Direction::Down);
        assert_eq!(down.down_magnitude(), dec!(1.5));
        assert_eq!(down.up_magnitude(), Decimal::ZERO);
    }

    #[test]
    fn test_tie_after_rounding_is_neutral() {
        let normalizer = PriceNormalizer::new(2).unwrap();
        let classified = normalizer.classify(&bar(10.001, 10.004)).unwrap();
        assert_eq!(classified.direction, Direction::Neutral);
        assert_eq!(classified.points, Decimal::ZERO);
    }

    #[test]
    fn test_tick_size_snapping() {
        let normalizer = PriceNormalizer::new(4).unwrap().with_tick_size(dec!(0.25)).unwrap();
        assert_eq!(normalizer.normalize(100.1).unwrap(), dec!(100.0));
        assert_eq!(normalizer.normalize(100.2).unwrap(), dec!(100.25));

        let classified = normalizer.classify(&bar(100.1, 100.05)).unwrap();
        assert_eq!(classified.direction, Direction::Neutral);
    }

    #[test]
    fn test_invalid_normalizer_config() {
        assert!(PriceNormalizer::new(MAX_PRECISION + 1).is_err());
        assert!(PriceNormalizer::default().with_tick_size(Decimal::ZERO).is_err());
        assert!(PriceNormalizer::default().with_tick_size(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_non_finite_prices_rejected() {
        let normalizer = PriceNormalizer::default();
        assert!(normalizer.classify(&bar(f64::NAN, 1.0)).is_err());
        assert!(normalizer.classify(&bar(1.0, f64::INFINITY)).is_err());
        assert!(normalizer.normalize(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_move_outside_decimal_range_rejected() {
        let normalizer = PriceNormalizer::default();
        let err = normalizer.classify(&bar(-5e28, 5e28)).unwrap_err();
        assert_eq!(
            err,
            EquilibriumError::InvalidBar {
                index: 0,
                reason: "price outside decimal range"
            }
        );
        assert!(normalizer.classify(&bar(5e28, 5e28)).is_ok());
    }

    #[test]
    fn test_direction_order_and_labels() {
        assert_eq!(Direction::ALL.map(Direction::index), [0, 1, 2]);
        assert_eq!(Direction::Neutral.to_string(), "NEUTRAL");
        assert_eq!(Direction::of(dec!(1.10), dec!(1.1)), Direction::Neutral);
    }
}
