//! # Equilibrium - directional frequency analysis for price series
//!
//! Classifies every bar of an instrument as UP, DOWN or NEUTRAL and summarizes
//! how often each direction occurs, how large the moves were, how long the
//! longest runs lasted, how directions spread across weekdays, and whether the
//! UP frequency sits near a 50/50 equilibrium.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use equilibrium::prelude::*;
//!
//! let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
//! let bars = vec![
//!     Bar::daily(day(4), 100.0, 101.5),
//!     Bar::daily(day(5), 101.5, 100.9),
//!     Bar::daily(day(6), 100.9, 100.9),
//! ];
//!
//! let analyzer = EngineBuilder::new("GOLD")
//!     .lookback(3)
//!     .build()
//!     .unwrap();
//!
//! let stats = analyzer.analyze(&bars).unwrap();
//! assert_eq!(stats.total, 3);
//! assert_eq!(stats.up.count, 1);
//! println!("{}", Report::new(&stats));
//! ```
//!
//! ## Live bars
//!
//! [`LiveAnalyzer`] keeps rolling state and accepts [`BarEvent::Update`] for a
//! bar that is still forming and [`BarEvent::Close`] once it is final. A closed
//! bar is folded exactly once; updates only ever affect provisional readings.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

pub mod classify;
pub mod config;
pub mod engine;
pub mod regime;
pub mod report;
pub mod streak;
pub mod weekday;
pub mod window;

pub use classify::{classify, ClassifiedBar, Direction, PriceNormalizer};
pub use config::AnalysisConfig;
pub use engine::{
    Analyzer, BarEvent, DirectionShare, EngineBuilder, EngineState, LiveAnalyzer, SessionSummary,
    StatisticsResult,
};
pub use regime::{Band, Diagnosis, Edge, Regime, RegimeBands};
pub use report::{FieldValue, Report, ReportOptions};
pub use streak::{LongestStreaks, RollingStreaks, StreakTracker};
pub use weekday::{WeekdayRow, WeekdayTable};
pub use window::{AnalysisMode, DateRange, Granularity, PeriodKey};

pub mod prelude {
    pub use crate::{
        // Parallel
        analyze_parallel,
        // Engine
        Analyzer,
        AnalysisConfig,
        AnalysisMode,
        AssetFailure,
        AssetStatistics,
        // Types
        Bar,
        BarEvent,
        ClassifiedBar,
        DateRange,
        Diagnosis,
        Direction,
        EngineBuilder,
        // Errors
        EquilibriumError,
        Granularity,
        LiveAnalyzer,
        Lookback,
        OHLCExt,
        PeriodKey,
        Regime,
        RegimeBands,
        Report,
        ReportOptions,
        Result,
        StatisticsResult,
        // Core traits
        OHLC,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, EquilibriumError>;

/// Errors raised while validating configuration or input bars.
///
/// Every variant is a validation failure. Nothing is repaired silently: a
/// corrected bar would skew the frequencies this crate exists to measure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EquilibriumError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid regime bands: {0}")]
    InvalidBands(String),

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Bar at index {index} is out of order: {timestamp} precedes {previous}")]
    OutOfOrder {
        index: usize,
        timestamp: NaiveDateTime,
        previous: NaiveDateTime,
    },

    #[error("Duplicate timestamp {timestamp} at index {index}")]
    DuplicateTimestamp {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("Bar at {timestamp} falls in period {period}, before the current period {current}")]
    PeriodRegression {
        timestamp: NaiveDateTime,
        period: PeriodKey,
        current: PeriodKey,
    },
}

impl EquilibriumError {
    /// True for errors caused by bar ordering rather than bar content.
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Self::OutOfOrder { .. } | Self::DuplicateTimestamp { .. } | Self::PeriodRegression { .. }
        )
    }

    /// Re-tag a per-bar error with its position in the caller's sequence.
    pub(crate) fn at_index(self, index: usize) -> Self {
        match self {
            Self::InvalidBar { reason, .. } => Self::InvalidBar { index, reason },
            Self::OutOfOrder {
                timestamp,
                previous,
                ..
            } => Self::OutOfOrder {
                index,
                timestamp,
                previous,
            },
            Self::DuplicateTimestamp { timestamp, .. } => Self::DuplicateTimestamp { index, timestamp },
            other => other,
        }
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Number of bars in a Standard window (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lookback(usize);

impl Lookback {
    /// Create a new Lookback, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(EquilibriumError::InvalidValue("Lookback must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Lookback {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Lookback {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Lookback::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLC TRAITS
// ============================================================

/// Core bar data trait
///
/// `high` and `low` are part of the input contract but never influence the
/// direction of a bar, so implementors without them may return `None`.
pub trait OHLC {
    fn timestamp(&self) -> NaiveDateTime;
    fn open(&self) -> f64;
    fn close(&self) -> f64;

    fn high(&self) -> Option<f64> {
        None
    }

    fn low(&self) -> Option<f64> {
        None
    }
}

impl<T: OHLC + ?Sized> OHLC for &T {
    fn timestamp(&self) -> NaiveDateTime {
        (**self).timestamp()
    }

    fn open(&self) -> f64 {
        (**self).open()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn high(&self) -> Option<f64> {
        (**self).high()
    }

    fn low(&self) -> Option<f64> {
        (**self).low()
    }
}

/// Extension trait with computed properties for bar data
pub trait OHLCExt: OHLC {
    /// Raw close - open move
    #[inline]
    fn points(&self) -> f64 {
        self.close() - self.open()
    }

    /// Validate that every present price is finite
    fn validate(&self) -> Result<()> {
        if !self.open().is_finite() || !self.close().is_finite() {
            return Err(EquilibriumError::InvalidBar {
                index: 0,
                reason: "open/close must be finite",
            });
        }
        let shadow_ok = |v: Option<f64>| v.map_or(true, f64::is_finite);
        if !shadow_ok(self.high()) || !shadow_ok(self.low()) {
            return Err(EquilibriumError::InvalidBar {
                index: 0,
                reason: "high/low must be finite when present",
            });
        }
        Ok(())
    }
}

impl<T: OHLC + ?Sized> OHLCExt for T {}

/// Plain bar record
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    pub close: f64,
}

impl Bar {
    pub fn new(timestamp: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high: Some(high),
            low: Some(low),
            close,
        }
    }

    /// Open/close-only bar for a calendar day, stamped at midnight
    pub fn daily(date: NaiveDate, open: f64, close: f64) -> Self {
        Self {
            timestamp: date.and_time(NaiveTime::MIN),
            open,
            high: None,
            low: None,
            close,
        }
    }

    /// Open/close-only intraday bar
    pub fn intraday(timestamp: NaiveDateTime, open: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high: None,
            low: None,
            close,
        }
    }
}

impl OHLC for Bar {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn high(&self) -> Option<f64> {
        self.high
    }

    fn low(&self) -> Option<f64> {
        self.low
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

use rayon::prelude::*;

/// Statistics for a single instrument
#[derive(Debug, Clone)]
pub struct AssetStatistics {
    pub asset: String,
    pub statistics: StatisticsResult,
}

/// Error from analyzing a single instrument
#[derive(Debug, Clone)]
pub struct AssetFailure {
    pub asset: String,
    pub error: EquilibriumError,
}

/// Analyze several instruments on the rayon pool.
///
/// Each run owns its input slice and its own aggregates; the analyzer is only
/// read. The analyzer's asset name is replaced by each instrument's symbol.
pub fn analyze_parallel<'a, T, I>(
    analyzer: &Analyzer,
    instruments: I,
) -> (Vec<AssetStatistics>, Vec<AssetFailure>)
where
    T: OHLC + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(asset, bars)| {
            analyzer
                .analyze_named(asset, bars)
                .map(|statistics| AssetStatistics {
                    asset: asset.to_string(),
                    statistics,
                })
                .map_err(|error| AssetFailure {
                    asset: asset.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut failures = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => failures.push(e),
        }
    }

    (successes, failures)
}

// ============================================================
// TESTS
// ============================================================
