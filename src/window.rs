//! Analysis windows
//!
//! A window is the subsequence of bars the statistics are computed over.
//!
//! - **Standard** keeps the most recent `lookback` bars and is valid once it
//!   holds that many.
//! - **Session** keeps the bars of the current calendar period and is valid
//!   once the period holds `min_candles` bars (at least one). The first bar of
//!   a later period starts an empty window.
//!
//! [`select`] picks the window out of a finished sequence for batch analysis;
//! [`RollingWindow`] maintains it bar by bar for live analysis.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Range;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{ClassifiedBar, EquilibriumError, Lookback, Result};

// ============================================================
// MODES
// ============================================================

/// Calendar unit that bounds a Session window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Trading day
    Daily,
    /// ISO week
    Weekly,
    /// Calendar month
    Monthly,
}

impl Granularity {
    /// Period a timestamp belongs to
    pub fn period_of(self, timestamp: NaiveDateTime) -> PeriodKey {
        let date = timestamp.date();
        match self {
            Granularity::Daily => PeriodKey::Day(date),
            Granularity::Weekly => {
                let week = date.iso_week();
                PeriodKey::Week {
                    year: week.year(),
                    week: week.week(),
                }
            }
            Granularity::Monthly => PeriodKey::Month {
                year: date.year(),
                month: date.month(),
            },
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Granularity::Daily => "Daily",
            Granularity::Weekly => "Weekly",
            Granularity::Monthly => "Monthly",
        })
    }
}

/// Identity of a calendar period. Keys of one granularity are totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PeriodKey {
    Day(NaiveDate),
    Week { year: i32, week: u32 },
    Month { year: i32, month: u32 },
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            PeriodKey::Week { year, week } => write!(f, "{year}-W{week:02}"),
            PeriodKey::Month { year, month } => write!(f, "{year}-{month:02}"),
        }
    }
}

/// How the analysis window is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisMode {
    Standard {
        lookback: Lookback,
    },
    Session {
        granularity: Granularity,
        #[serde(default)]
        min_candles: usize,
    },
}

impl AnalysisMode {
    pub fn standard(lookback: usize) -> Result<Self> {
        Ok(AnalysisMode::Standard {
            lookback: Lookback::new(lookback)?,
        })
    }

    pub fn session(granularity: Granularity, min_candles: usize) -> Self {
        AnalysisMode::Session {
            granularity,
            min_candles,
        }
    }

    /// Bars the window must hold before a diagnosis is issued
    #[inline]
    pub fn required_bars(&self) -> usize {
        match *self {
            AnalysisMode::Standard { lookback } => lookback.get(),
            AnalysisMode::Session { min_candles, .. } => min_candles.max(1),
        }
    }

    #[inline]
    pub fn is_valid(&self, len: usize) -> bool {
        len >= self.required_bars()
    }

    pub fn granularity(&self) -> Option<Granularity> {
        match *self {
            AnalysisMode::Session { granularity, .. } => Some(granularity),
            AnalysisMode::Standard { .. } => None,
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Standard { lookback } => {
                write!(f, "Standard (lookback {} bars)", lookback.get())
            }
            AnalysisMode::Session {
                granularity,
                min_candles,
            } => write!(f, "Session ({granularity}, min {min_candles} candles)"),
        }
    }
}

// ============================================================
// BATCH SELECTION
// ============================================================

/// Window of a finished, ordered sequence.
///
/// Standard takes the last `lookback` bars (all of them when fewer exist).
/// Session takes the trailing run of bars sharing the last bar's period.
pub fn select<'a>(mode: &AnalysisMode, bars: &'a [ClassifiedBar]) -> &'a [ClassifiedBar] {
    match *mode {
        AnalysisMode::Standard { lookback } => &bars[bars.len().saturating_sub(lookback.get())..],
        AnalysisMode::Session { granularity, .. } => {
            let Some(last) = bars.last() else {
                return bars;
            };
            let period = granularity.period_of(last.timestamp);
            let start = bars
                .iter()
                .rposition(|bar| granularity.period_of(bar.timestamp) != period)
                .map_or(0, |i| i + 1);
            &bars[start..]
        }
    }
}

/// Split a finished, ordered sequence into consecutive calendar periods
pub fn sessions(granularity: Granularity, bars: &[ClassifiedBar]) -> Vec<(PeriodKey, &[ClassifiedBar])> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < bars.len() {
        let period = granularity.period_of(bars[start].timestamp);
        let len = bars[start..]
            .iter()
            .position(|bar| granularity.period_of(bar.timestamp) != period)
            .unwrap_or(bars.len() - start);
        out.push((period, &bars[start..start + len]));
        start += len;
    }
    out
}

/// Inclusive calendar date filter; an open end is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(EquilibriumError::InvalidConfig(format!(
                    "start date {s} is after end date {e}"
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    #[inline]
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        let date = timestamp.date();
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    /// Index range of an ordered sequence falling inside the range
    pub fn bounds(&self, bars: &[ClassifiedBar]) -> Range<usize> {
        let from = self
            .start
            .map_or(0, |s| bars.partition_point(|bar| bar.timestamp.date() < s));
        let to = self
            .end
            .map_or(bars.len(), |e| bars.partition_point(|bar| bar.timestamp.date() <= e));
        from..to.max(from)
    }

    /// Sub-slice of an ordered sequence falling inside the range
    pub fn slice<'a>(&self, bars: &'a [ClassifiedBar]) -> &'a [ClassifiedBar] {
        &bars[self.bounds(bars)]
    }

    /// File-safe label such as `20240101_to_End`
    pub fn label(&self) -> String {
        let fmt = |d: Option<NaiveDate>, open: &str| {
            d.map_or_else(|| open.to_string(), |d| d.format("%Y%m%d").to_string())
        };
        format!("{}_to_{}", fmt(self.start, "Start"), fmt(self.end, "End"))
    }
}

// ============================================================
// STREAMING WINDOW
// ============================================================

/// What admitting a bar did to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Bar appended, nothing left
    Appended,
    /// Bar appended and the oldest bar slid out
    Slid(ClassifiedBar),
    /// Bar opened a new period; everything before it left
    Rolled {
        from: Option<PeriodKey>,
        to: PeriodKey,
    },
}

/// Window maintained one confirmed bar at a time
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    mode: AnalysisMode,
    bars: VecDeque<ClassifiedBar>,
    period: Option<PeriodKey>,
}

impl RollingWindow {
    pub fn new(mode: AnalysisMode) -> Self {
        Self {
            mode,
            bars: VecDeque::new(),
            period: None,
        }
    }

    /// Reject a bar whose period precedes the current one
    pub fn check(&self, timestamp: NaiveDateTime) -> Result<()> {
        if let (Some(granularity), Some(current)) = (self.mode.granularity(), self.period) {
            let period = granularity.period_of(timestamp);
            if period < current {
                return Err(EquilibriumError::PeriodRegression {
                    timestamp,
                    period,
                    current,
                });
            }
        }
        Ok(())
    }

    /// What [`admit`](Self::admit) would do with `bar`, without doing it
    pub fn plan(&self, bar: &ClassifiedBar) -> Result<Admission> {
        self.check(bar.timestamp)?;
        match self.mode {
            AnalysisMode::Standard { lookback } => match self.bars.front() {
                Some(old) if self.bars.len() >= lookback.get() => Ok(Admission::Slid(*old)),
                _ => Ok(Admission::Appended),
            },
            AnalysisMode::Session { granularity, .. } => {
                let period = granularity.period_of(bar.timestamp);
                if self.period == Some(period) {
                    Ok(Admission::Appended)
                } else {
                    Ok(Admission::Rolled {
                        from: self.period,
                        to: period,
                    })
                }
            }
        }
    }

    pub fn admit(&mut self, bar: ClassifiedBar) -> Result<Admission> {
        let admission = self.plan(&bar)?;
        match admission {
            Admission::Appended => {}
            Admission::Slid(_) => {
                self.bars.pop_front();
            }
            Admission::Rolled { to, .. } => {
                self.bars.clear();
                self.period = Some(to);
            }
        }
        self.bars.push_back(bar);
        Ok(admission)
    }

    #[inline]
    pub fn mode(&self) -> &AnalysisMode {
        &self.mode
    }

    /// Current Session period, `None` in Standard mode or before any bar
    #[inline]
    pub fn period(&self) -> Option<PeriodKey> {
        self.period
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.mode.is_valid(self.bars.len())
    }

    pub fn first(&self) -> Option<&ClassifiedBar> {
        self.bars.front()
    }

    pub fn last(&self) -> Option<&ClassifiedBar> {
        self.bars.back()
    }

    /// Bar at `index`, oldest first
    pub fn get(&self, index: usize) -> Option<&ClassifiedBar> {
        self.bars.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassifiedBar> {
        self.bars.iter()
    }

    pub fn clear(&mut self) {
        self.bars.clear();
        self.period = None;
    }
}

// ============================================================
// TESTS
// ============================================================
