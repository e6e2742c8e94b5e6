//! Text report and compact field map

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDateTime, Weekday};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{StatisticsResult, WeekdayRow};

const RULE_WIDTH: usize = 80;

fn default_point_multiplier() -> Decimal {
    Decimal::TEN
}

fn default_point_decimals() -> u32 {
    2
}

/// Presentation settings. None of these affect the statistics themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Factor applied to magnitude sums before display
    #[serde(default = "default_point_multiplier")]
    pub point_multiplier: Decimal,
    #[serde(default = "default_point_decimals")]
    pub point_decimals: u32,
    /// Always show Saturday and Sunday rows
    #[serde(default)]
    pub include_weekends: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            point_multiplier: default_point_multiplier(),
            point_decimals: default_point_decimals(),
            include_weekends: false,
        }
    }
}

impl ReportOptions {
    /// Scale and round a magnitude for display
    pub fn scale(&self, points: Decimal) -> Decimal {
        (points * self.point_multiplier)
            .round_dp_with_strategy(self.point_decimals, RoundingStrategy::MidpointAwayFromZero)
    }
}

// ============================================================
// TEXT REPORT
// ============================================================

/// Human-readable report of one [`StatisticsResult`]
///
/// ```rust
/// use chrono::NaiveDate;
/// use equilibrium::prelude::*;
///
/// let bars = vec![Bar::daily(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), 10.0, 10.5)];
/// let stats = EngineBuilder::new("GOLD").lookback(1).build().unwrap().analyze(&bars).unwrap();
/// let text = Report::new(&stats).to_string();
/// assert!(text.contains("UP Bars: 1 (100.00%)"));
/// assert!(text.contains("Total Scaled Points on UP Bars: 5.00"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    stats: &'a StatisticsResult,
    options: ReportOptions,
}

impl<'a> Report<'a> {
    pub fn new(stats: &'a StatisticsResult) -> Self {
        Self::with_options(stats, ReportOptions::default())
    }

    pub fn with_options(stats: &'a StatisticsResult, options: ReportOptions) -> Self {
        Self { stats, options }
    }

    fn visible_rows(&self) -> impl Iterator<Item = &'a WeekdayRow> {
        let weekends = self.options.include_weekends
            || self
                .stats
                .weekdays
                .iter()
                .any(|row| is_weekend(row.weekday) && row.total > 0);
        self.stats
            .weekdays
            .iter()
            .filter(move |row| weekends || !is_weekend(row.weekday))
    }
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn stamp(ts: Option<NaiveDateTime>) -> String {
    ts.map_or_else(|| "n/a".to_string(), |ts| ts.format("%Y-%m-%d %H:%M").to_string())
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.stats;
        let dp = self.options.point_decimals as usize;
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(f, "{} Direction Analysis Report", s.asset)?;
        writeln!(f, "Mode: {}", s.mode)?;
        if let Some(period) = s.period {
            writeln!(f, "Session: {period}")?;
        }
        writeln!(
            f,
            "Analyzed Period: {} to {}",
            stamp(s.first_timestamp),
            stamp(s.last_timestamp)
        )?;
        writeln!(f, "Regime: {}", s.regime)?;
        if s.skipped_bars > 0 {
            writeln!(f, "Skipped Bars: {}", s.skipped_bars)?;
        }
        if s.provisional {
            writeln!(f, "Provisional: includes a bar that has not closed")?;
        }
        writeln!(f, "{rule}")?;
        writeln!(f)?;

        writeln!(f, "I. Overall Direction Statistics:")?;
        writeln!(f, "  Total Bars Analyzed: {}", s.total)?;
        writeln!(f, "  UP Bars: {} ({:.2}%)", s.up.count, s.up.pct)?;
        writeln!(f, "  DOWN Bars: {} ({:.2}%)", s.down.count, s.down.pct)?;
        writeln!(f, "  NEUTRAL Bars: {} ({:.2}%)", s.neutral.count, s.neutral.pct)?;
        writeln!(f)?;

        writeln!(f, "II. Points Summary (Scaled by {}):", self.options.point_multiplier)?;
        writeln!(
            f,
            "  Total Scaled Points on UP Bars: {:.dp$}",
            self.options.scale(s.up_magnitude)
        )?;
        writeln!(
            f,
            "  Total Scaled Points on DOWN Bars (sum of magnitudes): {:.dp$}",
            self.options.scale(s.down_magnitude)
        )?;
        writeln!(
            f,
            "  Net Scaled Points (UP - DOWN): {:.dp$}",
            self.options.scale(s.net_magnitude)
        )?;
        writeln!(f)?;

        writeln!(f, "III. Longest Consecutive Streaks:")?;
        writeln!(f, "  Longest UP Streak: {} bars", s.longest_streaks.up)?;
        writeln!(f, "  Longest DOWN Streak: {} bars", s.longest_streaks.down)?;
        writeln!(f, "  Longest NEUTRAL Streak: {} bars", s.longest_streaks.neutral)?;
        writeln!(f)?;

        writeln!(f, "IV. Direction Distribution by Day of the Week:")?;
        writeln!(
            f,
            "  {:<10} {:>6} {:>6} {:>8} {:>6} {:>8} {:>8} {:>10}",
            "Day", "UP", "DOWN", "NEUTRAL", "Total", "UP_%", "DOWN_%", "NEUTRAL_%"
        )?;
        for row in self.visible_rows() {
            writeln!(
                f,
                "  {:<10} {:>6} {:>6} {:>8} {:>6} {:>8.2} {:>8.2} {:>10.2}",
                day_name(row.weekday),
                row.up,
                row.down,
                row.neutral,
                row.total,
                row.up_pct,
                row.down_pct,
                row.neutral_pct
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "End of Report")
    }
}

// ============================================================
// FIELD MAP
// ============================================================

/// One value of the compact field map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Count(usize),
    Percent(f64),
    Points(Decimal),
    Flag(bool),
    Text(String),
    Missing,
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::Count(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Percent(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Points(value.normalize())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Missing, Into::into)
    }
}

impl StatisticsResult {
    /// Flat, key-sorted view for dashboards and logs. The weekday table is
    /// left out; serialize the full result when it is needed.
    pub fn to_fields(&self) -> BTreeMap<&'static str, FieldValue> {
        let text = |value: Option<String>| FieldValue::from(value);
        let mut fields = BTreeMap::new();
        fields.insert("asset", FieldValue::Text(self.asset.clone()));
        fields.insert("mode", FieldValue::Text(self.mode.to_string()));
        fields.insert("period", text(self.period.map(|p| p.to_string())));
        fields.insert("first_timestamp", text(self.first_timestamp.map(|t| t.to_string())));
        fields.insert("last_timestamp", text(self.last_timestamp.map(|t| t.to_string())));
        fields.insert("total", self.total.into());
        fields.insert("up_count", self.up.count.into());
        fields.insert("up_pct", self.up.pct.into());
        fields.insert("down_count", self.down.count.into());
        fields.insert("down_pct", self.down.pct.into());
        fields.insert("neutral_count", self.neutral.count.into());
        fields.insert("neutral_pct", self.neutral.pct.into());
        fields.insert("up_magnitude", self.up_magnitude.into());
        fields.insert("down_magnitude", self.down_magnitude.into());
        fields.insert("net_magnitude", self.net_magnitude.into());
        fields.insert("longest_up_streak", self.longest_streaks.up.into());
        fields.insert("longest_down_streak", self.longest_streaks.down.into());
        fields.insert("longest_neutral_streak", self.longest_streaks.neutral.into());
        fields.insert("regime", FieldValue::Text(self.regime.to_string()));
        fields.insert("skipped_bars", self.skipped_bars.into());
        fields.insert("provisional", self.provisional.into());
        fields
    }
}

// ============================================================
// TESTS
// ============================================================
