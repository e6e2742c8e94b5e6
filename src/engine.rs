//! Analysis orchestrator
//!
//! [`Analyzer`] runs one-shot batch analysis over a finished sequence.
//! [`LiveAnalyzer`] owns an [`EngineState`] and folds bars as they arrive.
//! Both paths share classification, windowing and diagnosis. Aggregation is
//! separate: batch rescans its window, live updates rolling counters. For the
//! same bars and mode the two produce equal results.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::window::{self, Admission, RollingWindow};
use crate::{
    AnalysisMode, ClassifiedBar, DateRange, Diagnosis, Direction, EquilibriumError, Granularity,
    LongestStreaks, PeriodKey, PriceNormalizer, Regime, RegimeBands, Result, RollingStreaks,
    StreakTracker, WeekdayRow, WeekdayTable, OHLC,
};

// ============================================================
// RESULT
// ============================================================

/// Count and percentage of one direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionShare {
    pub count: usize,
    pub pct: f64,
}

/// Statistics of one analysis window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsResult {
    pub asset: String,
    pub mode: AnalysisMode,
    /// Calendar period of the window (Session mode only)
    pub period: Option<PeriodKey>,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    pub total: usize,
    pub up: DirectionShare,
    pub down: DirectionShare,
    pub neutral: DirectionShare,
    /// Sum of close - open over UP bars
    pub up_magnitude: Decimal,
    /// Sum of |close - open| over DOWN bars
    pub down_magnitude: Decimal,
    pub net_magnitude: Decimal,
    pub longest_streaks: LongestStreaks,
    /// Monday first, all seven days
    pub weekdays: Vec<WeekdayRow>,
    pub regime: Regime,
    /// Live bars rejected by validation so far
    pub skipped_bars: usize,
    /// Includes a bar that has not closed yet
    pub provisional: bool,
}

impl StatisticsResult {
    pub fn share(&self, direction: Direction) -> DirectionShare {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Neutral => self.neutral,
        }
    }

    pub fn diagnosis(&self) -> Option<Diagnosis> {
        self.regime.diagnosis()
    }

    fn assemble(
        asset: &str,
        analyzer: &Analyzer,
        agg: Aggregates,
        period: Option<PeriodKey>,
        skipped_bars: usize,
        provisional: bool,
    ) -> Self {
        let counters = agg.counters;
        let total: usize = counters.counts.iter().sum();
        let share = |direction: Direction| {
            let count = counters.counts[direction.index()];
            let pct = if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            };
            DirectionShare { count, pct }
        };
        let up = share(Direction::Up);
        let regime = analyzer
            .bands
            .assess(up.pct, total, analyzer.mode.required_bars());

        Self {
            asset: asset.to_string(),
            mode: analyzer.mode,
            period,
            first_timestamp: agg.first,
            last_timestamp: agg.last,
            total,
            up,
            down: share(Direction::Down),
            neutral: share(Direction::Neutral),
            up_magnitude: counters.up_magnitude,
            down_magnitude: counters.down_magnitude,
            net_magnitude: counters.up_magnitude - counters.down_magnitude,
            longest_streaks: agg.longest,
            weekdays: counters.weekdays.rows(),
            regime,
            skipped_bars,
            provisional,
        }
    }
}

/// Statistics of one calendar period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub period: PeriodKey,
    pub statistics: StatisticsResult,
}

// ============================================================
// AGGREGATION
// ============================================================

/// Order-free counters of a window. Magnitudes are exact decimals, so adding
/// and later removing a bar leaves no residue.
#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    counts: [usize; 3],
    up_magnitude: Decimal,
    down_magnitude: Decimal,
    weekdays: WeekdayTable,
}

impl Counters {
    fn add(&mut self, bar: &ClassifiedBar) -> Result<()> {
        let up = self.up_magnitude.checked_add(bar.up_magnitude());
        let down = self.down_magnitude.checked_add(bar.down_magnitude());
        let (Some(up), Some(down)) = (up, down) else {
            return Err(EquilibriumError::InvalidBar {
                index: 0,
                reason: "magnitude sum outside decimal range",
            });
        };
        self.up_magnitude = up;
        self.down_magnitude = down;
        self.counts[bar.direction.index()] += 1;
        self.weekdays.add(bar.weekday, bar.direction);
        Ok(())
    }

    /// Undo an earlier `add`. The sums only shrink, so nothing can overflow.
    fn remove(&mut self, bar: &ClassifiedBar) -> Result<()> {
        self.weekdays.remove(bar.weekday, bar.direction)?;
        self.counts[bar.direction.index()] -= 1;
        self.up_magnitude -= bar.up_magnitude();
        self.down_magnitude -= bar.down_magnitude();
        Ok(())
    }

    /// Counters once `bar` is admitted as `admission`
    fn after(&self, bar: &ClassifiedBar, admission: &Admission) -> Result<Self> {
        let mut next = match admission {
            Admission::Rolled { .. } => Self::default(),
            Admission::Appended | Admission::Slid(_) => *self,
        };
        // leaving bar first, so the sum never exceeds the final window's
        if let Admission::Slid(old) = admission {
            next.remove(old)?;
        }
        next.add(bar)?;
        Ok(next)
    }
}

#[derive(Debug, Clone, Default)]
struct Aggregates {
    counters: Counters,
    longest: LongestStreaks,
    first: Option<NaiveDateTime>,
    last: Option<NaiveDateTime>,
}

impl Aggregates {
    /// Full rescan of a window starting at `offset` in the caller's sequence
    fn scan(window: &[ClassifiedBar], offset: usize) -> Result<Self> {
        let mut counters = Counters::default();
        let mut streaks = StreakTracker::new();
        for (i, bar) in window.iter().enumerate() {
            counters.add(bar).map_err(|e| e.at_index(offset + i))?;
            streaks.push(bar.direction);
        }
        Ok(Self {
            counters,
            longest: streaks.longest(),
            first: window.first().map(|bar| bar.timestamp),
            last: window.last().map(|bar| bar.timestamp),
        })
    }
}

/// Rolling state of a live window
#[derive(Debug, Clone, Default)]
struct Tally {
    counters: Counters,
    streaks: RollingStreaks,
}

impl Tally {
    fn aggregates(&self, window: &RollingWindow) -> Aggregates {
        Aggregates {
            counters: self.counters,
            longest: self.streaks.longest(),
            first: window.first().map(|bar| bar.timestamp),
            last: window.last().map(|bar| bar.timestamp),
        }
    }

    /// Aggregates the window would have with `bar` folded in. Constant time;
    /// neither the tally nor the window is touched.
    fn preview(
        &self,
        window: &RollingWindow,
        bar: &ClassifiedBar,
    ) -> Result<(Aggregates, Admission)> {
        let admission = window.plan(bar)?;
        let counters = self.counters.after(bar, &admission)?;
        let (longest, first) = match admission {
            Admission::Appended => (self.streaks.longest_after(bar.direction, false), window.first()),
            Admission::Slid(_) => (self.streaks.longest_after(bar.direction, true), window.get(1)),
            Admission::Rolled { .. } => (RollingStreaks::new().longest_after(bar.direction, false), None),
        };
        let aggregates = Aggregates {
            counters,
            longest,
            first: Some(first.map_or(bar.timestamp, |first| first.timestamp)),
            last: Some(bar.timestamp),
        };
        Ok((aggregates, admission))
    }
}

fn check_order(index: usize, timestamp: NaiveDateTime, previous: NaiveDateTime) -> Result<()> {
    if timestamp == previous {
        return Err(EquilibriumError::DuplicateTimestamp { index, timestamp });
    }
    if timestamp < previous {
        return Err(EquilibriumError::OutOfOrder {
            index,
            timestamp,
            previous,
        });
    }
    Ok(())
}

// ============================================================
// BATCH ANALYZER
// ============================================================

/// Validated analysis configuration for one asset and mode
#[derive(Debug, Clone, PartialEq)]
pub struct Analyzer {
    asset: String,
    mode: AnalysisMode,
    bands: RegimeBands,
    normalizer: PriceNormalizer,
}

impl Analyzer {
    #[inline]
    pub fn asset(&self) -> &str {
        &self.asset
    }

    #[inline]
    pub fn mode(&self) -> &AnalysisMode {
        &self.mode
    }

    #[inline]
    pub fn bands(&self) -> &RegimeBands {
        &self.bands
    }

    #[inline]
    pub fn normalizer(&self) -> &PriceNormalizer {
        &self.normalizer
    }

    /// Validate and classify every bar, in order.
    ///
    /// Fails on the first non-finite price, duplicate or out-of-order
    /// timestamp. The error carries the offending index.
    pub fn classify_series<T: OHLC>(&self, bars: &[T]) -> Result<Vec<ClassifiedBar>> {
        let mut out: Vec<ClassifiedBar> = Vec::with_capacity(bars.len());
        for (index, bar) in bars.iter().enumerate() {
            let classified = self
                .normalizer
                .classify(bar)
                .map_err(|e| e.at_index(index))?;
            if let Some(previous) = out.last() {
                check_order(index, classified.timestamp, previous.timestamp)?;
            }
            out.push(classified);
        }
        Ok(out)
    }

    /// Statistics of the current window of `bars`
    pub fn analyze<T: OHLC>(&self, bars: &[T]) -> Result<StatisticsResult> {
        self.analyze_named(&self.asset, bars)
    }

    /// Statistics of the current window of the bars inside `range`.
    /// The whole sequence is validated, not just the selected part.
    pub fn analyze_between<T: OHLC>(&self, bars: &[T], range: &DateRange) -> Result<StatisticsResult> {
        let classified = self.classify_series(bars)?;
        let bounds = range.bounds(&classified);
        self.summarize(&self.asset, &classified[bounds.clone()], bounds.start)
    }

    pub(crate) fn analyze_named<T: OHLC>(&self, asset: &str, bars: &[T]) -> Result<StatisticsResult> {
        let classified = self.classify_series(bars)?;
        self.summarize(asset, &classified, 0)
    }

    /// `classified` starts at `offset` in the caller's sequence
    fn summarize(
        &self,
        asset: &str,
        classified: &[ClassifiedBar],
        offset: usize,
    ) -> Result<StatisticsResult> {
        let window = window::select(&self.mode, classified);
        let period = self
            .mode
            .granularity()
            .zip(window.last())
            .map(|(granularity, bar)| granularity.period_of(bar.timestamp));
        let start = offset + classified.len() - window.len();
        let aggregates = Aggregates::scan(window, start)?;
        Ok(StatisticsResult::assemble(asset, self, aggregates, period, 0, false))
    }

    /// One result per calendar period of `bars`, oldest first.
    ///
    /// Requires Session mode; each period is analyzed on its own, with the
    /// `min_candles` gate applied per period.
    pub fn session_history<T: OHLC>(&self, bars: &[T]) -> Result<Vec<SessionSummary>> {
        let Some(granularity) = self.mode.granularity() else {
            return Err(EquilibriumError::InvalidConfig(
                "session history requires Session mode".into(),
            ));
        };
        let classified = self.classify_series(bars)?;
        let mut offset = 0;
        let mut history = Vec::new();
        for (period, bars) in window::sessions(granularity, &classified) {
            let aggregates = Aggregates::scan(bars, offset)?;
            offset += bars.len();
            history.push(SessionSummary {
                period,
                statistics: StatisticsResult::assemble(
                    &self.asset,
                    self,
                    aggregates,
                    Some(period),
                    0,
                    false,
                ),
            });
        }
        Ok(history)
    }

    /// Fresh live analyzer with this configuration
    pub fn live(&self) -> LiveAnalyzer {
        LiveAnalyzer::new(self.clone())
    }
}

// ============================================================
// BUILDER
// ============================================================

#[derive(Debug, Clone)]
enum ModeChoice {
    Standard { lookback: usize },
    Session { granularity: Granularity, min_candles: usize },
    Fixed(AnalysisMode),
}

#[derive(Debug, Clone)]
enum BandChoice {
    Table(RegimeBands),
    Symmetric { equilibrium: f64, moderate: f64 },
}

/// Builder for creating [`Analyzer`] instances
///
/// Nothing is validated until [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    asset: String,
    mode: Option<ModeChoice>,
    bands: BandChoice,
    precision: u32,
    tick_size: Option<Decimal>,
}

impl EngineBuilder {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            mode: None,
            bands: BandChoice::Table(RegimeBands::default()),
            precision: crate::classify::DEFAULT_PRECISION,
            tick_size: None,
        }
    }

    /// Standard mode over the most recent `lookback` bars
    pub fn lookback(mut self, lookback: usize) -> Self {
        self.mode = Some(ModeChoice::Standard { lookback });
        self
    }

    /// Session mode bounded by `granularity`
    pub fn session(mut self, granularity: Granularity, min_candles: usize) -> Self {
        self.mode = Some(ModeChoice::Session {
            granularity,
            min_candles,
        });
        self
    }

    pub fn mode(mut self, mode: AnalysisMode) -> Self {
        self.mode = Some(ModeChoice::Fixed(mode));
        self
    }

    pub fn bands(mut self, bands: RegimeBands) -> Self {
        self.bands = BandChoice::Table(bands);
        self
    }

    /// Five symmetric bands, see [`RegimeBands::symmetric`]
    pub fn symmetric_bands(mut self, equilibrium: f64, moderate: f64) -> Self {
        self.bands = BandChoice::Symmetric {
            equilibrium,
            moderate,
        };
        self
    }

    /// Decimal places prices are rounded to before comparison
    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn tick_size(mut self, tick_size: Decimal) -> Self {
        self.tick_size = Some(tick_size);
        self
    }

    /// Build the analyzer
    pub fn build(self) -> Result<Analyzer> {
        if self.asset.trim().is_empty() {
            return Err(EquilibriumError::InvalidConfig("asset identifier is empty".into()));
        }
        let mode = match self.mode {
            None => {
                return Err(EquilibriumError::InvalidConfig(
                    "analysis mode not set; call lookback() or session()".into(),
                ))
            }
            Some(ModeChoice::Standard { lookback }) => AnalysisMode::standard(lookback)?,
            Some(ModeChoice::Session {
                granularity,
                min_candles,
            }) => AnalysisMode::session(granularity, min_candles),
            Some(ModeChoice::Fixed(mode)) => mode,
        };
        let bands = match self.bands {
            BandChoice::Table(bands) => bands,
            BandChoice::Symmetric {
                equilibrium,
                moderate,
            } => RegimeBands::symmetric(equilibrium, moderate)?,
        };
        let mut normalizer = PriceNormalizer::new(self.precision)?;
        if let Some(tick_size) = self.tick_size {
            normalizer = normalizer.with_tick_size(tick_size)?;
        }

        debug!(asset = %self.asset, %mode, precision = self.precision, "analyzer built");
        Ok(Analyzer {
            asset: self.asset,
            mode,
            bands,
            normalizer,
        })
    }
}

// ============================================================
// LIVE ANALYZER
// ============================================================

/// Event from a live feed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BarEvent<T> {
    /// The bar is still forming; its close may change again
    Update(T),
    /// The bar is final
    Close(T),
}

impl<T> BarEvent<T> {
    pub fn bar(&self) -> &T {
        match self {
            BarEvent::Update(bar) | BarEvent::Close(bar) => bar,
        }
    }

    #[inline]
    pub fn is_close(&self) -> bool {
        matches!(self, BarEvent::Close(_))
    }
}

/// Mutable state of one live analysis: the confirmed window, its rolling
/// aggregates, and the bar still forming.
#[derive(Debug, Clone)]
pub struct EngineState {
    window: RollingWindow,
    tally: Tally,
    pending: Option<ClassifiedBar>,
    last_confirmed: Option<NaiveDateTime>,
    received: usize,
    skipped: usize,
}

impl EngineState {
    pub fn new(mode: AnalysisMode) -> Self {
        Self {
            window: RollingWindow::new(mode),
            tally: Tally::default(),
            pending: None,
            last_confirmed: None,
            received: 0,
            skipped: 0,
        }
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn pending(&self) -> Option<&ClassifiedBar> {
        self.pending.as_ref()
    }

    pub fn last_confirmed(&self) -> Option<NaiveDateTime> {
        self.last_confirmed
    }

    /// Events received, accepted or not
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Fold a closed bar into the window, exactly once. Nothing changes
    /// unless the bar is accepted.
    fn confirm(&mut self, bar: ClassifiedBar) -> Result<Admission> {
        let admission = self.window.plan(&bar)?;
        let counters = self.tally.counters.after(&bar, &admission)?;
        self.window.admit(bar)?;
        match admission {
            Admission::Appended => {
                self.tally.counters = counters;
                self.tally.streaks.push_back(bar.direction);
            }
            Admission::Slid(_) => {
                self.tally.counters = counters;
                self.tally.streaks.push_back(bar.direction);
                self.tally.streaks.pop_front();
            }
            Admission::Rolled { .. } => {
                let mut streaks = RollingStreaks::new();
                streaks.push_back(bar.direction);
                self.tally = Tally { counters, streaks };
            }
        }
        self.last_confirmed = Some(bar.timestamp);
        Ok(admission)
    }

    /// Aggregates and period with `bar` folded in, leaving the state as is
    fn preview(&self, bar: &ClassifiedBar) -> Result<(Aggregates, Option<PeriodKey>)> {
        let (aggregates, admission) = self.tally.preview(&self.window, bar)?;
        let period = match admission {
            Admission::Rolled { to, .. } => Some(to),
            Admission::Appended | Admission::Slid(_) => self.window.period(),
        };
        Ok((aggregates, period))
    }
}

/// Incremental analysis of one asset's live bars
///
/// Events must arrive in timestamp order. A rejected event leaves every
/// aggregate untouched and is counted in `skipped_bars`.
#[derive(Debug, Clone)]
pub struct LiveAnalyzer {
    analyzer: Analyzer,
    state: EngineState,
}

impl LiveAnalyzer {
    pub fn new(analyzer: Analyzer) -> Self {
        let state = EngineState::new(analyzer.mode);
        Self { analyzer, state }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn skipped_bars(&self) -> usize {
        self.state.skipped
    }

    /// Drop all state, keeping the configuration
    pub fn reset(&mut self) {
        self.state = EngineState::new(self.analyzer.mode);
    }

    /// Apply one feed event and return the latest reading.
    ///
    /// The reading is provisional while a bar is still forming. An `Update`
    /// for a later timestamp than the forming bar confirms the forming bar
    /// with its last revision first.
    pub fn update<T: OHLC>(&mut self, event: BarEvent<T>) -> Result<StatisticsResult> {
        let index = self.state.received;
        self.state.received += 1;

        match self.apply(&event) {
            Ok(()) => Ok(self.provisional_statistics()),
            Err(error) => {
                let error = error.at_index(index);
                self.state.skipped += 1;
                warn!(
                    asset = %self.analyzer.asset,
                    index,
                    skipped = self.state.skipped,
                    %error,
                    "bar skipped"
                );
                Err(error)
            }
        }
    }

    fn apply<T: OHLC>(&mut self, event: &BarEvent<T>) -> Result<()> {
        let bar = self.analyzer.normalizer.classify(event.bar())?;
        if let Some(previous) = self.state.last_confirmed {
            check_order(0, bar.timestamp, previous)?;
        }
        self.state.window.check(bar.timestamp)?;

        let superseded = match self.state.pending {
            Some(pending) if bar.timestamp < pending.timestamp => {
                return Err(EquilibriumError::OutOfOrder {
                    index: 0,
                    timestamp: bar.timestamp,
                    previous: pending.timestamp,
                })
            }
            Some(pending) if bar.timestamp > pending.timestamp => Some(pending),
            _ => None,
        };

        if let Some(pending) = superseded {
            debug!(
                asset = %self.analyzer.asset,
                timestamp = %pending.timestamp,
                "confirming forming bar superseded without a close"
            );
            self.state.pending = None;
            self.confirm(pending)?;
        }

        if event.is_close() {
            self.confirm(bar)?;
            self.state.pending = None;
            Ok(())
        } else {
            self.state.preview(&bar)?;
            self.state.pending = Some(bar);
            Ok(())
        }
    }

    fn confirm(&mut self, bar: ClassifiedBar) -> Result<()> {
        if let Admission::Rolled { from, to } = self.state.confirm(bar)? {
            debug!(asset = %self.analyzer.asset, ?from, %to, "session rolled over");
        }
        Ok(())
    }

    /// Statistics of closed bars only
    pub fn confirmed_statistics(&self) -> StatisticsResult {
        let aggregates = self.state.tally.aggregates(&self.state.window);
        self.assemble(aggregates, self.state.window.period(), false)
    }

    /// Statistics including the forming bar, if any.
    ///
    /// The forming bar is folded into a preview of the rolling counters, so
    /// repeated calls never count it twice and nothing is copied per call.
    pub fn provisional_statistics(&self) -> StatisticsResult {
        let Some(pending) = self.state.pending else {
            return self.confirmed_statistics();
        };
        // the forming bar was previewed when it arrived and the confirmed
        // state has not changed since
        match self.state.preview(&pending) {
            Ok((aggregates, period)) => self.assemble(aggregates, period, true),
            Err(_) => self.confirmed_statistics(),
        }
    }

    fn assemble(
        &self,
        aggregates: Aggregates,
        period: Option<PeriodKey>,
        provisional: bool,
    ) -> StatisticsResult {
        StatisticsResult::assemble(
            &self.analyzer.asset,
            &self.analyzer,
            aggregates,
            period,
            self.state.skipped,
            provisional,
        )
    }
}

// ============================================================
// TESTS
// ============================================================
