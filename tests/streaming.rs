//! Live folding must agree with batch analysis of the same bars.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use equilibrium::prelude::*;
use proptest::prelude::*;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Bars from (gap in hours, move in ticks) pairs. Prices stay on a 0.25 grid.
fn build_bars(steps: &[(i64, i32)]) -> Vec<Bar> {
    let mut t = start();
    let mut price = 1000.0;
    steps
        .iter()
        .map(|&(gap, ticks)| {
            t += Duration::hours(gap);
            let close = price + ticks as f64 * 0.25;
            let bar = Bar::intraday(t, price, close);
            price = close;
            bar
        })
        .collect()
}

fn steps() -> impl Strategy<Value = Vec<(i64, i32)>> {
    proptest::collection::vec((1i64..30, -4i32..=4), 0..120)
}

fn granularity() -> impl Strategy<Value = Granularity> {
    prop_oneof![
        Just(Granularity::Daily),
        Just(Granularity::Weekly),
        Just(Granularity::Monthly),
    ]
}

fn fold_closed(analyzer: &Analyzer, bars: &[Bar]) -> StatisticsResult {
    let mut live = analyzer.live();
    for bar in bars {
        live.update(BarEvent::Close(*bar)).unwrap();
    }
    live.confirmed_statistics()
}

proptest! {
    #[test]
    fn prop_standard_live_matches_batch(steps in steps(), lookback in 1usize..40) {
        let bars = build_bars(&steps);
        let analyzer = EngineBuilder::new("TEST").lookback(lookback).build().unwrap();
        prop_assert_eq!(fold_closed(&analyzer, &bars), analyzer.analyze(&bars).unwrap());
    }

    #[test]
    fn prop_session_live_matches_batch(
        steps in steps(),
        granularity in granularity(),
        min_candles in 0usize..8,
    ) {
        let bars = build_bars(&steps);
        let analyzer = EngineBuilder::new("TEST")
            .session(granularity, min_candles)
            .build()
            .unwrap();
        prop_assert_eq!(fold_closed(&analyzer, &bars), analyzer.analyze(&bars).unwrap());
    }

    /// Every prefix agrees, not only the final state
    #[test]
    fn prop_every_prefix_matches(steps in steps(), lookback in 1usize..10) {
        let bars = build_bars(&steps);
        let analyzer = EngineBuilder::new("TEST").lookback(lookback).build().unwrap();
        let mut live = analyzer.live();
        for (i, bar) in bars.iter().enumerate() {
            let stats = live.update(BarEvent::Close(*bar)).unwrap();
            prop_assert_eq!(stats, analyzer.analyze(&bars[..=i]).unwrap());
        }
    }

    /// Revisions of a forming bar only ever touch the provisional reading
    #[test]
    fn prop_revisions_match_final_close(
        steps in steps(),
        revisions in proptest::collection::vec(-4i32..=4, 1..5),
        lookback in 1usize..20,
    ) {
        let bars = build_bars(&steps);
        let analyzer = EngineBuilder::new("TEST").lookback(lookback).build().unwrap();
        let mut live = analyzer.live();
        for bar in &bars {
            for &ticks in &revisions {
                let forming = Bar::intraday(bar.timestamp, bar.open, bar.open + ticks as f64 * 0.25);
                let reading = live.update(BarEvent::Update(forming)).unwrap();
                prop_assert!(reading.provisional);
            }
            live.update(BarEvent::Close(*bar)).unwrap();
        }
        prop_assert_eq!(live.confirmed_statistics(), analyzer.analyze(&bars).unwrap());
    }

    /// A provisional reading equals a batch run with the forming bar closed
    #[test]
    fn prop_provisional_matches_batch(
        steps in steps(),
        granularity in granularity(),
        lookback in 1usize..20,
        session in any::<bool>(),
    ) {
        let bars = build_bars(&steps);
        let builder = EngineBuilder::new("TEST");
        let analyzer = if session {
            builder.session(granularity, 3)
        } else {
            builder.lookback(lookback)
        }
        .build()
        .unwrap();

        let mut live = analyzer.live();
        for (i, bar) in bars.iter().enumerate() {
            let reading = live.update(BarEvent::Update(*bar)).unwrap();
            prop_assert!(reading.provisional);
            let expected = analyzer.analyze(&bars[..=i]).unwrap();
            prop_assert_eq!(StatisticsResult { provisional: false, ..reading }, expected);
            live.update(BarEvent::Close(*bar)).unwrap();
        }
    }

    #[test]
    fn prop_counts_sum_to_total(steps in steps(), lookback in 1usize..60) {
        let bars = build_bars(&steps);
        let analyzer = EngineBuilder::new("TEST").lookback(lookback).build().unwrap();
        let stats = analyzer.analyze(&bars).unwrap();

        prop_assert_eq!(stats.up.count + stats.down.count + stats.neutral.count, stats.total);
        if stats.total > 0 {
            let pct = stats.up.pct + stats.down.pct + stats.neutral.pct;
            prop_assert!((pct - 100.0).abs() < 1e-9);
        }
        prop_assert_eq!(stats.net_magnitude, stats.up_magnitude - stats.down_magnitude);
    }
}

#[test]
fn test_provisional_then_superseded_update() {
    let analyzer = EngineBuilder::new("TEST").lookback(10).build().unwrap();
    let bars = build_bars(&[(1, 2), (1, -2), (1, 0)]);

    // no Close events at all: each later Update confirms the previous bar
    let mut live = analyzer.live();
    for bar in &bars {
        live.update(BarEvent::Update(*bar)).unwrap();
    }
    let provisional = live.provisional_statistics();
    assert!(provisional.provisional);

    let batch = analyzer.analyze(&bars).unwrap();
    assert_eq!(StatisticsResult { provisional: false, ..provisional }, batch);
    assert_eq!(live.confirmed_statistics(), analyzer.analyze(&bars[..2]).unwrap());
}
