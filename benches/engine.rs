//! Benchmarks for batch and live directional analysis.

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use equilibrium::prelude::*;

/// Hourly bars with deterministic moves
fn generate_bars(n: usize) -> Vec<Bar> {
  let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0;
    let change = (change * 4.0).round() / 4.0;
    bars.push(Bar::intraday(start + Duration::hours(i as i64), price, price + change));
    price += change;
  }

  bars
}

fn bench_batch(c: &mut Criterion) {
  let bars = generate_bars(1000);
  let analyzer = EngineBuilder::new("BENCH").lookback(250).build().unwrap();

  c.bench_function("analyze_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(analyzer.analyze(black_box(&bars)));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let analyzer = EngineBuilder::new("BENCH").lookback(250).build().unwrap();

  let mut group = c.benchmark_group("scaling");

  for size in [100, 1000, 10000].iter() {
    let bars = generate_bars(*size);

    group.bench_with_input(BenchmarkId::new("analyze", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(analyzer.analyze(black_box(&bars)));
      })
    });

    group.bench_with_input(BenchmarkId::new("live_fold", size), size, |b, _| {
      b.iter(|| {
        let mut live = analyzer.live();
        for bar in &bars {
          let _ = black_box(live.update(BarEvent::Close(*bar)));
        }
      })
    });
  }

  group.finish();
}

fn bench_live_update(c: &mut Criterion) {
  let bars = generate_bars(2000);
  let analyzer = EngineBuilder::new("BENCH").lookback(500).build().unwrap();
  let mut live = analyzer.live();
  for bar in &bars[..1999] {
    let _ = live.update(BarEvent::Close(*bar));
  }
  let last = bars[1999];

  c.bench_function("live_provisional_update", |b| {
    b.iter(|| {
      let _ = black_box(live.update(BarEvent::Update(black_box(last))));
    })
  });
}

fn bench_session(c: &mut Criterion) {
  let bars = generate_bars(5000);
  let analyzer = EngineBuilder::new("BENCH").session(Granularity::Weekly, 5).build().unwrap();

  c.bench_function("session_history_5000_bars", |b| {
    b.iter(|| {
      let _ = black_box(analyzer.session_history(black_box(&bars)));
    })
  });
}

fn bench_parallel(c: &mut Criterion) {
  let bars1 = generate_bars(1000);
  let bars2 = generate_bars(1000);
  let bars3 = generate_bars(1000);
  let bars4 = generate_bars(1000);

  let analyzer = EngineBuilder::new("BENCH").lookback(250).build().unwrap();

  let instruments: Vec<(&str, &[Bar])> =
    vec![("SYM1", &bars1), ("SYM2", &bars2), ("SYM3", &bars3), ("SYM4", &bars4)];

  c.bench_function("parallel_analyze_4_instruments", |b| {
    b.iter(|| {
      let _ = black_box(analyze_parallel(black_box(&analyzer), black_box(instruments.clone())));
    })
  });
}

criterion_group!(benches, bench_batch, bench_scaling, bench_live_update, bench_session, bench_parallel,);

criterion_main!(benches);
