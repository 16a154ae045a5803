//! Criterion benchmarks for the return pipeline hot paths.
//!
//! Benchmarks:
//! 1. Field resolution (raw records → resolved series)
//! 2. Return matrix construction across cohort sizes
//! 3. Per-horizon statistics

use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ipolab_core::data::{fields, RawDailyRecord};
use ipolab_core::{
    build_return_matrix, horizon_stats, FieldResolver, PricePoint, PriceSeries, SeriesMap,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
}

fn make_records(n: usize) -> Vec<RawDailyRecord> {
    (0..n)
        .map(|i| {
            let close = 20.0 + (i as f64 * 0.1).sin() * 2.0;
            RawDailyRecord::new(base_date() + Days::new(i as u64))
                .with_field(fields::OPEN, close - 0.1)
                .with_field(fields::CLOSE, close)
                .with_field(fields::ADJ_CLOSE, close * 0.99)
        })
        .collect()
}

fn make_cohort(symbols: usize, days: usize) -> SeriesMap {
    (0..symbols)
        .map(|s| {
            // Every seventh symbol is short to exercise ragged rows.
            let len = if s % 7 == 0 { days / 2 } else { days };
            let points = (0..len)
                .map(|i| PricePoint {
                    date: base_date() + Days::new(i as u64),
                    price: 10.0 + s as f64 * 0.01 + (i as f64 * 0.2).cos(),
                })
                .collect();
            (format!("SYM{s:04}"), PriceSeries { points })
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_resolve(c: &mut Criterion) {
    let records = make_records(90);
    let resolver = FieldResolver::default();
    c.bench_function("resolve_90_rows", |b| {
        b.iter(|| resolver.resolve(black_box(&records)))
    });
}

fn bench_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_return_matrix");
    for symbols in [50usize, 500, 2_000] {
        let cohort = make_cohort(symbols, 21);
        group.bench_with_input(BenchmarkId::from_parameter(symbols), &cohort, |b, cohort| {
            b.iter(|| build_return_matrix(black_box(cohort), 20))
        });
    }
    group.finish();
}

fn bench_stats(c: &mut Criterion) {
    let matrix = build_return_matrix(&make_cohort(1_000, 21), 20);
    c.bench_function("horizon_stats_1000x20", |b| {
        b.iter(|| horizon_stats(black_box(&matrix)))
    });
}

criterion_group!(benches, bench_resolve, bench_matrix, bench_stats);
criterion_main!(benches);
