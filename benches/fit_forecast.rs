//! Benchmarks for fitting and forecasting the decomposed model.

use anofox_decompose::prelude::*;
use anofox_decompose::regressors::{FeatureLayout, HolidayCalendar};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn timestamps(n: usize) -> Vec<DateTime<Utc>> {
    let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    (0..n).map(|i| base + Duration::days(i as i64)).collect()
}

fn generate_series(n: usize) -> TimeSeries {
    let values = (0..n)
        .map(|i| {
            let t = i as f64;
            100.0
                + 0.2 * t
                + 5.0 * (2.0 * std::f64::consts::PI * t / 7.0).sin()
                + 10.0 * (2.0 * std::f64::consts::PI * t / 365.25).cos()
                + ((i * 37) % 11) as f64 * 0.1
        })
        .collect();
    TimeSeries::univariate(timestamps(n), values).unwrap()
}

fn holidays() -> Vec<HolidayEvent> {
    (2020..=2025)
        .map(|year| {
            HolidayEvent::new("Christmas", NaiveDate::from_ymd_opt(year, 12, 25).unwrap())
                .with_window(-1, 1)
        })
        .collect()
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    for size in [90, 365, 730].iter() {
        let series = generate_series(*size);
        let config = ForecastConfig::default().with_holidays(holidays());

        group.bench_with_input(BenchmarkId::new("map", size), size, |b, _| {
            b.iter(|| {
                let mut model = DecomposedModel::new(config.clone());
                model.fit(black_box(&series)).unwrap();
                model
            })
        });
    }

    group.finish();
}

fn bench_forecast(c: &mut Criterion) {
    let mut group = c.benchmark_group("forecast");
    group.sample_size(10);

    let series = generate_series(365);
    for samples in [100, 1000].iter() {
        let config = ForecastConfig::default()
            .with_holidays(holidays())
            .with_uncertainty_samples(*samples);
        let mut model = DecomposedModel::new(config);
        model.fit(&series).unwrap();

        group.bench_with_input(BenchmarkId::new("simulate_90d", samples), samples, |b, _| {
            b.iter(|| model.forecast(black_box(90), Frequency::Day).unwrap())
        });
    }

    group.finish();
}

fn bench_design_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("design_matrix");

    for size in [365, 3650].iter() {
        let series = generate_series(*size);
        let layout = FeatureLayout::new(
            vec![
                SeasonalComponent::new("weekly", 7.0, 3),
                SeasonalComponent::new("yearly", 365.25, 10),
            ],
            SeasonalityMode::Additive,
            10.0,
            HolidayCalendar::from_events(&holidays()).unwrap(),
            SeasonalityMode::Additive,
            10.0,
        );

        group.bench_with_input(BenchmarkId::new("build", size), size, |b, _| {
            b.iter(|| layout.build(black_box(series.timestamps())))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_forecast, bench_design_matrix);
criterion_main!(benches);
