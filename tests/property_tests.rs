//! Property-based tests for the decomposed forecaster.
//!
//! These tests verify invariants that should hold for all valid inputs,
//! using randomly generated time series data.

use anofox_decompose::prelude::*;
use anofox_decompose::regressors::TimeIndex;
use anofox_decompose::utils::stats::{quantile, quantile_sorted};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn timestamps(n: usize, step: Duration) -> Vec<DateTime<Utc>> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..n).map(|i| base + step * i as i32).collect()
}

fn make_ts(values: &[f64]) -> TimeSeries {
    TimeSeries::univariate(timestamps(values.len(), Duration::days(1)), values.to_vec()).unwrap()
}

/// Strategy for generating valid series values with a trend and some noise.
fn valid_values_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| {
        (
            prop::collection::vec(-5.0..5.0_f64, len),
            10.0..500.0_f64,
            -2.0..2.0_f64,
        )
            .prop_map(|(noise, level, slope)| {
                noise
                    .iter()
                    .enumerate()
                    .map(|(i, e)| level + slope * i as f64 + e)
                    .collect()
            })
    })
}

fn fast_config() -> ForecastConfig {
    ForecastConfig::default()
        .with_uncertainty_samples(100)
        .with_changepoint_count(5)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn forecast_length_matches_history_plus_periods(
        values in valid_values_strategy(14, 60),
        periods in 0usize..15
    ) {
        let ts = make_ts(&values);
        let config = fast_config().with_forecast_periods(periods).with_freq(Frequency::Day);
        let forecast = fit_and_forecast(&ts, &config).unwrap();

        prop_assert_eq!(forecast.len(), values.len() + periods);
        prop_assert_eq!(forecast.horizon(), periods);
        prop_assert!(forecast.timestamps().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn bounds_bracket_point_forecast(
        values in valid_values_strategy(14, 60),
        width in 0.5..0.99_f64
    ) {
        let ts = make_ts(&values);
        let config = fast_config()
            .with_forecast_periods(7)
            .with_freq(Frequency::Day)
            .with_interval_width(width);
        let forecast = fit_and_forecast(&ts, &config).unwrap();

        for row in forecast.rows() {
            prop_assert!(row.yhat.is_finite());
            prop_assert!(row.yhat_lower <= row.yhat);
            prop_assert!(row.yhat <= row.yhat_upper);
        }
    }

    #[test]
    fn fitting_is_deterministic(values in valid_values_strategy(14, 40), seed in 0u64..1000) {
        let ts = make_ts(&values);
        let config = fast_config().with_seed(seed).with_forecast_periods(3);

        let mut a = DecomposedModel::new(config.clone());
        let mut b = DecomposedModel::new(config);
        a.fit(&ts).unwrap();
        b.fit(&ts).unwrap();

        prop_assert_eq!(
            a.fitted_model().unwrap().parameters(),
            b.fitted_model().unwrap().parameters()
        );
        prop_assert_eq!(a.forecast_configured().unwrap(), b.forecast_configured().unwrap());
    }

    #[test]
    fn residuals_are_actual_minus_fitted(values in valid_values_strategy(14, 40)) {
        let ts = make_ts(&values);
        let mut model = DecomposedModel::new(fast_config());
        model.fit(&ts).unwrap();

        let fitted = model.fitted_values().unwrap();
        let residuals = model.residuals().unwrap();
        for i in 0..values.len() {
            prop_assert!((values[i] - fitted[i] - residuals[i]).abs() < 1e-9);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn scaled_history_spans_unit_interval(values in valid_values_strategy(2, 100)) {
        let ts = make_ts(&values);
        let index = TimeIndex::fit(&ts, 0.0).unwrap();
        let t = index.scaled_times(ts.timestamps());

        prop_assert!(t[0].abs() < 1e-12);
        prop_assert!((t[t.len() - 1] - 1.0).abs() < 1e-12);
        for y in &values {
            prop_assert!(index.scale_value(*y).abs() <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn future_timestamps_follow_the_calendar(
        periods in 1usize..30,
        offset_days in 0i64..400,
    ) {
        let last =
            Utc.with_ymd_and_hms(2023, 1, 1, 6, 30, 0).unwrap() + Duration::days(offset_days);
        for freq in [Frequency::Day, Frequency::Week, Frequency::Month, Frequency::Year] {
            let future = freq.future_timestamps(last, periods).unwrap();
            prop_assert_eq!(future.len(), periods);
            prop_assert!(future[0] > last);
            prop_assert!(future.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(future.iter().all(|ts| ts.time() == last.time()));
        }
    }

    #[test]
    fn quantiles_are_monotone(
        values in prop::collection::vec(-100.0..100.0_f64, 1..50),
        p in 0.0..1.0_f64,
        q in 0.0..1.0_f64,
    ) {
        let (lo, hi) = if p <= q { (p, q) } else { (q, p) };
        prop_assert!(quantile(&values, lo) <= quantile(&values, hi));

        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        prop_assert_eq!(quantile_sorted(&sorted, 0.0), sorted[0]);
        prop_assert_eq!(quantile_sorted(&sorted, 1.0), sorted[sorted.len() - 1]);
    }
}
