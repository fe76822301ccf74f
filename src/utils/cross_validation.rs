//! Time series cross-validation over calendar cutoffs.
//!
//! Cutoffs are placed `period` apart, walking back from `end - horizon`
//! until less than `initial` of history would remain before the cutoff.
//! Each fold fits a fresh model on the data up to its cutoff and scores the
//! forecast of the observations in `(cutoff, cutoff + horizon]`.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::Forecaster;
use crate::utils::metrics::{forecast_metrics, AccuracyMetrics};
use crate::utils::stats::{mean, std_dev};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Cross-validation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CVStrategy {
    /// Rolling window: training covers only the `initial` span before each cutoff.
    Rolling,
    /// Expanding window: training covers all data up to each cutoff.
    #[default]
    Expanding,
}

/// Configuration for cross-validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CVConfig {
    /// Forecast span scored after each cutoff.
    pub horizon: Duration,
    /// Minimum training span before the first cutoff.
    pub initial: Duration,
    /// Spacing between cutoffs.
    pub period: Duration,
    pub strategy: CVStrategy,
}

impl CVConfig {
    /// Expanding-window folds with `initial = 3 * horizon` and `period = horizon / 2`.
    pub fn expanding(horizon: Duration) -> Self {
        Self {
            horizon,
            initial: horizon * 3,
            period: horizon / 2,
            strategy: CVStrategy::Expanding,
        }
    }

    /// Rolling-window folds with the same defaults.
    pub fn rolling(horizon: Duration) -> Self {
        Self {
            strategy: CVStrategy::Rolling,
            ..Self::expanding(horizon)
        }
    }

    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    fn validate(&self) -> Result<()> {
        let zero = Duration::zero();
        if self.horizon <= zero || self.period <= zero || self.initial < zero {
            return Err(ForecastError::InvalidConfig(
                "cross-validation horizon and period must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// One scored fold.
#[derive(Debug, Clone)]
pub struct CVFold {
    pub cutoff: DateTime<Utc>,
    /// Observations used for training.
    pub train_len: usize,
    pub metrics: AccuracyMetrics,
    pub forecast: Forecast,
    pub actual: Vec<f64>,
}

/// Metrics averaged over folds.
#[derive(Debug, Clone)]
pub struct AggregatedMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub smape: f64,
    /// Only when every fold has a MAPE.
    pub mape: Option<f64>,
    pub coverage: Option<f64>,
    pub mae_std: f64,
    pub rmse_std: f64,
}

/// Results of cross-validation.
#[derive(Debug, Clone)]
pub struct CVResults {
    pub n_folds: usize,
    pub aggregated: AggregatedMetrics,
    pub folds: Vec<CVFold>,
}

/// Cutoffs in ascending order.
pub fn cutoffs(config: &CVConfig, series: &TimeSeries) -> Result<Vec<DateTime<Utc>>> {
    config.validate()?;
    let (Some(start), Some(end)) = (series.first_timestamp(), series.last_timestamp()) else {
        return Ok(Vec::new());
    };

    let earliest = start + config.initial;
    let mut cutoff = end - config.horizon;
    let mut out = Vec::new();
    while cutoff >= earliest {
        out.push(cutoff);
        cutoff = cutoff - config.period;
    }
    out.reverse();
    Ok(out)
}

/// Perform cross-validation on a forecaster.
///
/// # Arguments
/// * `config` - Cross-validation configuration
/// * `series` - Time series data
/// * `model_factory` - Function that creates a fresh model instance for each fold
pub fn cross_validate<F, Factory>(
    config: &CVConfig,
    series: &TimeSeries,
    model_factory: Factory,
) -> Result<CVResults>
where
    F: Forecaster,
    Factory: Fn() -> F,
{
    let series = series.sanitized();
    let timestamps = series.timestamps();
    let values = series.values();
    let mut folds = Vec::new();

    for cutoff in cutoffs(config, &series)? {
        let train_end = timestamps.partition_point(|ts| *ts <= cutoff);
        let train_start = match config.strategy {
            CVStrategy::Expanding => 0,
            CVStrategy::Rolling => {
                let window_start = cutoff - config.initial;
                timestamps.partition_point(|ts| *ts <= window_start)
            }
        };
        let test_end = timestamps.partition_point(|ts| *ts <= cutoff + config.horizon);
        if test_end == train_end {
            continue;
        }

        let train = series.slice(train_start, train_end)?;
        let mut model = model_factory();
        model.fit(&train)?;
        let forecast = model.predict(&timestamps[train_end..test_end])?;
        let actual = values[train_end..test_end].to_vec();
        let metrics = forecast_metrics(&forecast, &actual)?;
        debug!(
            %cutoff,
            train_len = train.len(),
            test_len = actual.len(),
            mae = metrics.mae,
            "cross-validation fold"
        );

        folds.push(CVFold {
            cutoff,
            train_len: train.len(),
            metrics,
            forecast,
            actual,
        });
    }

    Ok(CVResults {
        n_folds: folds.len(),
        aggregated: aggregate(&folds),
        folds,
    })
}

fn aggregate(folds: &[CVFold]) -> AggregatedMetrics {
    if folds.is_empty() {
        return AggregatedMetrics {
            mae: f64::NAN,
            rmse: f64::NAN,
            smape: f64::NAN,
            mape: None,
            coverage: None,
            mae_std: f64::NAN,
            rmse_std: f64::NAN,
        };
    }

    let collect = |f: fn(&AccuracyMetrics) -> f64| -> Vec<f64> {
        folds.iter().map(|fold| f(&fold.metrics)).collect()
    };
    let optional = |f: fn(&AccuracyMetrics) -> Option<f64>| -> Option<f64> {
        let values: Option<Vec<f64>> = folds.iter().map(|fold| f(&fold.metrics)).collect();
        values.map(|v| mean(&v))
    };

    let mae_values = collect(|m| m.mae);
    let rmse_values = collect(|m| m.rmse);
    let smape_values = collect(|m| m.smape);

    AggregatedMetrics {
        mae: mean(&mae_values),
        rmse: mean(&rmse_values),
        smape: mean(&smape_values),
        mape: optional(|m| m.mape),
        coverage: optional(|m| m.coverage),
        mae_std: if folds.len() < 2 { 0.0 } else { std_dev(&mae_values) },
        rmse_std: if folds.len() < 2 { 0.0 } else { std_dev(&rmse_values) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ForecastConfig, SeasonalityToggle};
    use crate::core::{ForecastComponents, Frequency};
    use crate::models::DecomposedModel;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    /// Repeats the last training value with a fixed ±1 band.
    #[derive(Default)]
    struct LastValue {
        history: Option<TimeSeries>,
    }

    impl Forecaster for LastValue {
        fn fit(&mut self, series: &TimeSeries) -> Result<()> {
            self.history = Some(series.clone());
            Ok(())
        }

        fn predict(&self, timestamps: &[DateTime<Utc>]) -> Result<Forecast> {
            let history = self.history.as_ref().ok_or(ForecastError::FitRequired)?;
            let last = *history.values().last().ok_or(ForecastError::FitRequired)?;
            let n = timestamps.len();
            let components = ForecastComponents {
                trend: vec![last; n],
                holidays_total: vec![0.0; n],
                additive_terms: vec![0.0; n],
                multiplicative_terms: vec![0.0; n],
                ..Default::default()
            };
            Forecast::new(
                timestamps.to_vec(),
                vec![last; n],
                vec![last - 1.0; n],
                vec![last + 1.0; n],
                0,
                components,
            )
        }

        fn make_future_timestamps(
            &self,
            periods: usize,
            freq: Frequency,
            _include_history: bool,
        ) -> Result<Vec<DateTime<Utc>>> {
            let history = self.history.as_ref().ok_or(ForecastError::FitRequired)?;
            let last = history.last_timestamp().ok_or(ForecastError::FitRequired)?;
            freq.future_timestamps(last, periods)
        }

        fn fitted_values(&self) -> Option<&[f64]> {
            self.history.as_ref().map(|h| h.values())
        }

        fn residuals(&self) -> Option<&[f64]> {
            None
        }

        fn name(&self) -> &str {
            "LastValue"
        }
    }

    fn daily(n: usize, f: impl Fn(usize) -> f64) -> TimeSeries {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..n).map(|i| base + Duration::days(i as i64)).collect();
        TimeSeries::univariate(timestamps, (0..n).map(f).collect()).unwrap()
    }

    #[test]
    fn cutoffs_walk_back_from_the_end() {
        let series = daily(120, |i| i as f64);
        let config = CVConfig::expanding(Duration::days(14))
            .with_initial(Duration::days(60))
            .with_period(Duration::days(7));
        let cuts = cutoffs(&config, &series).unwrap();

        let day = |d: i64| series.timestamps()[0] + Duration::days(d);
        assert_eq!(
            cuts,
            vec![day(63), day(70), day(77), day(84), day(91), day(98), day(105)]
        );
    }

    #[test]
    fn default_config_derives_initial_and_period() {
        let config = CVConfig::expanding(Duration::days(10));
        assert_eq!(config.initial, Duration::days(30));
        assert_eq!(config.period, Duration::days(5));
        assert_eq!(config.strategy, CVStrategy::Expanding);
        assert_eq!(CVConfig::rolling(Duration::days(10)).strategy, CVStrategy::Rolling);
    }

    #[test]
    fn non_positive_horizon_is_rejected() {
        let series = daily(20, |i| i as f64);
        let config = CVConfig::expanding(Duration::zero());
        assert!(matches!(
            cross_validate(&config, &series, LastValue::default),
            Err(ForecastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn expanding_folds_score_each_horizon() {
        let series = daily(30, |i| i as f64);
        let config = CVConfig::expanding(Duration::days(3))
            .with_initial(Duration::days(20))
            .with_period(Duration::days(3));
        let results = cross_validate(&config, &series, LastValue::default).unwrap();

        // Cutoffs at days 20, 23, 26
        assert_eq!(results.n_folds, 3);
        for fold in &results.folds {
            assert_eq!(fold.actual.len(), 3);
            let days = (fold.cutoff - series.timestamps()[0]).num_days();
            assert_eq!(fold.train_len as i64, days + 1);
            // Errors 1, 2, 3 on a unit-slope series
            assert_relative_eq!(fold.metrics.mae, 2.0, epsilon = 1e-10);
            assert_relative_eq!(fold.metrics.coverage.unwrap(), 1.0 / 3.0, epsilon = 1e-10);
        }
        assert_relative_eq!(results.aggregated.mae, 2.0, epsilon = 1e-10);
        assert_relative_eq!(results.aggregated.mae_std, 0.0, epsilon = 1e-10);
        assert!(results.aggregated.rmse >= results.aggregated.mae);
    }

    #[test]
    fn rolling_folds_keep_a_fixed_window() {
        let series = daily(30, |i| i as f64);
        let config = CVConfig::rolling(Duration::days(3))
            .with_initial(Duration::days(20))
            .with_period(Duration::days(3));
        let results = cross_validate(&config, &series, LastValue::default).unwrap();
        assert!(results.folds.iter().all(|f| f.train_len == 20));
    }

    #[test]
    fn short_series_yields_no_folds() {
        let series = daily(5, |i| i as f64);
        let config = CVConfig::expanding(Duration::days(3));
        let results = cross_validate(&config, &series, LastValue::default).unwrap();
        assert_eq!(results.n_folds, 0);
        assert!(results.aggregated.mae.is_nan());
    }

    #[test]
    fn decomposed_model_cross_validates() {
        let weekday = [0.0, 2.0, -1.0, 1.0, 0.0, -3.0, 1.0];
        let series = daily(90, |i| {
            20.0 + 0.5 * i as f64 + weekday[i % 7] + 0.2 * ((i * 5 % 9) as f64 / 9.0 - 0.5)
        });
        let config = CVConfig::expanding(Duration::days(7))
            .with_initial(Duration::days(60))
            .with_period(Duration::days(7));
        let results = cross_validate(&config, &series, || {
            DecomposedModel::new(
                ForecastConfig::default()
                    .with_uncertainty_samples(100)
                    .with_daily_seasonality(SeasonalityToggle::Off),
            )
        })
        .unwrap();

        assert_eq!(results.n_folds, 4);
        assert!(results.aggregated.mae < 2.0, "mae {}", results.aggregated.mae);
        assert!(results.aggregated.coverage.is_some());
    }
}
