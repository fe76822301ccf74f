//! Decomposable trend + seasonality + holiday forecaster.
//!
//! The model is fitted on scaled axes (see [`TimeIndex`]):
//!
//! ```text
//! y(t) = trend(t) * (1 + S_mult(t) + H_mult(t)) + S_add(t) + H_add(t) + ε
//! ```
//!
//! where the trend is piecewise linear (or logistic, or flat) with rate
//! changes at fixed changepoints, `S` is a sum of Fourier seasonalities and
//! `H` a sum of holiday indicators. Parameters are estimated by MAP (or MAP
//! plus a Laplace posterior) and future uncertainty comes from simulating
//! new trend changes.
//!
//! # Example
//!
//! ```
//! use anofox_decompose::prelude::*;
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
//! let timestamps = (0..60).map(|i| base + Duration::days(i)).collect();
//! let values = (0..60).map(|i| 100.0 + i as f64 + (i % 3) as f64).collect();
//! let series = TimeSeries::univariate(timestamps, values).unwrap();
//!
//! let config = ForecastConfig::default().with_uncertainty_samples(100);
//! let mut model = DecomposedModel::new(config);
//! model.fit(&series).unwrap();
//!
//! let forecast = model.forecast(7, Frequency::Day).unwrap();
//! assert_eq!(forecast.len(), 67);
//! assert_eq!(forecast.horizon(), 7);
//! ```

use super::estimator::{Estimator, FitProblem, ModelParameters};
use super::holiday::{check_coverage, holiday_effects, resolve_holidays};
use super::seasonality::{resolve_seasonalities, seasonal_effects};
use super::simulator::{SimulationInput, UncertaintySimulator};
use super::trend::{automatic_changepoints, capacity_values, manual_changepoints, TrendShape};
use crate::config::{ForecastConfig, Growth, SeasonalityMode};
use crate::core::{
    CancellationToken, ComponentSeries, Forecast, ForecastComponents, Frequency, TimeSeries,
};
use crate::error::{ForecastError, Result};
use crate::models::Forecaster;
use crate::regressors::{DesignMatrix, FeatureLayout, TimeIndex};
use crate::utils::optimization::Termination;
use crate::utils::stats::quantile_normal;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Immutable snapshot of a fitted model.
#[derive(Debug, Clone)]
pub struct FittedModel {
    config: ForecastConfig,
    index: TimeIndex,
    shape: TrendShape,
    changepoints: Vec<f64>,
    changepoint_timestamps: Vec<DateTime<Utc>>,
    layout: FeatureLayout,
    params: ModelParameters,
    posterior: Vec<ModelParameters>,
    history: TimeSeries,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    iterations: usize,
    termination: Termination,
}

impl FittedModel {
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn time_index(&self) -> &TimeIndex {
        &self.index
    }

    pub fn trend_shape(&self) -> TrendShape {
        self.shape
    }

    /// Changepoint positions on the scaled time axis.
    pub fn changepoints(&self) -> &[f64] {
        &self.changepoints
    }

    pub fn changepoint_timestamps(&self) -> &[DateTime<Utc>] {
        &self.changepoint_timestamps
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// MAP parameters on the scaled axes.
    pub fn parameters(&self) -> &ModelParameters {
        &self.params
    }

    /// Laplace posterior draws; empty when fitted in MAP mode.
    pub fn posterior(&self) -> &[ModelParameters] {
        &self.posterior
    }

    /// The cleaned history the model was fitted on.
    pub fn history(&self) -> &TimeSeries {
        &self.history
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Holiday coefficients by column name (`"Christmas[-1]"`, ...).
    pub fn holiday_coefficients(&self) -> Vec<(String, f64)> {
        self.layout.columns()[self.layout.n_seasonal()..]
            .iter()
            .zip(&self.params.beta_holiday)
            .map(|(column, beta)| (column.name.clone(), *beta))
            .collect()
    }

    fn predict(
        &self,
        timestamps: &[DateTime<Utc>],
        cancel: Option<&CancellationToken>,
    ) -> Result<Forecast> {
        if timestamps.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ForecastError::TimestampError(
                "prediction timestamps must be strictly increasing".to_string(),
            ));
        }
        check_coverage(self.config.require_holiday_coverage, &self.layout, timestamps)?;

        let t = self.index.scaled_times(timestamps);
        let cap = capacity_values(&self.config.growth, timestamps, &self.index)?;
        let x = self.layout.build(timestamps);
        let beta = self.params.beta();

        let trend = self
            .params
            .trend(self.shape, &self.changepoints)
            .evaluate(&t, &cap);
        let (additive, multiplicative) = x.mode_totals(&beta);
        let mut point: Vec<f64> = (0..t.len())
            .map(|i| {
                self.index
                    .unscale_value(trend[i] * (1.0 + multiplicative[i]) + additive[i])
            })
            .collect();

        let end = self.index.end();
        let in_sample = timestamps.partition_point(|ts| *ts <= end);
        let y_scale = self.index.y_scale();
        let width = self.config.interval_width;

        // In-sample rows: analytic bounds from the noise scale.
        let z = quantile_normal((1.0 + width) / 2.0);
        let half = z * self.params.sigma * y_scale;
        let mut lower: Vec<f64> = point[..in_sample].iter().map(|p| p - half).collect();
        let mut upper: Vec<f64> = point[..in_sample].iter().map(|p| p + half).collect();

        if in_sample < timestamps.len() {
            let future = &timestamps[in_sample..];
            let x_future = self.layout.build(future);
            let parameters = if self.posterior.is_empty() {
                std::slice::from_ref(&self.params)
            } else {
                self.posterior.as_slice()
            };
            let cap_future: &[f64] = if cap.is_empty() { &[] } else { &cap[in_sample..] };
            let input = SimulationInput {
                shape: self.shape,
                t: &t[in_sample..],
                cap: cap_future,
                changepoints: &self.changepoints,
                x: &x_future,
                parameters,
                index: &self.index,
            };
            let simulated =
                UncertaintySimulator::new(self.config.uncertainty_samples, width, self.config.seed)
                    .with_cancellation(cancel.cloned())
                    .simulate(&input)?;
            point.truncate(in_sample);
            point.extend(simulated.point);
            lower.extend(simulated.lower);
            upper.extend(simulated.upper);
        }

        let components = self.components(&trend, &x, &beta, &additive, &multiplicative);

        info!(
            rows = timestamps.len(),
            in_sample,
            horizon = timestamps.len() - in_sample,
            interval_width = width,
            "forecast generated"
        );

        Forecast::new(
            timestamps.to_vec(),
            point,
            lower,
            upper,
            in_sample,
            components,
        )
    }

    /// Component columns in original units.
    fn components(
        &self,
        trend: &[f64],
        x: &DesignMatrix,
        beta: &[f64],
        additive: &[f64],
        multiplicative: &[f64],
    ) -> ForecastComponents {
        let y_scale = self.index.y_scale();
        let to_units = |mode: SeasonalityMode, values: Vec<f64>| -> Vec<f64> {
            match mode {
                SeasonalityMode::Additive => values.into_iter().map(|v| v * y_scale).collect(),
                SeasonalityMode::Multiplicative => values,
            }
        };

        let seasonalities = seasonal_effects(&self.layout, x, beta)
            .into_iter()
            .zip(self.layout.seasonalities())
            .map(|(series, component)| {
                let mode = component.mode.unwrap_or(self.config.seasonality_mode);
                ComponentSeries::new(series.name, to_units(mode, series.values))
            })
            .collect();

        let holidays_mode = self.config.holidays_mode();
        let (holiday_series, holidays_total) = holiday_effects(&self.layout, x, beta);
        let holidays = holiday_series
            .into_iter()
            .map(|series| ComponentSeries::new(series.name, to_units(holidays_mode, series.values)))
            .collect();

        ForecastComponents {
            trend: trend.iter().map(|v| self.index.unscale_value(*v)).collect(),
            seasonalities,
            holidays,
            holidays_total: to_units(holidays_mode, holidays_total),
            additive_terms: additive.iter().map(|v| v * y_scale).collect(),
            multiplicative_terms: multiplicative.to_vec(),
        }
    }
}

/// Forecaster decomposing a series into trend, seasonality and holidays.
#[derive(Debug, Clone)]
pub struct DecomposedModel {
    config: ForecastConfig,
    cancel: Option<CancellationToken>,
    fitted: Option<FittedModel>,
}

impl DecomposedModel {
    /// Create an unfitted model.
    pub fn new(config: ForecastConfig) -> Self {
        Self {
            config,
            cancel: None,
            fitted: None,
        }
    }

    /// Check `token` between optimiser iterations and simulation draws.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// The fitted snapshot, if any.
    pub fn fitted_model(&self) -> Option<&FittedModel> {
        self.fitted.as_ref()
    }

    /// Forecast `config.forecast_periods` steps at `config.freq`, history included.
    pub fn forecast_configured(&self) -> Result<Forecast> {
        self.forecast(self.config.forecast_periods, self.config.freq)
    }

    fn fit_snapshot(&self, series: &TimeSeries) -> Result<FittedModel> {
        let config = &self.config;
        config.validate()?;

        let history = series.sanitized();
        info!(
            observations = series.len(),
            valid = history.len(),
            growth = ?TrendShape::from(&config.growth),
            fit_mode = ?config.fit_mode,
            "fitting decomposed model"
        );

        let floor = match &config.growth {
            Growth::Logistic { floor, .. } => floor.unwrap_or(0.0),
            _ => 0.0,
        };
        let index = TimeIndex::fit(&history, floor)?;
        let shape = TrendShape::from(&config.growth);
        debug!(
            start = %index.start(),
            end = %index.end(),
            y_scale = index.y_scale(),
            "time index"
        );

        let timestamps = history.timestamps();
        let t = index.scaled_times(timestamps);
        let y: Vec<f64> = history.values().iter().map(|v| index.scale_value(*v)).collect();
        let cap = capacity_values(&config.growth, timestamps, &index)?;

        let (changepoints, changepoint_timestamps) = match shape {
            TrendShape::Flat => (Vec::new(), Vec::new()),
            _ if !config.changepoints.is_empty() => {
                let positions = manual_changepoints(&config.changepoints, &index)?;
                let stamps = positions.iter().map(|s| index.timestamp_at(*s)).collect();
                (positions, stamps)
            }
            _ => {
                let positions =
                    automatic_changepoints(&t, config.changepoint_count, config.changepoint_range);
                let stamps = positions
                    .iter()
                    .map(|s| timestamps[t.partition_point(|ti| ti < s)])
                    .collect();
                (positions, stamps)
            }
        };

        let layout = FeatureLayout::new(
            resolve_seasonalities(config, &history)?,
            config.seasonality_mode,
            config.seasonality_prior_scale,
            resolve_holidays(config)?,
            config.holidays_mode(),
            config.holidays_prior_scale,
        );
        check_coverage(config.require_holiday_coverage, &layout, timestamps)?;
        debug!(
            seasonal_columns = layout.n_seasonal(),
            holiday_columns = layout.n_holiday(),
            changepoints = changepoints.len(),
            "feature layout"
        );

        let x = layout.build(timestamps);
        let prior_scales = layout.prior_scales();
        let problem = FitProblem {
            shape,
            t: &t,
            y: &y,
            cap: &cap,
            changepoints: &changepoints,
            x: &x,
            n_seasonal: layout.n_seasonal(),
            prior_scales: &prior_scales,
            changepoint_prior_scale: config.changepoint_prior_scale,
        };
        let estimate = Estimator::new(config.optimizer.clone(), config.fit_mode, config.seed)
            .with_cancellation(self.cancel.clone())
            .estimate(&problem)?;

        let params = estimate.map;
        let trend = params.trend(shape, &changepoints).evaluate(&t, &cap);
        let (additive, multiplicative) = x.mode_totals(&params.beta());
        let fitted: Vec<f64> = (0..t.len())
            .map(|i| index.unscale_value(trend[i] * (1.0 + multiplicative[i]) + additive[i]))
            .collect();
        let residuals = history
            .values()
            .iter()
            .zip(&fitted)
            .map(|(y, f)| y - f)
            .collect();

        info!(
            iterations = estimate.iterations,
            termination = ?estimate.termination,
            objective = estimate.objective,
            sigma = params.sigma * index.y_scale(),
            posterior_draws = estimate.posterior.len(),
            "model fitted"
        );

        Ok(FittedModel {
            config: config.clone(),
            index,
            shape,
            changepoints,
            changepoint_timestamps,
            layout,
            params,
            posterior: estimate.posterior,
            history,
            fitted,
            residuals,
            iterations: estimate.iterations,
            termination: estimate.termination,
        })
    }
}

impl Forecaster for DecomposedModel {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        // A failed fit leaves no partial state behind.
        self.fitted = None;
        self.fitted = Some(self.fit_snapshot(series)?);
        Ok(())
    }

    fn predict(&self, timestamps: &[DateTime<Utc>]) -> Result<Forecast> {
        let fitted = self.fitted.as_ref().ok_or(ForecastError::FitRequired)?;
        fitted.predict(timestamps, self.cancel.as_ref())
    }

    fn make_future_timestamps(
        &self,
        periods: usize,
        freq: Frequency,
        include_history: bool,
    ) -> Result<Vec<DateTime<Utc>>> {
        let fitted = self.fitted.as_ref().ok_or(ForecastError::FitRequired)?;
        let future = freq.future_timestamps(fitted.index.end(), periods)?;
        if !include_history {
            return Ok(future);
        }
        let mut timestamps = fitted.history.timestamps().to_vec();
        timestamps.extend(future);
        Ok(timestamps)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "Decomposed"
    }
}
