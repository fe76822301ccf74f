//! Model and forecast configuration.
//!
//! All options carry defaults and `with_*` builders; the whole struct can be
//! loaded from JSON through serde.

use crate::core::Frequency;
use crate::error::{ForecastError, Result};
use crate::regressors::{HolidayCalendar, HolidayEvent, SeasonalComponent};
use crate::utils::LbfgsConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a seasonal or holiday component combines with the trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    /// `y = trend + effect`
    #[default]
    Additive,
    /// `y = trend * (1 + effect)`
    Multiplicative,
}

/// Saturating capacity for logistic growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capacity {
    Constant(f64),
    /// Piecewise-constant steps: each value applies from its date onwards.
    Series(Vec<(NaiveDate, f64)>),
}

/// Shape of the trend component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Growth {
    #[default]
    Linear,
    Logistic {
        capacity: Capacity,
        #[serde(default)]
        floor: Option<f64>,
    },
    /// Constant level; changepoints are ignored.
    Flat,
}

/// Whether a built-in seasonality is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityToggle {
    /// Enable when the history is long and dense enough.
    #[default]
    Auto,
    Off,
    /// Enable with the given Fourier order.
    On(usize),
}

/// How parameters are estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Single maximum a posteriori estimate.
    #[default]
    Map,
    /// MAP plus `samples` draws from the Laplace approximation of the posterior.
    Laplace { samples: usize },
}

/// Names reserved for the built-in seasonalities.
pub const BUILTIN_SEASONALITIES: [&str; 3] = ["yearly", "weekly", "daily"];

/// Configuration for fitting and forecasting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of future timestamps to produce.
    pub forecast_periods: usize,
    pub freq: Frequency,
    /// Probability mass inside the uncertainty interval, in (0, 1).
    pub interval_width: f64,
    pub holidays: Vec<HolidayEvent>,
    pub changepoint_count: usize,
    /// Fraction of the history (by row) eligible for changepoints, in (0, 1].
    pub changepoint_range: f64,
    /// Explicit changepoint dates; overrides `changepoint_count` when non-empty.
    pub changepoints: Vec<NaiveDate>,
    pub changepoint_prior_scale: f64,
    /// Custom seasonalities in addition to the built-in ones.
    pub seasonalities: Vec<SeasonalComponent>,
    pub yearly_seasonality: SeasonalityToggle,
    pub weekly_seasonality: SeasonalityToggle,
    pub daily_seasonality: SeasonalityToggle,
    pub seasonality_mode: SeasonalityMode,
    /// Defaults to `seasonality_mode` when unset.
    pub holidays_mode: Option<SeasonalityMode>,
    pub seasonality_prior_scale: f64,
    pub holidays_prior_scale: f64,
    pub growth: Growth,
    pub fit_mode: FitMode,
    pub uncertainty_samples: usize,
    pub seed: u64,
    /// Fail with `DateRange` when a row falls outside the declared holiday dates.
    pub require_holiday_coverage: bool,
    pub optimizer: LbfgsConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            forecast_periods: 12,
            freq: Frequency::Month,
            interval_width: 0.80,
            holidays: Vec::new(),
            changepoint_count: 25,
            changepoint_range: 0.8,
            changepoints: Vec::new(),
            changepoint_prior_scale: 0.05,
            seasonalities: Vec::new(),
            yearly_seasonality: SeasonalityToggle::Auto,
            weekly_seasonality: SeasonalityToggle::Auto,
            daily_seasonality: SeasonalityToggle::Auto,
            seasonality_mode: SeasonalityMode::Additive,
            holidays_mode: None,
            seasonality_prior_scale: 10.0,
            holidays_prior_scale: 10.0,
            growth: Growth::Linear,
            fit_mode: FitMode::Map,
            uncertainty_samples: 1000,
            seed: 0,
            require_holiday_coverage: false,
            optimizer: LbfgsConfig::default(),
        }
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl ForecastConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forecast_periods(mut self, periods: usize) -> Self {
        self.forecast_periods = periods;
        self
    }

    pub fn with_freq(mut self, freq: Frequency) -> Self {
        self.freq = freq;
        self
    }

    pub fn with_interval_width(mut self, width: f64) -> Self {
        self.interval_width = width;
        self
    }

    pub fn with_holidays(mut self, holidays: Vec<HolidayEvent>) -> Self {
        self.holidays = holidays;
        self
    }

    pub fn with_holiday(mut self, holiday: HolidayEvent) -> Self {
        self.holidays.push(holiday);
        self
    }

    pub fn with_changepoint_count(mut self, count: usize) -> Self {
        self.changepoint_count = count;
        self
    }

    pub fn with_changepoint_range(mut self, range: f64) -> Self {
        self.changepoint_range = range;
        self
    }

    pub fn with_changepoints(mut self, dates: Vec<NaiveDate>) -> Self {
        self.changepoints = dates;
        self
    }

    pub fn with_changepoint_prior_scale(mut self, scale: f64) -> Self {
        self.changepoint_prior_scale = scale;
        self
    }

    pub fn with_seasonality(mut self, seasonality: SeasonalComponent) -> Self {
        self.seasonalities.push(seasonality);
        self
    }

    pub fn with_yearly_seasonality(mut self, toggle: SeasonalityToggle) -> Self {
        self.yearly_seasonality = toggle;
        self
    }

    pub fn with_weekly_seasonality(mut self, toggle: SeasonalityToggle) -> Self {
        self.weekly_seasonality = toggle;
        self
    }

    pub fn with_daily_seasonality(mut self, toggle: SeasonalityToggle) -> Self {
        self.daily_seasonality = toggle;
        self
    }

    pub fn with_seasonality_mode(mut self, mode: SeasonalityMode) -> Self {
        self.seasonality_mode = mode;
        self
    }

    pub fn with_holidays_mode(mut self, mode: SeasonalityMode) -> Self {
        self.holidays_mode = Some(mode);
        self
    }

    pub fn with_seasonality_prior_scale(mut self, scale: f64) -> Self {
        self.seasonality_prior_scale = scale;
        self
    }

    pub fn with_holidays_prior_scale(mut self, scale: f64) -> Self {
        self.holidays_prior_scale = scale;
        self
    }

    pub fn with_growth(mut self, growth: Growth) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_fit_mode(mut self, fit_mode: FitMode) -> Self {
        self.fit_mode = fit_mode;
        self
    }

    pub fn with_uncertainty_samples(mut self, samples: usize) -> Self {
        self.uncertainty_samples = samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_require_holiday_coverage(mut self, require: bool) -> Self {
        self.require_holiday_coverage = require;
        self
    }

    pub fn with_optimizer(mut self, optimizer: LbfgsConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Effective holiday mode.
    pub fn holidays_mode(&self) -> SeasonalityMode {
        self.holidays_mode.unwrap_or(self.seasonality_mode)
    }

    /// Toggle for a built-in seasonality by name.
    pub fn builtin_toggle(&self, name: &str) -> Option<SeasonalityToggle> {
        match name {
            "yearly" => Some(self.yearly_seasonality),
            "weekly" => Some(self.weekly_seasonality),
            "daily" => Some(self.daily_seasonality),
            _ => None,
        }
    }

    /// Check every option; the first problem found is reported.
    pub fn validate(&self) -> Result<()> {
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "interval_width must be in (0, 1), got {}",
                self.interval_width
            )));
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "changepoint_range must be in (0, 1], got {}",
                self.changepoint_range
            )));
        }
        if !positive(self.changepoint_prior_scale) {
            return Err(ForecastError::InvalidConfig(
                "changepoint_prior_scale must be positive".to_string(),
            ));
        }
        if !positive(self.seasonality_prior_scale) || !positive(self.holidays_prior_scale) {
            return Err(ForecastError::InvalidConfig(
                "seasonality and holiday prior scales must be positive".to_string(),
            ));
        }
        if self.uncertainty_samples == 0 {
            return Err(ForecastError::InvalidConfig(
                "uncertainty_samples must be at least 1".to_string(),
            ));
        }
        if let FitMode::Laplace { samples: 0 } = self.fit_mode {
            return Err(ForecastError::InvalidConfig(
                "Laplace fit mode needs at least 1 posterior sample".to_string(),
            ));
        }

        for toggle in [
            self.yearly_seasonality,
            self.weekly_seasonality,
            self.daily_seasonality,
        ] {
            if toggle == SeasonalityToggle::On(0) {
                return Err(ForecastError::InvalidConfig(
                    "built-in seasonality order must be at least 1".to_string(),
                ));
            }
        }

        let mut names = HashSet::new();
        for seasonality in &self.seasonalities {
            seasonality.validate()?;
            let clashes_builtin = self
                .builtin_toggle(&seasonality.name)
                .is_some_and(|t| t != SeasonalityToggle::Off);
            if clashes_builtin || !names.insert(seasonality.name.as_str()) {
                return Err(ForecastError::InvalidConfig(format!(
                    "duplicate seasonality name '{}'",
                    seasonality.name
                )));
            }
        }

        // Expansion validates every event and prior scale consistency.
        HolidayCalendar::from_events(&self.holidays)?;

        if let Growth::Logistic { capacity, floor } = &self.growth {
            let floor = floor.unwrap_or(0.0);
            if !floor.is_finite() {
                return Err(ForecastError::InvalidConfig(
                    "logistic floor must be finite".to_string(),
                ));
            }
            match capacity {
                Capacity::Constant(cap) => {
                    if !(cap.is_finite() && *cap > floor) {
                        return Err(ForecastError::InvalidConfig(format!(
                            "capacity {} must exceed the floor {}",
                            cap, floor
                        )));
                    }
                }
                Capacity::Series(steps) => {
                    if steps.is_empty() {
                        return Err(ForecastError::InvalidConfig(
                            "capacity series must not be empty".to_string(),
                        ));
                    }
                    if steps.windows(2).any(|w| w[1].0 <= w[0].0) {
                        return Err(ForecastError::InvalidConfig(
                            "capacity series dates must be strictly increasing".to_string(),
                        ));
                    }
                    if let Some((date, cap)) =
                        steps.iter().find(|(_, c)| !(c.is_finite() && *c > floor))
                    {
                        return Err(ForecastError::InvalidConfig(format!(
                            "capacity {} on {} must exceed the floor {}",
                            cap, date, floor
                        )));
                    }
                }
            }
        }

        let opt = &self.optimizer;
        if opt.max_iter == 0
            || opt.memory == 0
            || opt.max_line_search == 0
            || !positive(opt.grad_tolerance)
            || !positive(opt.ftol)
            || !(opt.c1 > 0.0 && opt.c1 < 1.0)
        {
            return Err(ForecastError::InvalidConfig(
                "optimizer settings must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
