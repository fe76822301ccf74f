//! # anofox-decompose
//!
//! Decomposable time series forecasting: a piecewise trend, Fourier
//! seasonalities and calendar holiday effects fitted jointly by penalised
//! maximum a posteriori estimation, with uncertainty intervals from
//! simulated future trend changes.
//!
//! ```
//! use anofox_decompose::prelude::*;
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let base = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
//! let timestamps = (0..90).map(|i| base + Duration::days(i)).collect();
//! let values = (0..90).map(|i| 200.0 + 2.0 * i as f64 + (i % 7) as f64).collect();
//! let series = TimeSeries::univariate(timestamps, values).unwrap();
//!
//! let config = ForecastConfig::default()
//!     .with_forecast_periods(3)
//!     .with_uncertainty_samples(200);
//! let forecast = fit_and_forecast(&series, &config).unwrap();
//!
//! assert_eq!(forecast.len(), 93);
//! for row in forecast.future_rows() {
//!     assert!(row.yhat_lower <= row.yhat && row.yhat <= row.yhat_upper);
//! }
//! ```

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod regressors;
pub mod utils;

pub use error::{ForecastError, Result};

use crate::config::ForecastConfig;
use crate::core::{Forecast, TimeSeries};
use crate::models::{DecomposedModel, Forecaster};

/// Fit a [`DecomposedModel`] and forecast `config.forecast_periods` steps at
/// `config.freq`, history rows included.
pub fn fit_and_forecast(series: &TimeSeries, config: &ForecastConfig) -> Result<Forecast> {
    let mut model = DecomposedModel::new(config.clone());
    model.fit(series)?;
    model.forecast_configured()
}

pub mod prelude {
    pub use crate::config::{
        Capacity, FitMode, ForecastConfig, Growth, SeasonalityMode, SeasonalityToggle,
    };
    pub use crate::core::{
        CancellationToken, Forecast, ForecastRow, Frequency, Observation, TimeSeries,
    };
    pub use crate::error::{ForecastError, Result};
    pub use crate::fit_and_forecast;
    pub use crate::models::{DecomposedModel, Forecaster};
    pub use crate::regressors::{HolidayEvent, SeasonalComponent};
    pub use crate::utils::{
        calculate_metrics, cross_validate, quantile_normal, AccuracyMetrics, CVConfig,
    };
}
