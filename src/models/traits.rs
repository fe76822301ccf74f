//! Forecaster trait defining the common interface for fitted models.

use crate::core::{Forecast, Frequency, TimeSeries};
use crate::error::Result;
use chrono::{DateTime, Utc};

/// Common interface for forecasting models.
///
/// This trait is object-safe and can be used with `Box<dyn Forecaster>`.
pub trait Forecaster {
    /// Fit the model to the time series data.
    fn fit(&mut self, series: &TimeSeries) -> Result<()>;

    /// Evaluate the fitted model at arbitrary, strictly increasing timestamps.
    fn predict(&self, timestamps: &[DateTime<Utc>]) -> Result<Forecast>;

    /// Timestamps for a forecast frame: `periods` steps after the history at
    /// `freq`, optionally preceded by the history timestamps.
    fn make_future_timestamps(
        &self,
        periods: usize,
        freq: Frequency,
        include_history: bool,
    ) -> Result<Vec<DateTime<Utc>>>;

    /// History plus `periods` future rows.
    fn forecast(&self, periods: usize, freq: Frequency) -> Result<Forecast> {
        let timestamps = self.make_future_timestamps(periods, freq, true)?;
        self.predict(&timestamps)
    }

    /// Get the fitted values (in-sample predictions).
    fn fitted_values(&self) -> Option<&[f64]>;

    /// Get the residuals (actual - fitted).
    fn residuals(&self) -> Option<&[f64]>;

    /// Get the model name.
    fn name(&self) -> &str;

    /// Check if the model has been fitted.
    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

/// Type alias for boxed forecaster trait objects.
///
/// # Example
///
/// ```
/// use anofox_decompose::config::ForecastConfig;
/// use anofox_decompose::models::{BoxedForecaster, DecomposedModel};
///
/// let model: BoxedForecaster = Box::new(DecomposedModel::new(ForecastConfig::default()));
/// assert_eq!(model.name(), "Decomposed");
/// ```
pub type BoxedForecaster = Box<dyn Forecaster + Send + Sync>;
