//! Fourier basis for periodic seasonal components.

use crate::config::SeasonalityMode;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A periodic component modelled by `2 * fourier_order` sine/cosine columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalComponent {
    pub name: String,
    pub period_days: f64,
    pub fourier_order: usize,
    /// Overrides the global seasonality prior scale.
    #[serde(default)]
    pub prior_scale: Option<f64>,
    /// Overrides the global seasonality mode.
    #[serde(default)]
    pub mode: Option<SeasonalityMode>,
}

impl SeasonalComponent {
    pub fn new(name: impl Into<String>, period_days: f64, fourier_order: usize) -> Self {
        Self {
            name: name.into(),
            period_days,
            fourier_order,
            prior_scale: None,
            mode: None,
        }
    }

    pub fn with_prior_scale(mut self, prior_scale: f64) -> Self {
        self.prior_scale = Some(prior_scale);
        self
    }

    pub fn with_mode(mut self, mode: SeasonalityMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ForecastError::InvalidConfig(
                "seasonality name must not be empty".to_string(),
            ));
        }
        if !(self.period_days.is_finite() && self.period_days > 0.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "seasonality '{}' needs a positive period, got {}",
                self.name, self.period_days
            )));
        }
        if self.fourier_order == 0 {
            return Err(ForecastError::InvalidConfig(format!(
                "seasonality '{}' needs a fourier order of at least 1",
                self.name
            )));
        }
        if let Some(scale) = self.prior_scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ForecastError::InvalidConfig(format!(
                    "seasonality '{}' prior scale must be positive",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Column labels in matrix order: `name_sin1, name_cos1, name_sin2, ...`.
    pub fn column_names(&self) -> Vec<String> {
        (1..=self.fourier_order)
            .flat_map(|h| {
                [
                    format!("{}_sin{}", self.name, h),
                    format!("{}_cos{}", self.name, h),
                ]
            })
            .collect()
    }
}

/// Days since 1970-01-01T00:00:00Z, with fractional part.
pub fn days_since_epoch(ts: DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 / SECONDS_PER_DAY
        + f64::from(ts.timestamp_subsec_nanos()) * 1e-9 / SECONDS_PER_DAY
}

/// Fourier columns for the given timestamps, ordered `sin1, cos1, sin2, cos2, ...`.
///
/// Returned column-major: `columns[j][i]` is column `j` at row `i`.
pub fn fourier_features(
    timestamps: &[DateTime<Utc>],
    period_days: f64,
    order: usize,
) -> Vec<Vec<f64>> {
    let days: Vec<f64> = timestamps.iter().map(|ts| days_since_epoch(*ts)).collect();
    let mut columns = Vec::with_capacity(2 * order);
    for h in 1..=order {
        let omega = 2.0 * PI * h as f64 / period_days;
        columns.push(days.iter().map(|d| (omega * d).sin()).collect());
        columns.push(days.iter().map(|d| (omega * d).cos()).collect());
    }
    columns
}
