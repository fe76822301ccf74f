//! Forecast table holding point predictions, intervals and components.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named column of component values, one entry per forecast row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSeries {
    pub name: String,
    pub values: Vec<f64>,
}

impl ComponentSeries {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Decomposition of the point forecast, in original units.
///
/// Multiplicative terms are stored as fractions of the trend, the way they
/// enter `yhat = trend * (1 + multiplicative_terms) + additive_terms`.
/// With a non-zero logistic floor only the part of the trend above the floor
/// is scaled, so the identity becomes
/// `yhat = floor + (trend - floor) * (1 + multiplicative_terms) + additive_terms`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastComponents {
    pub trend: Vec<f64>,
    pub seasonalities: Vec<ComponentSeries>,
    /// Per-holiday effect (summed over the holiday's window offsets).
    pub holidays: Vec<ComponentSeries>,
    pub holidays_total: Vec<f64>,
    pub additive_terms: Vec<f64>,
    pub multiplicative_terms: Vec<f64>,
}

/// One exported row of the forecast table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    #[serde(rename = "Date")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Forecasted_Sales")]
    pub yhat: f64,
    #[serde(rename = "Lower_Bound")]
    pub yhat_lower: f64,
    #[serde(rename = "Upper_Bound")]
    pub yhat_upper: f64,
}

/// A forecast over history plus horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    timestamps: Vec<DateTime<Utc>>,
    point: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    /// Number of leading rows that fall inside the fitted history.
    in_sample: usize,
    components: ForecastComponents,
}

impl Forecast {
    /// Assemble a forecast; every column must have one value per timestamp.
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        point: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
        in_sample: usize,
        components: ForecastComponents,
    ) -> Result<Self> {
        let n = timestamps.len();
        let component_lengths = [
            components.trend.len(),
            components.holidays_total.len(),
            components.additive_terms.len(),
            components.multiplicative_terms.len(),
        ];
        let named = components
            .seasonalities
            .iter()
            .chain(components.holidays.iter())
            .map(|c| c.values.len());
        for len in [point.len(), lower.len(), upper.len()]
            .into_iter()
            .chain(component_lengths)
            .chain(named)
        {
            if len != n {
                return Err(ForecastError::DimensionMismatch {
                    expected: n,
                    got: len,
                });
            }
        }
        if in_sample > n {
            return Err(ForecastError::DimensionMismatch {
                expected: n,
                got: in_sample,
            });
        }
        Ok(Self {
            timestamps,
            point,
            lower,
            upper,
            in_sample,
            components,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Number of rows at or before the last observed timestamp.
    pub fn in_sample_len(&self) -> usize {
        self.in_sample
    }

    /// Number of rows beyond the observed history.
    pub fn horizon(&self) -> usize {
        self.len() - self.in_sample
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Point predictions (`yhat`).
    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn components(&self) -> &ForecastComponents {
        &self.components
    }

    pub fn trend(&self) -> &[f64] {
        &self.components.trend
    }

    /// Look up a seasonality or holiday column by name.
    pub fn component(&self, name: &str) -> Option<&[f64]> {
        self.components
            .seasonalities
            .iter()
            .chain(self.components.holidays.iter())
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Iterate over the exported rows.
    pub fn rows(&self) -> impl Iterator<Item = ForecastRow> + '_ {
        (0..self.len()).map(move |i| ForecastRow {
            timestamp: self.timestamps[i],
            yhat: self.point[i],
            yhat_lower: self.lower[i],
            yhat_upper: self.upper[i],
        })
    }

    /// Rows beyond the observed history.
    pub fn future_rows(&self) -> impl Iterator<Item = ForecastRow> + '_ {
        self.rows().skip(self.in_sample)
    }
}
