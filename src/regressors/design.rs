//! Feature layout shared by fitting and prediction.
//!
//! The layout is resolved once from the history and stored with the fitted
//! model, so predictions at arbitrary timestamps produce the same columns in
//! the same order.

use super::fourier::{fourier_features, SeasonalComponent};
use super::holidays::HolidayCalendar;
use crate::config::SeasonalityMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Seasonality,
    Holiday,
}

/// A contiguous group of columns belonging to one named component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBlock {
    pub name: String,
    pub kind: BlockKind,
    pub mode: SeasonalityMode,
    pub columns: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub prior_scale: f64,
    pub mode: SeasonalityMode,
}

/// Resolved seasonal and holiday columns.
///
/// Seasonal columns come first, then holiday columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureLayout {
    seasonalities: Vec<SeasonalComponent>,
    holidays: Option<HolidayCalendar>,
    columns: Vec<FeatureColumn>,
    blocks: Vec<FeatureBlock>,
    n_seasonal: usize,
}

impl FeatureLayout {
    /// Build the layout. Components without their own prior scale or mode
    /// take the global seasonality defaults; holidays without their own prior
    /// use `holidays_prior_scale`.
    pub fn new(
        seasonalities: Vec<SeasonalComponent>,
        seasonality_mode: SeasonalityMode,
        seasonality_prior_scale: f64,
        holidays: Option<HolidayCalendar>,
        holidays_mode: SeasonalityMode,
        holidays_prior_scale: f64,
    ) -> Self {
        let mut columns = Vec::new();
        let mut blocks = Vec::new();

        for component in &seasonalities {
            let mode = component.mode.unwrap_or(seasonality_mode);
            let prior_scale = component.prior_scale.unwrap_or(seasonality_prior_scale);
            let start = columns.len();
            columns.extend(component.column_names().into_iter().map(|name| FeatureColumn {
                name,
                prior_scale,
                mode,
            }));
            blocks.push(FeatureBlock {
                name: component.name.clone(),
                kind: BlockKind::Seasonality,
                mode,
                columns: start..columns.len(),
            });
        }
        let n_seasonal = columns.len();

        if let Some(calendar) = &holidays {
            for name in calendar.names() {
                let prior_scale = calendar.prior_scale(name).unwrap_or(holidays_prior_scale);
                let start = columns.len();
                columns.extend(
                    calendar
                        .columns()
                        .iter()
                        .filter(|c| c.name == name)
                        .map(|c| FeatureColumn {
                            name: c.column_name(),
                            prior_scale,
                            mode: holidays_mode,
                        }),
                );
                blocks.push(FeatureBlock {
                    name: name.to_string(),
                    kind: BlockKind::Holiday,
                    mode: holidays_mode,
                    columns: start..columns.len(),
                });
            }
        }

        Self {
            seasonalities,
            holidays,
            columns,
            blocks,
            n_seasonal,
        }
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn blocks(&self) -> &[FeatureBlock] {
        &self.blocks
    }

    pub fn seasonalities(&self) -> &[SeasonalComponent] {
        &self.seasonalities
    }

    pub fn holiday_calendar(&self) -> Option<&HolidayCalendar> {
        self.holidays.as_ref()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn n_seasonal(&self) -> usize {
        self.n_seasonal
    }

    pub fn n_holiday(&self) -> usize {
        self.columns.len() - self.n_seasonal
    }

    pub fn prior_scales(&self) -> Vec<f64> {
        self.columns.iter().map(|c| c.prior_scale).collect()
    }

    /// Evaluate every column at the given timestamps.
    pub fn build(&self, timestamps: &[DateTime<Utc>]) -> DesignMatrix {
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.columns.len());
        for component in &self.seasonalities {
            columns.extend(fourier_features(
                timestamps,
                component.period_days,
                component.fourier_order,
            ));
        }
        if let Some(calendar) = &self.holidays {
            columns.extend(calendar.features(timestamps));
        }
        DesignMatrix {
            n_rows: timestamps.len(),
            columns,
            modes: self.columns.iter().map(|c| c.mode).collect(),
        }
    }
}

/// Column-major feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    n_rows: usize,
    columns: Vec<Vec<f64>>,
    modes: Vec<SeasonalityMode>,
}

impl DesignMatrix {
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, j: usize) -> &[f64] {
        &self.columns[j]
    }

    pub fn mode(&self, j: usize) -> SeasonalityMode {
        self.modes[j]
    }

    /// `(X_add β, X_mult β)` per row.
    pub fn mode_totals(&self, beta: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut additive = vec![0.0; self.n_rows];
        let mut multiplicative = vec![0.0; self.n_rows];
        for (j, (column, b)) in self.columns.iter().zip(beta).enumerate() {
            let target = match self.modes[j] {
                SeasonalityMode::Additive => &mut additive,
                SeasonalityMode::Multiplicative => &mut multiplicative,
            };
            for (acc, x) in target.iter_mut().zip(column) {
                *acc += b * x;
            }
        }
        (additive, multiplicative)
    }

    /// `X β` restricted to one block.
    pub fn block_effect(&self, block: &FeatureBlock, beta: &[f64]) -> Vec<f64> {
        let mut effect = vec![0.0; self.n_rows];
        for j in block.columns.clone() {
            for (acc, x) in effect.iter_mut().zip(&self.columns[j]) {
                *acc += beta[j] * x;
            }
        }
        effect
    }
}
