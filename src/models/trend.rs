//! Piecewise trend with rate changes at fixed changepoints.
//!
//! All quantities live on the scaled axes of [`TimeIndex`]: `t` in `[0, 1]`
//! over the history and values divided by `y_scale`.

use crate::config::{Capacity, Growth};
use crate::error::{ForecastError, Result};
use crate::regressors::TimeIndex;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Functional form of the trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendShape {
    Linear,
    Logistic,
    Flat,
}

impl From<&Growth> for TrendShape {
    fn from(growth: &Growth) -> Self {
        match growth {
            Growth::Linear => TrendShape::Linear,
            Growth::Logistic { .. } => TrendShape::Logistic,
            Growth::Flat => TrendShape::Flat,
        }
    }
}

/// Trend parameters borrowed for evaluation.
#[derive(Debug, Clone, Copy)]
pub struct PiecewiseTrend<'a> {
    pub shape: TrendShape,
    /// Base growth rate.
    pub k: f64,
    /// Offset.
    pub m: f64,
    /// Sorted changepoint positions on the scaled time axis.
    pub changepoints: &'a [f64],
    /// Rate change at each changepoint.
    pub deltas: &'a [f64],
}

impl<'a> PiecewiseTrend<'a> {
    /// Evaluate the trend. `cap` holds the scaled capacity per row and is only
    /// read for logistic growth.
    pub fn evaluate(&self, t: &[f64], cap: &[f64]) -> Vec<f64> {
        match self.shape {
            TrendShape::Linear => self.linear(t),
            TrendShape::Logistic => self.logistic(t, cap),
            TrendShape::Flat => vec![self.m; t.len()],
        }
    }

    fn linear(&self, t: &[f64]) -> Vec<f64> {
        t.iter()
            .map(|&ti| {
                let mut rate = self.k;
                let mut offset = self.m;
                for (s, d) in self.changepoints.iter().zip(self.deltas) {
                    if ti >= *s {
                        rate += d;
                        offset -= s * d;
                    }
                }
                rate * ti + offset
            })
            .collect()
    }

    /// Offset adjustments keeping the logistic curve continuous at each changepoint.
    fn logistic_gamma(&self) -> Vec<f64> {
        let mut gamma = Vec::with_capacity(self.changepoints.len());
        let mut rate = self.k;
        let mut offset = self.m;
        for (s, d) in self.changepoints.iter().zip(self.deltas) {
            let next_rate = rate + d;
            let g = if next_rate.abs() > 1e-10 {
                (s - offset) * (1.0 - rate / next_rate)
            } else {
                0.0
            };
            gamma.push(g);
            offset += g;
            rate = next_rate;
        }
        gamma
    }

    fn logistic(&self, t: &[f64], cap: &[f64]) -> Vec<f64> {
        let gamma = self.logistic_gamma();
        t.iter()
            .zip(cap)
            .map(|(&ti, &c)| {
                let mut rate = self.k;
                let mut offset = self.m;
                for ((s, d), g) in self.changepoints.iter().zip(self.deltas).zip(&gamma) {
                    if ti >= *s {
                        rate += d;
                        offset += g;
                    }
                }
                c / (1.0 + (-rate * (ti - offset)).exp())
            })
            .collect()
    }

    /// Partial derivatives of the trend with respect to `[k, m, δ_1..δ_S]`,
    /// one column per parameter.
    pub fn jacobian(&self, t: &[f64], cap: &[f64]) -> Vec<Vec<f64>> {
        let n_params = 2 + self.deltas.len();
        match self.shape {
            TrendShape::Linear => {
                let mut columns = Vec::with_capacity(n_params);
                columns.push(t.to_vec());
                columns.push(vec![1.0; t.len()]);
                for s in self.changepoints {
                    columns.push(
                        t.iter()
                            .map(|&ti| if ti >= *s { ti - s } else { 0.0 })
                            .collect(),
                    );
                }
                columns
            }
            TrendShape::Flat => {
                let mut columns = vec![vec![0.0; t.len()]; n_params];
                columns[1] = vec![1.0; t.len()];
                columns
            }
            TrendShape::Logistic => self.logistic_jacobian(t, cap),
        }
    }

    fn logistic_jacobian(&self, t: &[f64], cap: &[f64]) -> Vec<Vec<f64>> {
        let mut params = Vec::with_capacity(2 + self.deltas.len());
        params.push(self.k);
        params.push(self.m);
        params.extend_from_slice(self.deltas);

        let eval = |p: &[f64]| {
            PiecewiseTrend {
                shape: TrendShape::Logistic,
                k: p[0],
                m: p[1],
                changepoints: self.changepoints,
                deltas: &p[2..],
            }
            .logistic(t, cap)
        };

        (0..params.len())
            .map(|j| {
                let h = 1e-6 * params[j].abs().max(1.0);
                let mut plus = params.clone();
                plus[j] += h;
                let mut minus = params.clone();
                minus[j] -= h;
                eval(&plus)
                    .iter()
                    .zip(eval(&minus))
                    .map(|(a, b)| (a - b) / (2.0 * h))
                    .collect()
            })
            .collect()
    }
}

/// Evenly spaced changepoints over the first `range` fraction of the rows.
///
/// The count shrinks to `floor(n * range) - 1` on short histories; positions
/// are the scaled times of the selected rows, the first row excluded.
pub fn automatic_changepoints(t: &[f64], count: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    let count = if count + 1 > hist_size {
        hist_size.saturating_sub(1)
    } else {
        count
    };
    if count == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    (1..=count)
        .map(|i| {
            let idx = (i as f64 * last / count as f64).round_ties_even() as usize;
            t[idx]
        })
        .collect()
}

/// Scaled positions of explicit changepoint dates; they must fall inside the history.
pub fn manual_changepoints(dates: &[NaiveDate], index: &TimeIndex) -> Result<Vec<f64>> {
    let mut positions = Vec::with_capacity(dates.len());
    for date in dates {
        let ts = date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| ForecastError::TimestampError(format!("invalid date {}", date)))?;
        let t = index.scaled_time(ts);
        if !(0.0..1.0).contains(&t) {
            return Err(ForecastError::InvalidConfig(format!(
                "changepoint {} must fall within the training history",
                date
            )));
        }
        positions.push(t);
    }
    positions.sort_by(|a, b| a.total_cmp(b));
    positions.dedup();
    Ok(positions)
}

/// Scaled capacity for each timestamp (empty unless growth is logistic).
pub fn capacity_values(
    growth: &Growth,
    timestamps: &[DateTime<Utc>],
    index: &TimeIndex,
) -> Result<Vec<f64>> {
    let Growth::Logistic { capacity, .. } = growth else {
        return Ok(Vec::new());
    };
    timestamps
        .iter()
        .map(|ts| {
            let cap = match capacity {
                Capacity::Constant(c) => *c,
                Capacity::Series(steps) => {
                    let date = ts.date_naive();
                    let pos = steps.partition_point(|(d, _)| *d <= date);
                    if pos == 0 {
                        return Err(ForecastError::DateRange(format!(
                            "capacity series does not cover {}",
                            date
                        )));
                    }
                    steps[pos - 1].1
                }
            };
            Ok(index.scale_value(cap))
        })
        .collect()
}

/// Deterministic starting values for `(k, m)` from the first and last rows.
pub fn initial_rate_and_offset(shape: TrendShape, t: &[f64], y: &[f64], cap: &[f64]) -> (f64, f64) {
    let n = t.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let (i0, i1) = (0, n - 1);
    let span = t[i1] - t[i0];
    match shape {
        TrendShape::Flat => (0.0, y.iter().sum::<f64>() / n as f64),
        TrendShape::Linear => {
            let k = if span > 0.0 { (y[i1] - y[i0]) / span } else { 0.0 };
            (k, y[i0] - k * t[i0])
        }
        TrendShape::Logistic => {
            let (c0, c1) = (cap[i0], cap[i1]);
            let y0 = y[i0].clamp(0.01 * c0, 0.99 * c0);
            let y1 = y[i1].clamp(0.01 * c1, 0.99 * c1);
            let mut r0 = c0 / y0;
            let r1 = c1 / y1;
            if (r0 - r1).abs() <= 0.01 {
                r0 *= 1.05;
            }
            let l0 = (r0 - 1.0).ln();
            let l1 = (r1 - 1.0).ln();
            let k = (l0 - l1) / span;
            let m = l0 * span / (l0 - l1);
            (k, m)
        }
    }
}
