//! Simulated uncertainty intervals for future rows.
//!
//! Each draw extends the historical changepoints with new ones placed
//! uniformly over the forecast range, at a rate matching the history, with
//! rate changes drawn from a Laplace distribution fitted to the historical
//! changes. Observation noise is added on top, and the per-row quantiles of
//! the simulated paths form the interval.

use super::estimator::ModelParameters;
use super::trend::TrendShape;
use crate::core::CancellationToken;
use crate::error::{ForecastError, Result};
use crate::regressors::{DesignMatrix, TimeIndex};
use crate::utils::stats::quantile_sorted;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use statrs::distribution::{Laplace, Normal, Poisson};

const SIMULATION_STREAM: u64 = 2;
const LAPLACE_SCALE_FLOOR: f64 = 1e-8;

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Independent generator for one draw of one random stream.
pub(crate) fn draw_rng(seed: u64, stream: u64, draw: usize) -> StdRng {
    let base = splitmix64(seed ^ stream.rotate_left(32));
    StdRng::seed_from_u64(splitmix64(base ^ draw as u64))
}

/// Rows to simulate, all on the scaled axes.
#[derive(Debug, Clone, Copy)]
pub struct SimulationInput<'a> {
    pub shape: TrendShape,
    pub t: &'a [f64],
    pub cap: &'a [f64],
    pub changepoints: &'a [f64],
    pub x: &'a DesignMatrix,
    /// Parameter sets cycled over draws (the MAP alone, or posterior draws).
    pub parameters: &'a [ModelParameters],
    pub index: &'a TimeIndex,
}

/// Per-row summary of the simulated paths, in original units.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedIntervals {
    pub point: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct UncertaintySimulator {
    samples: usize,
    interval_width: f64,
    seed: u64,
    cancel: Option<CancellationToken>,
}

impl UncertaintySimulator {
    pub fn new(samples: usize, interval_width: f64, seed: u64) -> Self {
        Self {
            samples,
            interval_width,
            seed,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Median and interval bounds per row.
    pub fn simulate(&self, input: &SimulationInput<'_>) -> Result<SimulatedIntervals> {
        let n_rows = input.t.len();
        if n_rows == 0 {
            return Ok(SimulatedIntervals {
                point: Vec::new(),
                lower: Vec::new(),
                upper: Vec::new(),
            });
        }
        if input.parameters.is_empty() || self.samples == 0 {
            return Err(ForecastError::ComputationError(
                "simulation needs at least one parameter set and one draw".to_string(),
            ));
        }

        let paths: Vec<Vec<f64>> = (0..self.samples)
            .into_par_iter()
            .map(|draw| {
                if let Some(token) = &self.cancel {
                    token.check()?;
                }
                let params = &input.parameters[draw % input.parameters.len()];
                let mut rng = draw_rng(self.seed, SIMULATION_STREAM, draw);
                sample_path(input, params, &mut rng)
            })
            .collect::<Result<_>>()?;

        let lower_q = (1.0 - self.interval_width) / 2.0;
        let upper_q = (1.0 + self.interval_width) / 2.0;
        let mut point = Vec::with_capacity(n_rows);
        let mut lower = Vec::with_capacity(n_rows);
        let mut upper = Vec::with_capacity(n_rows);
        let mut column = Vec::with_capacity(self.samples);
        for row in 0..n_rows {
            column.clear();
            column.extend(paths.iter().map(|path| path[row]));
            column.sort_by(|a, b| a.total_cmp(b));
            point.push(quantile_sorted(&column, 0.5));
            lower.push(quantile_sorted(&column, lower_q));
            upper.push(quantile_sorted(&column, upper_q));
        }

        Ok(SimulatedIntervals { point, lower, upper })
    }
}

/// One simulated path in original units.
fn sample_path(
    input: &SimulationInput<'_>,
    params: &ModelParameters,
    rng: &mut StdRng,
) -> Result<Vec<f64>> {
    let horizon_end = input.t.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let n_hist = input.changepoints.len();

    let mut changepoints = input.changepoints.to_vec();
    let mut deltas = params.delta.clone();
    if horizon_end > 1.0 && n_hist > 0 {
        let rate = n_hist as f64 * (horizon_end - 1.0);
        let count = Poisson::new(rate)
            .map_err(|e| ForecastError::ComputationError(e.to_string()))?
            .sample(rng) as usize;
        if count > 0 {
            let scale = params.delta.iter().map(|d| d.abs()).sum::<f64>() / n_hist as f64
                + LAPLACE_SCALE_FLOOR;
            let laplace = Laplace::new(0.0, scale)
                .map_err(|e| ForecastError::ComputationError(e.to_string()))?;
            let mut positions: Vec<f64> = (0..count)
                .map(|_| horizon_end - rng.gen::<f64>() * (horizon_end - 1.0))
                .collect();
            positions.sort_by(|a, b| a.total_cmp(b));
            changepoints.extend(positions);
            deltas.extend((0..count).map(|_| laplace.sample(rng)));
        }
    }

    let trend = super::trend::PiecewiseTrend {
        shape: input.shape,
        k: params.k,
        m: params.m,
        changepoints: &changepoints,
        deltas: &deltas,
    }
    .evaluate(input.t, input.cap);
    let (additive, multiplicative) = input.x.mode_totals(&params.beta());
    let noise =
        Normal::new(0.0, params.sigma).map_err(|e| ForecastError::ComputationError(e.to_string()))?;

    Ok((0..input.t.len())
        .map(|i| {
            let y = trend[i] * (1.0 + multiplicative[i]) + additive[i] + noise.sample(rng);
            input.index.unscale_value(y)
        })
        .collect())
}
