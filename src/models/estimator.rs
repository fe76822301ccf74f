//! Parameter estimation: MAP by L-BFGS, optional Laplace posterior draws.
//!
//! The model on the scaled axes is
//!
//! ```text
//! yhat = trend(t; k, m, δ) * (1 + X_mult β) + X_add β
//! ```
//!
//! and the estimator minimises the negative log posterior over
//! `θ = [k, m, δ_1..δ_S, β_1..β_P, ln σ]`:
//!
//! ```text
//! n ln σ + Σ r² / 2σ²                 Gaussian likelihood
//! + (k² + m²) / 2·5²                   weak priors on rate and offset
//! + Σ sqrt(δ² + ε) / τ                 smoothed Laplace prior on rate changes
//! + Σ β_j² / 2 s_j²                    Gaussian prior on regressor weights
//! + (ln σ)² / 2·0.5²                   log-normal prior on the noise scale
//! ```

use super::simulator::draw_rng;
use super::trend::{initial_rate_and_offset, PiecewiseTrend, TrendShape};
use crate::config::{FitMode, SeasonalityMode};
use crate::core::CancellationToken;
use crate::error::{ForecastError, Result};
use crate::regressors::DesignMatrix;
use crate::utils::linalg::{cholesky_with_jitter, solve_lower_transpose};
use crate::utils::optimization::{
    finite_difference_hessian, lbfgs, LbfgsConfig, LbfgsResult, Termination,
};
use crate::utils::stats::std_dev;
use rand::distributions::Distribution;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use tracing::{debug, warn};

const RATE_PRIOR_SCALE: f64 = 5.0;
const LOG_SIGMA_PRIOR_SCALE: f64 = 0.5;
const LAPLACE_SMOOTHING: f64 = 1e-6;
const MIN_SIGMA: f64 = 1e-3;
const POSTERIOR_STREAM: u64 = 1;

/// Fitted component parameters on the scaled axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Base growth rate.
    pub k: f64,
    /// Offset.
    pub m: f64,
    /// Rate change at each changepoint.
    pub delta: Vec<f64>,
    pub beta_seasonal: Vec<f64>,
    pub beta_holiday: Vec<f64>,
    /// Observation noise scale.
    pub sigma: f64,
}

impl ModelParameters {
    /// Seasonal then holiday weights, matching the design matrix columns.
    pub fn beta(&self) -> Vec<f64> {
        let mut beta = self.beta_seasonal.clone();
        beta.extend_from_slice(&self.beta_holiday);
        beta
    }

    /// Trend evaluator over the given changepoints.
    pub fn trend<'a>(&'a self, shape: TrendShape, changepoints: &'a [f64]) -> PiecewiseTrend<'a> {
        PiecewiseTrend {
            shape,
            k: self.k,
            m: self.m,
            changepoints,
            deltas: &self.delta,
        }
    }

    fn to_vector(&self) -> Vec<f64> {
        let mut theta = vec![self.k, self.m];
        theta.extend_from_slice(&self.delta);
        theta.extend_from_slice(&self.beta_seasonal);
        theta.extend_from_slice(&self.beta_holiday);
        theta.push(self.sigma.ln());
        theta
    }
}

/// Scaled data and fixed structure of one fit.
#[derive(Debug, Clone, Copy)]
pub struct FitProblem<'a> {
    pub shape: TrendShape,
    pub t: &'a [f64],
    pub y: &'a [f64],
    /// Scaled capacity per row; empty unless growth is logistic.
    pub cap: &'a [f64],
    pub changepoints: &'a [f64],
    pub x: &'a DesignMatrix,
    pub n_seasonal: usize,
    pub prior_scales: &'a [f64],
    pub changepoint_prior_scale: f64,
}

impl<'a> FitProblem<'a> {
    fn n_delta(&self) -> usize {
        self.changepoints.len()
    }

    fn n_params(&self) -> usize {
        3 + self.n_delta() + self.x.n_cols()
    }

    /// Split a parameter vector into named parameters.
    pub fn unpack(&self, theta: &[f64]) -> ModelParameters {
        let d = 2 + self.n_delta();
        let s = d + self.n_seasonal;
        let b = d + self.x.n_cols();
        ModelParameters {
            k: theta[0],
            m: theta[1],
            delta: theta[2..d].to_vec(),
            beta_seasonal: theta[d..s].to_vec(),
            beta_holiday: theta[s..b].to_vec(),
            sigma: theta[b].exp(),
        }
    }

    /// Deterministic start: trend through the first and last rows, zero
    /// rate changes and weights, noise scale from the trend-only residuals.
    pub fn initial_parameters(&self) -> ModelParameters {
        let (k, m) = initial_rate_and_offset(self.shape, self.t, self.y, self.cap);
        let delta = vec![0.0; self.n_delta()];
        let trend = PiecewiseTrend {
            shape: self.shape,
            k,
            m,
            changepoints: self.changepoints,
            deltas: &delta,
        }
        .evaluate(self.t, self.cap);
        let residuals: Vec<f64> = self.y.iter().zip(&trend).map(|(y, f)| y - f).collect();
        let spread = std_dev(&residuals);
        let sigma = if spread.is_finite() {
            spread.max(MIN_SIGMA)
        } else {
            MIN_SIGMA
        };

        ModelParameters {
            k,
            m,
            delta,
            beta_seasonal: vec![0.0; self.n_seasonal],
            beta_holiday: vec![0.0; self.x.n_cols() - self.n_seasonal],
            sigma,
        }
    }

    /// Negative log posterior and its gradient.
    pub fn objective(&self, theta: &[f64]) -> (f64, Vec<f64>) {
        let n = self.y.len();
        let n_delta = self.n_delta();
        let n_beta = self.x.n_cols();
        let beta_start = 2 + n_delta;
        let rho_idx = beta_start + n_beta;

        let (k, m) = (theta[0], theta[1]);
        let deltas = &theta[2..beta_start];
        let beta = &theta[beta_start..rho_idx];
        let rho = theta[rho_idx];
        let sigma2 = (2.0 * rho).exp();

        let trend_model = PiecewiseTrend {
            shape: self.shape,
            k,
            m,
            changepoints: self.changepoints,
            deltas,
        };
        let trend = trend_model.evaluate(self.t, self.cap);
        let (additive, multiplicative) = self.x.mode_totals(beta);

        let residuals: Vec<f64> = (0..n)
            .map(|i| self.y[i] - (trend[i] * (1.0 + multiplicative[i]) + additive[i]))
            .collect();
        let ss: f64 = residuals.iter().map(|r| r * r).sum();

        let rate_var = RATE_PRIOR_SCALE * RATE_PRIOR_SCALE;
        let tau = self.changepoint_prior_scale;
        let mut f = n as f64 * rho + ss / (2.0 * sigma2);
        f += (k * k + m * m) / (2.0 * rate_var);
        f += deltas
            .iter()
            .map(|d| (d * d + LAPLACE_SMOOTHING).sqrt())
            .sum::<f64>()
            / tau;
        f += beta
            .iter()
            .zip(self.prior_scales)
            .map(|(b, s)| b * b / (2.0 * s * s))
            .sum::<f64>();
        f += rho * rho / (2.0 * LOG_SIGMA_PRIOR_SCALE * LOG_SIGMA_PRIOR_SCALE);

        // d f / d yhat_i
        let g: Vec<f64> = residuals.iter().map(|r| -r / sigma2).collect();
        let mut grad = vec![0.0; theta.len()];

        let jacobian = trend_model.jacobian(self.t, self.cap);
        for (p, column) in jacobian.iter().enumerate() {
            grad[p] = (0..n)
                .map(|i| g[i] * (1.0 + multiplicative[i]) * column[i])
                .sum();
        }
        grad[0] += k / rate_var;
        grad[1] += m / rate_var;
        for (j, d) in deltas.iter().enumerate() {
            grad[2 + j] += d / (tau * (d * d + LAPLACE_SMOOTHING).sqrt());
        }

        for j in 0..n_beta {
            let column = self.x.column(j);
            let data_term: f64 = match self.x.mode(j) {
                SeasonalityMode::Additive => (0..n).map(|i| g[i] * column[i]).sum(),
                SeasonalityMode::Multiplicative => {
                    (0..n).map(|i| g[i] * column[i] * trend[i]).sum()
                }
            };
            let s = self.prior_scales[j];
            grad[beta_start + j] = data_term + beta[j] / (s * s);
        }

        grad[rho_idx] = n as f64 - ss / sigma2
            + rho / (LOG_SIGMA_PRIOR_SCALE * LOG_SIGMA_PRIOR_SCALE);

        (f, grad)
    }
}

/// Outcome of an estimation run.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub map: ModelParameters,
    /// Laplace posterior draws; empty in MAP mode.
    pub posterior: Vec<ModelParameters>,
    pub iterations: usize,
    pub termination: Termination,
    pub objective: f64,
}

/// Fits [`FitProblem`]s.
#[derive(Debug, Clone)]
pub struct Estimator {
    optimizer: LbfgsConfig,
    fit_mode: FitMode,
    seed: u64,
    cancel: Option<CancellationToken>,
}

impl Estimator {
    pub fn new(optimizer: LbfgsConfig, fit_mode: FitMode, seed: u64) -> Self {
        Self {
            optimizer,
            fit_mode,
            seed,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    pub fn estimate(&self, problem: &FitProblem<'_>) -> Result<Estimate> {
        let initial = problem.initial_parameters().to_vector();
        debug!(
            n_params = problem.n_params(),
            n_changepoints = problem.n_delta(),
            n_regressors = problem.x.n_cols(),
            "starting optimisation"
        );

        let result = self.optimize(problem, &initial)?;
        let map = problem.unpack(&result.optimal_point);

        let posterior = match self.fit_mode {
            FitMode::Map => Vec::new(),
            FitMode::Laplace { samples } => {
                self.laplace_draws(problem, &result.optimal_point, samples)?
            }
        };

        Ok(Estimate {
            map,
            posterior,
            iterations: result.iterations,
            termination: result.termination,
            objective: result.optimal_value,
        })
    }

    /// L-BFGS with one relaxed retry from the best point reached.
    fn optimize(&self, problem: &FitProblem<'_>, initial: &[f64]) -> Result<LbfgsResult> {
        let objective = |theta: &[f64]| problem.objective(theta);

        let first = lbfgs(objective, initial, &self.optimizer, self.cancel.as_ref())?;
        debug!(
            iterations = first.iterations,
            termination = ?first.termination,
            gradient_norm = first.gradient_norm,
            objective = first.optimal_value,
            "optimiser finished"
        );
        if first.converged {
            return Ok(first);
        }

        warn!(
            iterations = first.iterations,
            gradient_norm = first.gradient_norm,
            "optimiser did not converge, retrying with relaxed tolerances"
        );
        let relaxed = self.optimizer.relaxed();
        let second = lbfgs(
            objective,
            &first.optimal_point,
            &relaxed,
            self.cancel.as_ref(),
        )?;
        if second.converged {
            return Ok(LbfgsResult {
                iterations: first.iterations + second.iterations,
                ..second
            });
        }

        Err(ForecastError::Convergence {
            iterations: first.iterations + second.iterations,
            gradient_norm: second.gradient_norm,
        })
    }

    /// Draws from `Normal(θ_MAP, H⁻¹)` with `H` the Hessian at the MAP.
    fn laplace_draws(
        &self,
        problem: &FitProblem<'_>,
        theta_map: &[f64],
        samples: usize,
    ) -> Result<Vec<ModelParameters>> {
        let hessian = finite_difference_hessian(|theta| problem.objective(theta).1, theta_map);
        let (factor, jitter) = cholesky_with_jitter(&hessian)?;
        if jitter > 0.0 {
            debug!(jitter, "posterior Hessian needed jitter");
        }

        let standard = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::ComputationError(e.to_string()))?;

        (0..samples)
            .into_par_iter()
            .map(|draw| {
                if let Some(token) = &self.cancel {
                    token.check()?;
                }
                let mut rng = draw_rng(self.seed, POSTERIOR_STREAM, draw);
                let z: Vec<f64> = (0..theta_map.len())
                    .map(|_| standard.sample(&mut rng))
                    .collect();
                let offset = solve_lower_transpose(&factor, &z);
                let theta: Vec<f64> = theta_map.iter().zip(&offset).map(|(a, b)| a + b).collect();
                Ok(problem.unpack(&theta))
            })
            .collect()
    }
}
