//! Optimization utilities for parameter estimation.

use crate::core::CancellationToken;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Gradient infinity norm fell below the tolerance.
    GradientTolerance,
    /// Relative objective improvement fell below the tolerance.
    ObjectiveTolerance,
    /// No step along a descent direction decreased the objective.
    LineSearchStalled,
    /// Iteration budget exhausted.
    MaxIterations,
}

impl Termination {
    pub fn is_converged(&self) -> bool {
        !matches!(self, Termination::MaxIterations)
    }
}

/// Result of L-BFGS optimization.
#[derive(Debug, Clone)]
pub struct LbfgsResult {
    /// The optimal point found.
    pub optimal_point: Vec<f64>,
    /// The objective function value at the optimal point.
    pub optimal_value: f64,
    /// Infinity norm of the gradient at the optimal point.
    pub gradient_norm: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    pub termination: Termination,
    /// Whether the algorithm converged.
    pub converged: bool,
}

/// Configuration for L-BFGS optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LbfgsConfig {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Number of correction pairs kept (default: 10).
    pub memory: usize,
    /// Stop when the gradient infinity norm drops below this.
    pub grad_tolerance: f64,
    /// Stop when `|f_prev - f| <= ftol * max(1, |f|)`.
    pub ftol: f64,
    /// Armijo sufficient-decrease constant (default: 1e-4).
    pub c1: f64,
    /// Maximum step halvings per line search.
    pub max_line_search: usize,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            memory: 10,
            grad_tolerance: 1e-6,
            ftol: 1e-10,
            c1: 1e-4,
            max_line_search: 40,
        }
    }
}

impl LbfgsConfig {
    /// Looser tolerances and a doubled budget for a second attempt.
    pub fn relaxed(&self) -> Self {
        Self {
            max_iter: self.max_iter.saturating_mul(2),
            grad_tolerance: self.grad_tolerance * 100.0,
            ftol: self.ftol * 100.0,
            ..self.clone()
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

/// Two-loop recursion: approximate `-H⁻¹ g` from the stored correction pairs.
fn lbfgs_direction(
    g: &[f64],
    s_hist: &VecDeque<Vec<f64>>,
    y_hist: &VecDeque<Vec<f64>>,
) -> Vec<f64> {
    let k = s_hist.len();
    let mut q = g.to_vec();
    let mut alphas = vec![0.0; k];
    let rhos: Vec<f64> = (0..k).map(|i| 1.0 / dot(&s_hist[i], &y_hist[i])).collect();

    for i in (0..k).rev() {
        let a = rhos[i] * dot(&s_hist[i], &q);
        for (qj, yj) in q.iter_mut().zip(&y_hist[i]) {
            *qj -= a * yj;
        }
        alphas[i] = a;
    }

    if let (Some(s), Some(y)) = (s_hist.back(), y_hist.back()) {
        let gamma = dot(s, y) / dot(y, y);
        for qj in q.iter_mut() {
            *qj *= gamma;
        }
    }

    for i in 0..k {
        let b = rhos[i] * dot(&y_hist[i], &q);
        for (qj, sj) in q.iter_mut().zip(&s_hist[i]) {
            *qj += sj * (alphas[i] - b);
        }
    }

    q.iter_mut().for_each(|v| *v = -*v);
    q
}

/// Minimize a smooth function with limited-memory BFGS and Armijo backtracking.
///
/// `objective` returns the value and gradient at a point. Running out of
/// iterations is reported through [`LbfgsResult::converged`], not as an error;
/// errors are reserved for cancellation and a non-finite starting point.
///
/// # Example
/// ```
/// use anofox_decompose::utils::optimization::{lbfgs, LbfgsConfig};
///
/// // Minimize (x-2)^2 + 10(y-3)^2
/// let result = lbfgs(
///     |x| {
///         let f = (x[0] - 2.0).powi(2) + 10.0 * (x[1] - 3.0).powi(2);
///         (f, vec![2.0 * (x[0] - 2.0), 20.0 * (x[1] - 3.0)])
///     },
///     &[0.0, 0.0],
///     &LbfgsConfig::default(),
///     None,
/// )
/// .unwrap();
///
/// assert!(result.converged);
/// assert!((result.optimal_point[0] - 2.0).abs() < 1e-4);
/// assert!((result.optimal_point[1] - 3.0).abs() < 1e-4);
/// ```
pub fn lbfgs<F>(
    mut objective: F,
    initial: &[f64],
    config: &LbfgsConfig,
    cancel: Option<&CancellationToken>,
) -> Result<LbfgsResult>
where
    F: FnMut(&[f64]) -> (f64, Vec<f64>),
{
    let mut x = initial.to_vec();
    let (mut f, mut g) = objective(&x);
    if !f.is_finite() || g.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::ComputationError(
            "objective is not finite at the starting point".to_string(),
        ));
    }

    let memory = config.memory.max(1);
    let mut s_hist: VecDeque<Vec<f64>> = VecDeque::with_capacity(memory);
    let mut y_hist: VecDeque<Vec<f64>> = VecDeque::with_capacity(memory);

    let finish = |x: Vec<f64>, f: f64, g: &[f64], iterations: usize, termination: Termination| {
        LbfgsResult {
            optimal_point: x,
            optimal_value: f,
            gradient_norm: inf_norm(g),
            iterations,
            termination,
            converged: termination.is_converged(),
        }
    };

    let mut iterations = 0;
    while iterations < config.max_iter {
        if let Some(token) = cancel {
            token.check()?;
        }
        if inf_norm(&g) < config.grad_tolerance {
            return Ok(finish(x, f, &g, iterations, Termination::GradientTolerance));
        }
        iterations += 1;

        let mut direction = lbfgs_direction(&g, &s_hist, &y_hist);
        let mut slope = dot(&direction, &g);
        if !(slope < 0.0) || !slope.is_finite() {
            s_hist.clear();
            y_hist.clear();
            direction = g.iter().map(|v| -v).collect();
            slope = -dot(&g, &g);
        }

        let mut step = if s_hist.is_empty() {
            (1.0 / dot(&g, &g).sqrt()).min(1.0)
        } else {
            1.0
        };

        let mut accepted = None;
        for _ in 0..config.max_line_search {
            let candidate: Vec<f64> = x
                .iter()
                .zip(&direction)
                .map(|(xi, di)| xi + step * di)
                .collect();
            let (f_new, g_new) = objective(&candidate);
            if f_new.is_finite()
                && g_new.iter().all(|v| v.is_finite())
                && f_new <= f + config.c1 * step * slope
            {
                accepted = Some((candidate, f_new, g_new));
                break;
            }
            step *= 0.5;
        }

        let Some((x_new, f_new, g_new)) = accepted else {
            if s_hist.is_empty() {
                return Ok(finish(x, f, &g, iterations, Termination::LineSearchStalled));
            }
            // Quasi-Newton direction failed; retry from steepest descent.
            s_hist.clear();
            y_hist.clear();
            continue;
        };

        let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
        if dot(&s, &y) > 1e-10 {
            if s_hist.len() == memory {
                s_hist.pop_front();
                y_hist.pop_front();
            }
            s_hist.push_back(s);
            y_hist.push_back(y);
        }

        let f_prev = f;
        x = x_new;
        f = f_new;
        g = g_new;

        if (f_prev - f).abs() <= config.ftol * f.abs().max(1.0) {
            return Ok(finish(x, f, &g, iterations, Termination::ObjectiveTolerance));
        }
    }

    if inf_norm(&g) < config.grad_tolerance {
        return Ok(finish(x, f, &g, iterations, Termination::GradientTolerance));
    }
    Ok(finish(x, f, &g, iterations, Termination::MaxIterations))
}

/// Central finite-difference Jacobian of a vector-valued gradient, symmetrised.
///
/// Used to approximate the Hessian of an objective from its analytic gradient.
pub fn finite_difference_hessian<G>(mut gradient: G, x: &[f64]) -> Vec<Vec<f64>>
where
    G: FnMut(&[f64]) -> Vec<f64>,
{
    let n = x.len();
    let mut hessian = vec![vec![0.0; n]; n];
    let mut point = x.to_vec();
    for j in 0..n {
        let h = 1e-5 * x[j].abs().max(1.0);
        point[j] = x[j] + h;
        let plus = gradient(&point);
        point[j] = x[j] - h;
        let minus = gradient(&point);
        point[j] = x[j];
        for i in 0..n {
            hessian[i][j] = (plus[i] - minus[i]) / (2.0 * h);
        }
    }
    super::linalg::symmetrize(&mut hessian);
    hessian
}
