//! Accuracy metrics for forecast evaluation.

use crate::core::Forecast;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Accuracy metrics for evaluating forecast performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error (None if zeros in actual)
    pub mape: Option<f64>,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
    /// R-squared (coefficient of determination)
    pub r_squared: f64,
    /// Share of actuals inside `[lower, upper]` (None without intervals)
    pub coverage: Option<f64>,
}

/// Interval bounds aligned with the predictions.
#[derive(Debug, Clone, Copy)]
pub struct IntervalBounds<'a> {
    pub lower: &'a [f64],
    pub upper: &'a [f64],
}

/// Calculate accuracy metrics between actual and predicted values.
///
/// # Arguments
/// * `actual` - Actual observed values
/// * `predicted` - Predicted/forecast values
/// * `intervals` - Optional interval bounds for the coverage metric
pub fn calculate_metrics(
    actual: &[f64],
    predicted: &[f64],
    intervals: Option<IntervalBounds<'_>>,
) -> Result<AccuracyMetrics> {
    if actual.is_empty() || predicted.is_empty() {
        return Err(ForecastError::EmptySeries {
            needed: 1,
            got: 0,
        });
    }
    check_len(actual.len(), predicted.len())?;

    let n = actual.len() as f64;

    let mae = mae(actual, predicted);
    let mse = mse(actual, predicted);
    let rmse = mse.sqrt();

    // MAPE (only if no zeros in actual)
    let mape = if actual.contains(&0.0) {
        None
    } else {
        let sum: f64 = actual
            .iter()
            .zip(predicted.iter())
            .map(|(a, p)| ((a - p) / a).abs())
            .sum();
        Some(100.0 * sum / n)
    };

    let smape = smape(actual, predicted);

    // R-squared
    let mean_actual = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
    let ss_res = mse * n;
    let r_squared = if ss_tot == 0.0 {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    };

    let coverage = match intervals {
        Some(bounds) => Some(coverage(actual, bounds)?),
        None => None,
    };

    Ok(AccuracyMetrics {
        mae,
        mse,
        rmse,
        mape,
        smape,
        r_squared,
        coverage,
    })
}

/// Metrics of the future rows of `forecast` against `actual`, row for row.
pub fn forecast_metrics(forecast: &Forecast, actual: &[f64]) -> Result<AccuracyMetrics> {
    let start = forecast.in_sample_len();
    calculate_metrics(
        actual,
        &forecast.point()[start..],
        Some(IntervalBounds {
            lower: &forecast.lower()[start..],
            upper: &forecast.upper()[start..],
        }),
    )
}

fn check_len(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(ForecastError::DimensionMismatch { expected, got });
    }
    Ok(())
}

fn coverage(actual: &[f64], bounds: IntervalBounds<'_>) -> Result<f64> {
    check_len(actual.len(), bounds.lower.len())?;
    check_len(actual.len(), bounds.upper.len())?;
    let inside = actual
        .iter()
        .zip(bounds.lower.iter().zip(bounds.upper))
        .filter(|(a, (lo, hi))| *lo <= *a && *a <= *hi)
        .count();
    Ok(inside as f64 / actual.len() as f64)
}

/// Calculate MAE between two slices.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Calculate MSE between two slices.
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// Calculate RMSE between two slices.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

/// Calculate SMAPE between two slices.
pub fn smape(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    let n = actual.len() as f64;
    actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| {
            let denom = a.abs() + p.abs();
            if denom == 0.0 {
                0.0
            } else {
                2.0 * (a - p).abs() / denom
            }
        })
        .sum::<f64>()
        * 100.0
        / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn calculate_metrics_perfect_prediction() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let predicted = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        let metrics = calculate_metrics(&actual, &predicted, None).unwrap();

        assert_relative_eq!(metrics.mae, 0.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.rmse, 0.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.smape, 0.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.r_squared, 1.0, epsilon = 1e-10);
        assert!(metrics.coverage.is_none());
    }

    #[test]
    fn calculate_metrics_known_values() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let predicted = vec![1.5, 2.5, 2.5, 4.5, 4.5];

        let metrics = calculate_metrics(&actual, &predicted, None).unwrap();

        assert_relative_eq!(metrics.mae, 0.5, epsilon = 1e-10);
        assert_relative_eq!(metrics.mse, 0.25, epsilon = 1e-10);
        assert_relative_eq!(metrics.rmse, 0.5, epsilon = 1e-10);
        // 1 - 1.25 / 10
        assert_relative_eq!(metrics.r_squared, 0.875, epsilon = 1e-10);
    }

    #[test]
    fn mape_is_skipped_with_zero_actuals() {
        let actual = vec![0.0, 1.0, 2.0];
        let predicted = vec![0.1, 1.1, 2.1];

        let metrics = calculate_metrics(&actual, &predicted, None).unwrap();

        assert!(metrics.mape.is_none());
        assert!(metrics.smape.is_finite());
    }

    #[test]
    fn coverage_counts_actuals_inside_bounds() {
        let actual = vec![1.0, 2.0, 3.0, 4.0];
        let predicted = vec![1.0, 2.0, 3.0, 4.0];
        let lower = vec![0.5, 2.5, 2.0, 4.0];
        let upper = vec![1.5, 3.0, 4.0, 4.0];

        let metrics = calculate_metrics(
            &actual,
            &predicted,
            Some(IntervalBounds {
                lower: &lower,
                upper: &upper,
            }),
        )
        .unwrap();
        assert_relative_eq!(metrics.coverage.unwrap(), 0.75);
    }

    #[test]
    fn calculate_metrics_dimension_mismatch() {
        let result = calculate_metrics(&[1.0, 2.0, 3.0], &[1.0, 2.0], None);
        assert!(matches!(
            result,
            Err(ForecastError::DimensionMismatch { .. })
        ));

        let bounds = IntervalBounds {
            lower: &[0.0],
            upper: &[2.0, 3.0],
        };
        let result = calculate_metrics(&[1.0, 2.0], &[1.0, 2.0], Some(bounds));
        assert!(matches!(
            result,
            Err(ForecastError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn calculate_metrics_empty_data() {
        let result = calculate_metrics(&[], &[], None);
        assert!(matches!(result, Err(ForecastError::EmptySeries { .. })));
    }

    #[test]
    fn standalone_helpers() {
        assert_relative_eq!(mae(&[1.0, 2.0, 3.0], &[1.5, 2.5, 3.5]), 0.5);
        assert_relative_eq!(rmse(&[1.0, 2.0, 3.0], &[2.0, 3.0, 4.0]), 1.0);
        assert_relative_eq!(smape(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert!(mae(&[1.0], &[]).is_nan());
    }

    #[test]
    fn r_squared_negative_for_poor_model() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let predicted = vec![5.0, 4.0, 3.0, 2.0, 1.0];

        let metrics = calculate_metrics(&actual, &predicted, None).unwrap();

        assert!(metrics.r_squared < 0.0);
    }
}
