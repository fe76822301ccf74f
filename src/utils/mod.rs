//! Numerical and evaluation utilities.

pub mod cross_validation;
pub mod linalg;
pub mod metrics;
pub mod optimization;
pub mod stats;

pub use cross_validation::{
    cross_validate, AggregatedMetrics, CVConfig, CVFold, CVResults, CVStrategy,
};
pub use metrics::{calculate_metrics, forecast_metrics, AccuracyMetrics, IntervalBounds};
pub use optimization::{lbfgs, LbfgsConfig, LbfgsResult, Termination};
pub use stats::{quantile, quantile_normal};
