//! Forecasting models.
//!
//! [`DecomposedModel`] ties the component models together: the trend,
//! seasonality and holiday models define the regressors, the estimator fits
//! their parameters and the simulator turns them into forecast intervals.

mod traits;

pub mod decomposed;
pub mod estimator;
pub mod holiday;
pub mod seasonality;
pub mod simulator;
pub mod trend;

pub use decomposed::{DecomposedModel, FittedModel};
pub use estimator::{Estimate, Estimator, FitProblem, ModelParameters};
pub use simulator::{SimulatedIntervals, SimulationInput, UncertaintySimulator};
pub use traits::{BoxedForecaster, Forecaster};
pub use trend::{PiecewiseTrend, TrendShape};
