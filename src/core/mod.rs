//! Core data structures for time series forecasting.

mod cancel;
mod forecast;
mod frequency;
mod time_series;

pub use cancel::CancellationToken;
pub use forecast::{ComponentSeries, Forecast, ForecastComponents, ForecastRow};
pub use frequency::Frequency;
pub use time_series::{parse_timestamp, Observation, TimeSeries};
