//! Scaling of timestamps and values onto the unit interval used for fitting.

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Minimum number of valid observations required to fit.
pub const MIN_OBSERVATIONS: usize = 2;

/// Affine maps fixed from the history at fit time.
///
/// Time: `t = (ts - start) / (end - start)`, so the history spans `[0, 1]`.
/// Values: `y_s = (y - floor) / y_scale` with `y_scale = max |y - floor|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeIndex {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    t_scale_seconds: f64,
    floor: f64,
    y_scale: f64,
}

impl TimeIndex {
    /// Derive the scaling from a sanitized history.
    pub fn fit(history: &TimeSeries, floor: f64) -> Result<Self> {
        let (start, end) = match (history.first_timestamp(), history.last_timestamp()) {
            (Some(start), Some(end)) if history.len() >= MIN_OBSERVATIONS => (start, end),
            _ => {
                return Err(ForecastError::EmptySeries {
                    needed: MIN_OBSERVATIONS,
                    got: history.len(),
                })
            }
        };

        let t_scale_seconds = seconds_between(start, end);
        if t_scale_seconds <= 0.0 {
            return Err(ForecastError::TimestampError(
                "history must span a positive duration".to_string(),
            ));
        }

        let y_scale = history
            .values()
            .iter()
            .map(|y| (y - floor).abs())
            .fold(0.0, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        Ok(Self {
            start,
            end,
            t_scale_seconds,
            floor,
            y_scale,
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn y_scale(&self) -> f64 {
        self.y_scale
    }

    pub fn scaled_time(&self, ts: DateTime<Utc>) -> f64 {
        seconds_between(self.start, ts) / self.t_scale_seconds
    }

    pub fn scaled_times(&self, timestamps: &[DateTime<Utc>]) -> Vec<f64> {
        timestamps.iter().map(|ts| self.scaled_time(*ts)).collect()
    }

    /// Inverse of [`scaled_time`](Self::scaled_time), to the nearest nanosecond.
    pub fn timestamp_at(&self, t: f64) -> DateTime<Utc> {
        let nanos = (t * self.t_scale_seconds * 1e9).round() as i64;
        self.start + Duration::nanoseconds(nanos)
    }

    pub fn scale_value(&self, y: f64) -> f64 {
        (y - self.floor) / self.y_scale
    }

    pub fn unscale_value(&self, y_s: f64) -> f64 {
        y_s * self.y_scale + self.floor
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) * 1e-9
}
