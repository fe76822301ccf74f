//! TimeSeries data structure for representing the observed history.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// A single raw observation as delivered by a data loader.
///
/// Either side may be missing; such rows are dropped when the series is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub timestamp: Option<DateTime<Utc>>,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp: Some(timestamp),
            value: Some(value),
        }
    }

    /// Parse the timestamp from text; unparseable text counts as missing.
    pub fn parse(timestamp: &str, value: Option<f64>) -> Self {
        Self {
            timestamp: parse_timestamp(timestamp).ok(),
            value,
        }
    }

    fn is_valid(&self) -> bool {
        self.timestamp.is_some() && self.value.is_some_and(f64::is_finite)
    }
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or RFC 3339 text into a UTC timestamp.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ForecastError::TimestampError(format!("cannot parse '{}'", text)))
}

/// A univariate time series with strictly increasing timestamps.
///
/// Values may contain NaN to mark missing observations; those rows are
/// excluded from fitting by [`TimeSeries::sanitized`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Create a univariate series; timestamps must be strictly increasing.
    pub fn univariate(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }
        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(ForecastError::TimestampError(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }
        Ok(Self { timestamps, values })
    }

    /// Build a series from raw observations.
    ///
    /// Rows with a missing timestamp or a missing/non-finite value are dropped,
    /// the rest are sorted by timestamp. Duplicate timestamps are rejected.
    pub fn from_observations<I>(observations: I) -> Result<Self>
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut rows: Vec<(DateTime<Utc>, f64)> = observations
            .into_iter()
            .filter(Observation::is_valid)
            .filter_map(|o| Some((o.timestamp?, o.value?)))
            .collect();
        rows.sort_by_key(|(ts, _)| *ts);

        if let Some(w) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(ForecastError::TimestampError(format!(
                "duplicate timestamp {}",
                w[0].0
            )));
        }

        let (timestamps, values) = rows.into_iter().unzip();
        Ok(Self { timestamps, values })
    }

    /// Get the number of observations.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Get timestamps.
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Get values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Time between the first and last observation.
    pub fn span(&self) -> Duration {
        match (self.first_timestamp(), self.last_timestamp()) {
            (Some(first), Some(last)) => last - first,
            _ => Duration::zero(),
        }
    }

    /// Smallest spacing between consecutive observations.
    pub fn min_spacing(&self) -> Option<Duration> {
        self.timestamps.windows(2).map(|w| w[1] - w[0]).min()
    }

    /// Extract a slice of the time series.
    pub fn slice(&self, start: usize, end: usize) -> Result<TimeSeries> {
        if start > end {
            return Err(ForecastError::InvalidConfig(
                "slice start must be <= end".to_string(),
            ));
        }
        if end > self.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.len(),
                got: end,
            });
        }
        Ok(TimeSeries {
            timestamps: self.timestamps[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
        })
    }

    /// Observations at or before `cutoff`.
    pub fn until(&self, cutoff: DateTime<Utc>) -> TimeSeries {
        let end = self.timestamps.partition_point(|ts| *ts <= cutoff);
        TimeSeries {
            timestamps: self.timestamps[..end].to_vec(),
            values: self.values[..end].to_vec(),
        }
    }

    /// Check if series has missing values (NaN or Inf).
    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    /// Return a copy with missing (non-finite) observations dropped.
    pub fn sanitized(&self) -> TimeSeries {
        let (timestamps, values) = self
            .timestamps
            .iter()
            .zip(self.values.iter())
            .filter(|(_, v)| v.is_finite())
            .map(|(ts, v)| (*ts, *v))
            .unzip();
        TimeSeries { timestamps, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_daily_timestamps(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::days(i as i64)).collect()
    }

    #[test]
    fn time_series_constructs_univariate_data() {
        let timestamps = make_daily_timestamps(5);
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        let ts = TimeSeries::univariate(timestamps.clone(), values.clone()).unwrap();

        assert_eq!(ts.len(), 5);
        assert!(!ts.is_empty());
        assert_eq!(ts.values(), &values);
        assert_eq!(ts.timestamps(), &timestamps);
        assert_eq!(ts.span(), Duration::days(4));
        assert_eq!(ts.min_spacing(), Some(Duration::days(1)));
    }

    #[test]
    fn time_series_rejects_unordered_timestamps() {
        let mut timestamps = make_daily_timestamps(3);
        timestamps.swap(0, 1);
        let result = TimeSeries::univariate(timestamps, vec![1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(ForecastError::TimestampError(_))));
    }

    #[test]
    fn time_series_rejects_length_mismatch() {
        let result = TimeSeries::univariate(make_daily_timestamps(3), vec![1.0, 2.0]);
        assert_eq!(
            result.unwrap_err(),
            ForecastError::DimensionMismatch {
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn from_observations_drops_missing_and_sorts() {
        let ts = make_daily_timestamps(4);
        let observations = vec![
            Observation::new(ts[2], 3.0),
            Observation {
                timestamp: None,
                value: Some(9.0),
            },
            Observation::new(ts[0], 1.0),
            Observation {
                timestamp: Some(ts[1]),
                value: None,
            },
            Observation::new(ts[3], f64::NAN),
        ];

        let series = TimeSeries::from_observations(observations).unwrap();
        assert_eq!(series.timestamps(), &[ts[0], ts[2]]);
        assert_eq!(series.values(), &[1.0, 3.0]);
    }

    #[test]
    fn from_observations_rejects_duplicates() {
        let ts = make_daily_timestamps(1);
        let result = TimeSeries::from_observations(vec![
            Observation::new(ts[0], 1.0),
            Observation::new(ts[0], 2.0),
        ]);
        assert!(matches!(result, Err(ForecastError::TimestampError(_))));
    }

    #[test]
    fn parse_timestamp_accepts_common_formats() {
        let expected = Utc.with_ymd_and_hms(2022, 12, 25, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2022-12-25").unwrap(), expected);
        assert_eq!(parse_timestamp("2022-12-25 00:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2022-12-25T00:00:00Z").unwrap(), expected);
        assert!(parse_timestamp("25/12/2022").is_err());

        let obs = Observation::parse("not a date", Some(1.0));
        assert!(obs.timestamp.is_none());
    }

    #[test]
    fn sanitized_removes_non_finite_values() {
        let timestamps = make_daily_timestamps(4);
        let ts =
            TimeSeries::univariate(timestamps, vec![1.0, f64::NAN, 3.0, f64::INFINITY]).unwrap();
        assert!(ts.has_missing_values());

        let clean = ts.sanitized();
        assert_eq!(clean.len(), 2);
        assert_eq!(clean.values(), &[1.0, 3.0]);
        assert!(!clean.has_missing_values());
    }

    #[test]
    fn slice_and_until_select_prefixes() {
        let timestamps = make_daily_timestamps(5);
        let ts = TimeSeries::univariate(timestamps.clone(), vec![1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap();

        let sliced = ts.slice(1, 3).unwrap();
        assert_eq!(sliced.values(), &[2.0, 3.0]);
        assert!(ts.slice(3, 1).is_err());
        assert!(ts.slice(0, 6).is_err());

        let prefix = ts.until(timestamps[2]);
        assert_eq!(prefix.values(), &[1.0, 2.0, 3.0]);
    }
}
