//! Calendar frequencies for stepping beyond the observed history.
//!
//! Week, month and year steps are anchored: weeks end on Sunday, months on
//! the last calendar day and years on December 31. Generated timestamps keep
//! the time of day of the last observation.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Step size of future timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Day,
    /// Weekly, anchored on Sunday.
    Week,
    /// Calendar month ends.
    Month,
    /// Calendar year ends.
    Year,
}

impl Frequency {
    /// The first `periods` anchored timestamps strictly after `last`.
    pub fn future_timestamps(
        &self,
        last: DateTime<Utc>,
        periods: usize,
    ) -> Result<Vec<DateTime<Utc>>> {
        let time = last.time();
        let mut date = self.first_after(last.date_naive())?;
        let mut out = Vec::with_capacity(periods);
        for i in 0..periods {
            if i > 0 {
                date = self.advance(date)?;
            }
            out.push(date.and_time(time).and_utc());
        }
        Ok(out)
    }

    fn first_after(&self, date: NaiveDate) -> Result<NaiveDate> {
        match self {
            Frequency::Day => add_days(date, 1),
            Frequency::Week => {
                let ahead = 7 - u64::from(date.weekday().num_days_from_sunday());
                add_days(date, ahead)
            }
            Frequency::Month => {
                let end = month_end(date)?;
                if end > date {
                    Ok(end)
                } else {
                    self.advance(end)
                }
            }
            Frequency::Year => {
                let end = year_end(date.year())?;
                if end > date {
                    Ok(end)
                } else {
                    year_end(date.year() + 1)
                }
            }
        }
    }

    /// Next anchor after an anchored date.
    fn advance(&self, date: NaiveDate) -> Result<NaiveDate> {
        match self {
            Frequency::Day => add_days(date, 1),
            Frequency::Week => add_days(date, 7),
            Frequency::Month => {
                let next = first_of_month(date)?
                    .checked_add_months(Months::new(1))
                    .ok_or_else(out_of_range)?;
                month_end(next)
            }
            Frequency::Year => year_end(date.year() + 1),
        }
    }
}

fn out_of_range() -> ForecastError {
    ForecastError::TimestampError("future date out of representable range".to_string())
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days)).ok_or_else(out_of_range)
}

fn first_of_month(date: NaiveDate) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).ok_or_else(out_of_range)
}

fn month_end(date: NaiveDate) -> Result<NaiveDate> {
    first_of_month(date)?
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or_else(out_of_range)
}

fn year_end(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(out_of_range)
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frequency::Day => "day",
            Frequency::Week => "week",
            Frequency::Month => "month",
            Frequency::Year => "year",
        };
        f.write_str(name)
    }
}

impl FromStr for Frequency {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "daily" => Ok(Frequency::Day),
            "w" | "w-sun" | "week" | "weekly" => Ok(Frequency::Week),
            "m" | "me" | "month" | "monthly" => Ok(Frequency::Month),
            "y" | "a" | "ye" | "year" | "yearly" | "annual" => Ok(Frequency::Year),
            other => Err(ForecastError::InvalidConfig(format!(
                "unknown frequency '{}'",
                other
            ))),
        }
    }
}
