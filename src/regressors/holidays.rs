//! Expansion of holiday declarations into indicator columns.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Widest window, in days on either side of a holiday.
pub const MAX_WINDOW_DAYS: i32 = 366;

/// A dated holiday with an inclusive window of day offsets around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayEvent {
    pub name: String,
    pub date: NaiveDate,
    /// Days before the holiday that share its effect (`<= 0`).
    #[serde(default)]
    pub lower_window: i32,
    /// Days after the holiday that share its effect (`>= 0`).
    #[serde(default)]
    pub upper_window: i32,
    #[serde(default)]
    pub prior_scale: Option<f64>,
}

impl HolidayEvent {
    pub fn new(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            date,
            lower_window: 0,
            upper_window: 0,
            prior_scale: None,
        }
    }

    pub fn with_window(mut self, lower_window: i32, upper_window: i32) -> Self {
        self.lower_window = lower_window;
        self.upper_window = upper_window;
        self
    }

    pub fn with_prior_scale(mut self, prior_scale: f64) -> Self {
        self.prior_scale = Some(prior_scale);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ForecastError::InvalidConfig(
                "holiday name must not be empty".to_string(),
            ));
        }
        if self.lower_window > 0 || self.upper_window < 0 {
            return Err(ForecastError::InvalidConfig(format!(
                "holiday '{}' on {} needs lower_window <= 0 <= upper_window, got [{}, {}]",
                self.name, self.date, self.lower_window, self.upper_window
            )));
        }
        if self.lower_window < -MAX_WINDOW_DAYS || self.upper_window > MAX_WINDOW_DAYS {
            return Err(ForecastError::InvalidConfig(format!(
                "holiday '{}' window [{}, {}] exceeds {} days",
                self.name, self.lower_window, self.upper_window, MAX_WINDOW_DAYS
            )));
        }
        for offset in [self.lower_window, self.upper_window] {
            if self.shifted(offset).is_none() {
                return Err(ForecastError::InvalidConfig(format!(
                    "holiday '{}' on {} shifted by {} days is out of the calendar range",
                    self.name, self.date, offset
                )));
            }
        }
        if let Some(scale) = self.prior_scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ForecastError::InvalidConfig(format!(
                    "holiday '{}' prior scale must be positive",
                    self.name
                )));
            }
        }
        Ok(())
    }

    fn shifted(&self, offset: i32) -> Option<NaiveDate> {
        self.date.checked_add_signed(Duration::days(i64::from(offset)))
    }

    /// Dates covered by the window, paired with their offsets.
    ///
    /// Offsets past the calendar range are skipped; `validate` rejects them.
    fn window_dates(&self) -> impl Iterator<Item = (i32, NaiveDate)> + '_ {
        (self.lower_window..=self.upper_window)
            .filter_map(move |offset| self.shifted(offset).map(|date| (offset, date)))
    }
}

/// One indicator column: holiday `name` shifted by `offset` days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayColumn {
    pub name: String,
    pub offset: i32,
    dates: BTreeSet<NaiveDate>,
}

impl HolidayColumn {
    /// Label such as `Christmas[-1]` or `Christmas[+0]`.
    pub fn column_name(&self) -> String {
        format!("{}[{:+}]", self.name, self.offset)
    }

    pub fn is_active(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}

/// Holiday declarations expanded to a fixed column layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayCalendar {
    /// Names in order of first declaration, with their prior scale (if set).
    holidays: Vec<(String, Option<f64>)>,
    columns: Vec<HolidayColumn>,
    covered: (NaiveDate, NaiveDate),
}

impl HolidayCalendar {
    /// Expand holiday events; returns `None` when there are none.
    ///
    /// Columns are grouped by holiday name in declaration order, offsets ascending.
    pub fn from_events(events: &[HolidayEvent]) -> Result<Option<Self>> {
        if events.is_empty() {
            return Ok(None);
        }

        let mut holidays: Vec<(String, Option<f64>)> = Vec::new();
        for event in events {
            event.validate()?;
            match holidays.iter_mut().find(|(name, _)| *name == event.name) {
                Some((_, scale)) => match (*scale, event.prior_scale) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(ForecastError::InvalidConfig(format!(
                            "holiday '{}' declares conflicting prior scales {} and {}",
                            event.name, a, b
                        )))
                    }
                    (None, Some(b)) => *scale = Some(b),
                    _ => {}
                },
                None => holidays.push((event.name.clone(), event.prior_scale)),
            }
        }

        let mut columns = Vec::new();
        for (name, _) in &holidays {
            let same_name: Vec<&HolidayEvent> =
                events.iter().filter(|e| e.name == *name).collect();
            let offsets: BTreeSet<i32> = same_name
                .iter()
                .flat_map(|e| e.lower_window..=e.upper_window)
                .collect();
            for offset in offsets {
                let dates = same_name
                    .iter()
                    .flat_map(|e| e.window_dates())
                    .filter(|(o, _)| *o == offset)
                    .map(|(_, d)| d)
                    .collect();
                columns.push(HolidayColumn {
                    name: name.clone(),
                    offset,
                    dates,
                });
            }
        }

        let all_dates = events.iter().flat_map(|e| e.window_dates().map(|(_, d)| d));
        let (lo, hi) = all_dates.fold((NaiveDate::MAX, NaiveDate::MIN), |(lo, hi), d| {
            (lo.min(d), hi.max(d))
        });

        Ok(Some(Self {
            holidays,
            columns,
            covered: (lo, hi),
        }))
    }

    pub fn columns(&self) -> &[HolidayColumn] {
        &self.columns
    }

    /// Holiday names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.holidays.iter().map(|(name, _)| name.as_str())
    }

    /// Prior scale declared for a holiday name, if any.
    pub fn prior_scale(&self, name: &str) -> Option<f64> {
        self.holidays
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, scale)| *scale)
    }

    /// First and last date touched by any holiday window.
    pub fn covered_range(&self) -> (NaiveDate, NaiveDate) {
        self.covered
    }

    /// Error if any timestamp falls outside the declared holiday range.
    pub fn check_coverage(&self, timestamps: &[DateTime<Utc>]) -> Result<()> {
        let (lo, hi) = self.covered;
        match timestamps
            .iter()
            .map(|ts| ts.date_naive())
            .find(|d| *d < lo || *d > hi)
        {
            Some(date) => Err(ForecastError::DateRange(format!(
                "{} is outside the declared holiday range {}..={}",
                date, lo, hi
            ))),
            None => Ok(()),
        }
    }

    /// Indicator columns for the given timestamps (column-major).
    pub fn features(&self, timestamps: &[DateTime<Utc>]) -> Vec<Vec<f64>> {
        let dates: Vec<NaiveDate> = timestamps.iter().map(|ts| ts.date_naive()).collect();
        self.columns
            .iter()
            .map(|column| {
                dates
                    .iter()
                    .map(|d| if column.is_active(*d) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect()
    }
}
