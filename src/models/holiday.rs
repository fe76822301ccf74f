//! Holiday effect model.

use crate::config::ForecastConfig;
use crate::core::ComponentSeries;
use crate::error::Result;
use crate::regressors::{BlockKind, DesignMatrix, FeatureLayout, HolidayCalendar};
use chrono::{DateTime, Utc};

/// Expand the configured holidays into a calendar (if any are declared).
pub fn resolve_holidays(config: &ForecastConfig) -> Result<Option<HolidayCalendar>> {
    HolidayCalendar::from_events(&config.holidays)
}

/// Enforce holiday coverage of the requested timestamps when configured.
///
/// Without the flag, dates outside the declared range simply carry no effect.
pub fn check_coverage(
    required: bool,
    layout: &FeatureLayout,
    timestamps: &[DateTime<Utc>],
) -> Result<()> {
    match layout.holiday_calendar() {
        Some(calendar) if required => calendar.check_coverage(timestamps),
        _ => Ok(()),
    }
}

/// Per-holiday effect (all window offsets summed) and the total across holidays.
pub fn holiday_effects(
    layout: &FeatureLayout,
    x: &DesignMatrix,
    beta: &[f64],
) -> (Vec<ComponentSeries>, Vec<f64>) {
    let mut total = vec![0.0; x.n_rows()];
    let effects = layout
        .blocks()
        .iter()
        .filter(|b| b.kind == BlockKind::Holiday)
        .map(|block| {
            let effect = x.block_effect(block, beta);
            for (acc, v) in total.iter_mut().zip(&effect) {
                *acc += v;
            }
            ComponentSeries::new(block.name.clone(), effect)
        })
        .collect();
    (effects, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeasonalityMode;
    use crate::regressors::HolidayEvent;
    use chrono::{NaiveDate, TimeZone};

    fn layout(config: &ForecastConfig) -> FeatureLayout {
        FeatureLayout::new(
            Vec::new(),
            SeasonalityMode::Additive,
            10.0,
            resolve_holidays(config).unwrap(),
            config.holidays_mode(),
            config.holidays_prior_scale,
        )
    }

    fn config() -> ForecastConfig {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        ForecastConfig::default()
            .with_holiday(HolidayEvent::new("Christmas", date(2022, 12, 25)).with_window(-1, 0))
            .with_holiday(HolidayEvent::new("Boxing Day", date(2022, 12, 26)))
    }

    #[test]
    fn effects_sum_window_offsets_per_holiday() {
        let config = config();
        let layout = layout(&config);
        let timestamps: Vec<_> = (24..=26)
            .map(|d| Utc.with_ymd_and_hms(2022, 12, d, 0, 0, 0).unwrap())
            .collect();
        let x = layout.build(&timestamps);

        // Christmas[-1], Christmas[+0], Boxing Day[+0]
        let beta = vec![1.0, 2.0, 5.0];
        let (effects, total) = holiday_effects(&layout, &x, &beta);

        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].name, "Christmas");
        assert_eq!(effects[0].values, vec![1.0, 2.0, 0.0]);
        assert_eq!(effects[1].values, vec![0.0, 0.0, 5.0]);
        assert_eq!(total, vec![1.0, 2.0, 5.0]);
    }

    #[test]
    fn coverage_is_only_enforced_on_request() {
        let config = config();
        let layout = layout(&config);
        let late = vec![Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()];
        assert!(check_coverage(false, &layout, &late).is_ok());
        assert!(check_coverage(true, &layout, &late).is_err());
    }
}
