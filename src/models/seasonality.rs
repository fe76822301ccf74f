//! Seasonality model: which periodic components enter the fit, and their effects.

use crate::config::{ForecastConfig, SeasonalityToggle};
use crate::core::{ComponentSeries, TimeSeries};
use crate::error::Result;
use crate::regressors::{BlockKind, DesignMatrix, FeatureLayout, SeasonalComponent};
use chrono::Duration;
use tracing::debug;

struct Builtin {
    name: &'static str,
    period_days: f64,
    default_order: usize,
    /// Minimum history span, in days, for `Auto` to enable it.
    min_span_days: i64,
    /// `Auto` also requires observations spaced closer than this many days.
    max_spacing_days: Option<i64>,
}

const BUILTINS: [Builtin; 3] = [
    Builtin {
        name: "yearly",
        period_days: 365.25,
        default_order: 10,
        min_span_days: 730,
        max_spacing_days: None,
    },
    Builtin {
        name: "weekly",
        period_days: 7.0,
        default_order: 3,
        min_span_days: 14,
        max_spacing_days: Some(7),
    },
    Builtin {
        name: "daily",
        period_days: 1.0,
        default_order: 4,
        min_span_days: 2,
        max_spacing_days: Some(1),
    },
];

impl Builtin {
    fn auto_enabled(&self, span: Duration, spacing: Option<Duration>) -> bool {
        let dense = match (self.max_spacing_days, spacing) {
            (None, _) => true,
            (Some(max), Some(spacing)) => spacing < Duration::days(max),
            (Some(_), None) => false,
        };
        span >= Duration::days(self.min_span_days) && dense
    }
}

/// Built-in seasonalities enabled for this history, followed by custom ones.
pub fn resolve_seasonalities(
    config: &ForecastConfig,
    history: &TimeSeries,
) -> Result<Vec<SeasonalComponent>> {
    let span = history.span();
    let spacing = history.min_spacing();

    let mut components = Vec::new();
    for builtin in &BUILTINS {
        let toggle = config
            .builtin_toggle(builtin.name)
            .unwrap_or(SeasonalityToggle::Off);
        let order = match toggle {
            SeasonalityToggle::Off => None,
            SeasonalityToggle::On(order) => Some(order),
            SeasonalityToggle::Auto => {
                let enabled = builtin.auto_enabled(span, spacing);
                debug!(
                    seasonality = builtin.name,
                    enabled,
                    span_days = span.num_days(),
                    "auto seasonality"
                );
                enabled.then_some(builtin.default_order)
            }
        };
        if let Some(order) = order {
            components.push(SeasonalComponent::new(builtin.name, builtin.period_days, order));
        }
    }

    for custom in &config.seasonalities {
        custom.validate()?;
        components.push(custom.clone());
    }
    Ok(components)
}

/// Per-seasonality contribution on the scaled axis.
///
/// Multiplicative components are returned as fractions of the trend.
pub fn seasonal_effects(
    layout: &FeatureLayout,
    x: &DesignMatrix,
    beta: &[f64],
) -> Vec<ComponentSeries> {
    layout
        .blocks()
        .iter()
        .filter(|b| b.kind == BlockKind::Seasonality)
        .map(|block| ComponentSeries::new(block.name.clone(), x.block_effect(block, beta)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeasonalityMode;
    use chrono::{DateTime, TimeZone, Utc};

    fn series(step: Duration, n: usize) -> TimeSeries {
        let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let timestamps: Vec<DateTime<Utc>> = (0..n).map(|i| base + step * i as i32).collect();
        TimeSeries::univariate(timestamps, vec![1.0; n]).unwrap()
    }

    fn names(components: &[SeasonalComponent]) -> Vec<&str> {
        components.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn auto_enables_weekly_for_a_year_of_daily_data() {
        let history = series(Duration::days(1), 366);
        let components = resolve_seasonalities(&ForecastConfig::default(), &history).unwrap();
        assert_eq!(names(&components), vec!["weekly"]);
        assert_eq!(components[0].fourier_order, 3);
    }

    #[test]
    fn auto_enables_yearly_for_long_monthly_data() {
        let history = series(Duration::days(30), 36);
        let components = resolve_seasonalities(&ForecastConfig::default(), &history).unwrap();
        assert_eq!(names(&components), vec!["yearly"]);
    }

    #[test]
    fn auto_enables_daily_for_hourly_data() {
        let history = series(Duration::hours(1), 24 * 3);
        let components = resolve_seasonalities(&ForecastConfig::default(), &history).unwrap();
        assert_eq!(names(&components), vec!["daily"]);
    }

    #[test]
    fn explicit_toggles_override_auto() {
        let history = series(Duration::days(1), 30);
        let config = ForecastConfig::default()
            .with_weekly_seasonality(SeasonalityToggle::Off)
            .with_yearly_seasonality(SeasonalityToggle::On(4))
            .with_seasonality(SeasonalComponent::new("monthly", 30.5, 5));
        let components = resolve_seasonalities(&config, &history).unwrap();
        assert_eq!(names(&components), vec!["yearly", "monthly"]);
        assert_eq!(components[0].fourier_order, 4);
    }

    #[test]
    fn seasonal_effects_follow_blocks() {
        let history = series(Duration::days(1), 21);
        let components = resolve_seasonalities(&ForecastConfig::default(), &history).unwrap();
        let layout = FeatureLayout::new(
            components,
            SeasonalityMode::Additive,
            10.0,
            None,
            SeasonalityMode::Additive,
            10.0,
        );
        let x = layout.build(history.timestamps());
        let mut beta = vec![0.0; layout.n_columns()];
        beta[1] = 1.0; // weekly_cos1

        let effects = seasonal_effects(&layout, &x, &beta);
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].name, "weekly");
        assert_eq!(effects[0].values, x.column(1).to_vec());
    }
}
