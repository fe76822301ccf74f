//! Holiday-aware sales forecast over twelve month ends.
//!
//! Run with: cargo run --example sales_forecast
//! Set `RUST_LOG=anofox_decompose=debug` to see fitting progress.

use anofox_decompose::prelude::*;
use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("=== anofox-decompose Sales Forecast ===\n");

    // 1. Daily sales around the holidays
    let rows = [
        ("2022-01-01", 100.5),
        ("2022-01-02", 120.0),
        ("2022-01-03", 150.2),
        ("2022-01-04", 110.8),
        ("2022-01-05", 95.5),
        ("2022-12-24", 250.0),
        ("2022-12-25", 350.0),
        ("2022-12-26", 200.0),
        ("2023-01-01", 180.0),
        ("2023-01-02", 150.0),
    ];
    let series =
        TimeSeries::from_observations(rows.iter().map(|(ts, v)| Observation::parse(ts, Some(*v))))
            .unwrap();
    println!("Loaded {} observations", series.len());

    // 2. Christmas and New Year's Day, each with the eve included
    let mut holidays = Vec::new();
    for year in 2022..=2024 {
        let christmas = NaiveDate::from_ymd_opt(year, 12, 25).unwrap();
        let new_year = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
        holidays.push(HolidayEvent::new("Christmas", christmas).with_window(-1, 0));
        holidays.push(HolidayEvent::new("New Year's Day", new_year).with_window(-1, 0));
    }

    let config = ForecastConfig::default()
        .with_holidays(holidays)
        .with_interval_width(0.95)
        .with_forecast_periods(12)
        .with_freq(Frequency::Month);

    // 3. Fit and inspect
    let mut model = DecomposedModel::new(config);
    model.fit(&series).unwrap();
    let snapshot = model.fitted_model().unwrap();

    println!("\n--- Fitted parameters ---");
    let params = snapshot.parameters();
    println!("Growth rate k: {:.4}", params.k);
    println!("Offset m:      {:.4}", params.m);
    println!("Noise sigma:   {:.4}", params.sigma);
    println!("Changepoints:  {}", snapshot.changepoints().len());
    for (name, beta) in snapshot.holiday_coefficients() {
        println!("  {:<20} {:+.4}", name, beta);
    }

    // 4. Forecast
    let forecast = model.forecast_configured().unwrap();

    println!("\n--- Forecast (95% intervals) ---");
    println!(
        "{:<12} {:>12} {:>12} {:>12}",
        "Date", "Forecast", "Lower", "Upper"
    );
    for row in forecast.rows() {
        println!(
            "{:<12} {:>12.2} {:>12.2} {:>12.2}",
            row.timestamp.date_naive(),
            row.yhat,
            row.yhat_lower,
            row.yhat_upper
        );
    }

    // 5. In-sample accuracy
    let fitted = model.fitted_values().unwrap();
    let metrics = calculate_metrics(series.values(), &fitted, None).unwrap();
    println!("\n--- In-sample accuracy ---");
    println!("MAE:   {:.4}", metrics.mae);
    println!("RMSE:  {:.4}", metrics.rmse);
    println!("SMAPE: {:.4}", metrics.smape);
}
