//! Shared forecast pipeline used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> preparation -> calendar -> fit -> predict -> residuals
//! (-> independent backtest fit)
//!
//! The front-end in `app` then only deals with presentation and exports.

use chrono::NaiveDate;
use tracing::info;

use crate::domain::{BacktestSplit, ComponentPoint, ForecastPoint, ModelConfig, Observation, PreparedSeries, RunConfig};
use crate::error::Result;
use crate::fit::{BacktestResult, Backtester, FittedModel, ForecastModel};
use crate::io::{load_calendar, load_rows, SeriesPreparer};
use crate::models::EventCalendar;
use crate::report::{compute_residuals, rank_outliers, Outliers, Residual};

/// All computed outputs of one forecast run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub prepared: PreparedSeries,
    pub calendar: EventCalendar,
    pub fitted: FittedModel,
    pub forecast: Vec<ForecastPoint>,
    pub components: Vec<ComponentPoint>,
    pub residuals: Vec<Residual>,
    pub outliers: Outliers,
    pub backtest: Option<BacktestResult>,
}

/// Read, prepare and calendar-load the inputs named by a run config.
pub fn load_inputs(config: &RunConfig) -> Result<(PreparedSeries, EventCalendar)> {
    let ingested = load_rows(&config.csv_path, config.format, config.region.as_deref())?;
    let prepared = SeriesPreparer::new(config.min_observations).prepare(&ingested.rows)?;
    let calendar = match &config.events_path {
        Some(path) => load_calendar(path)?,
        None => EventCalendar::new(),
    };
    Ok((prepared, calendar))
}

/// Execute the full forecast pipeline from a CSV.
pub fn run_forecast(config: &RunConfig) -> Result<RunOutput> {
    let (prepared, calendar) = load_inputs(config)?;
    run_forecast_on(prepared, calendar, config)
}

/// Execute the forecast pipeline on an already prepared series.
pub fn run_forecast_on(prepared: PreparedSeries, calendar: EventCalendar, config: &RunConfig) -> Result<RunOutput> {
    let model = ForecastModel::new(config.model.clone())?;
    let observations = &prepared.observations;
    let fitted = model.fit(observations, &calendar)?;

    let forecast = if config.include_history {
        model.predict_with_history(&fitted, observations, config.horizon)?
    } else {
        model.predict(&fitted, &fitted.trend().future_dates(config.horizon))?
    };
    let component_dates: Vec<NaiveDate> = forecast.iter().map(|p| p.date).collect();
    let components = model.components(&fitted, &component_dates);

    let residuals = compute_residuals(observations, &fitted)?;
    let outliers = rank_outliers(&residuals, config.top_n);

    // Independent second fit: the primary model above is never touched.
    let backtest = match config.backtest {
        Some(split) => Some(run_backtest_on(observations, &calendar, &config.model, split)?),
        None => None,
    };

    info!(horizon = config.horizon, points = forecast.len(), "forecast complete");
    Ok(RunOutput {
        prepared,
        calendar,
        fitted,
        forecast,
        components,
        residuals,
        outliers,
        backtest,
    })
}

/// Backtest a prepared series.
pub fn run_backtest_on(
    observations: &[Observation],
    calendar: &EventCalendar,
    model: &ModelConfig,
    split: BacktestSplit,
) -> Result<BacktestResult> {
    let split_date = match split {
        BacktestSplit::Date(date) => date,
        BacktestSplit::HoldoutDays(days) => Backtester::split_for_holdout(observations, days)?,
    };
    Backtester::new(model.clone(), calendar.clone()).evaluate(observations, split_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InputFormat;
    use std::io::Write;
    use std::path::PathBuf;

    fn run_config(csv: PathBuf, events: Option<PathBuf>) -> RunConfig {
        RunConfig {
            csv_path: csv,
            format: InputFormat::Auto,
            region: None,
            events_path: events,
            min_observations: 14,
            horizon: 21,
            include_history: false,
            backtest: Some(BacktestSplit::HoldoutDays(14)),
            model: ModelConfig::default(),
            top_n: 3,
            rows: 30,
            export_forecast: None,
            export_components: None,
            export_model: None,
            export_backtest: None,
        }
    }

    fn write_series(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("cases.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "date,value").unwrap();
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        for i in 0..150i64 {
            let weekly = if i % 7 == 5 { -40.0 } else { 0.0 };
            writeln!(file, "{},{}", start + chrono::Duration::days(i), 200.0 + 6.0 * i as f64 + weekly).unwrap();
        }
        path
    }

    #[test]
    fn csv_to_forecast_with_backtest() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_series(&dir);
        let events = dir.path().join("events.json");
        std::fs::write(&events, r#"[{"name": "lockdown", "date": "2020-04-15", "upper_window": 1}]"#).unwrap();

        let out = run_forecast(&run_config(csv, Some(events))).unwrap();
        assert_eq!(out.prepared.observations.len(), 150);
        assert_eq!(out.forecast.len(), 21);
        assert_eq!(out.components.len(), 21);
        assert_eq!(out.forecast[0].date, out.fitted.last_observed() + chrono::Duration::days(1));
        assert!(out.fitted.event_coefficient("lockdown").is_some());
        assert_eq!(out.residuals.len(), 150);

        let backtest = out.backtest.unwrap();
        assert_eq!(backtest.test_len(), 14);
        assert_eq!(backtest.train_len, 136);
        assert_ne!(backtest.fitted.last_observed(), out.fitted.last_observed());
    }

    #[test]
    fn history_is_included_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = run_config(write_series(&dir), None);
        config.include_history = true;
        config.backtest = None;
        let out = run_forecast(&config).unwrap();
        assert_eq!(out.forecast.len(), 150 + 21);
        assert!(out.backtest.is_none());
    }
}
