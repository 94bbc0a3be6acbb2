//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - initializes logging
//! - parses CLI arguments
//! - runs the forecast/backtest pipeline
//! - prints reports
//! - writes optional exports

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{BacktestArgs, Command, DemoArgs, ForecastArgs, InputArgs, PredictArgs};
use crate::data::synthetic::{generate, SyntheticSpec};
use crate::domain::{BacktestSplit, InputFormat, ModelConfig, RawRow, RunConfig};
use crate::error::Result;
use crate::fit::ForecastModel;
use crate::io::{ModelFile, SeriesPreparer, DEFAULT_MIN_OBSERVATIONS};
use crate::models::EventCalendar;

pub mod pipeline;

/// Entry point for the `cf` binary.
pub fn run() -> Result<()> {
    init_tracing();
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Forecast(args) => handle_forecast(args),
        Command::Backtest(args) => handle_backtest(args),
        Command::Predict(args) => handle_predict(args),
        Command::Demo(args) => handle_demo(args),
    }
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` overrides
/// the default `case_forecast=info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("case_forecast=info"));
    // A second init (e.g. in tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_forecast(args: ForecastArgs) -> Result<()> {
    let config = run_config_from_args(&args);
    let run = pipeline::run_forecast(&config)?;
    report_run(&run, &config)
}

fn report_run(run: &pipeline::RunOutput, config: &RunConfig) -> Result<()> {
    println!(
        "{}",
        crate::report::format_fit_summary(&run.prepared, &run.fitted, &config.model)
    );
    println!("{}", crate::report::format_forecast(&run.forecast, config.rows));
    if config.top_n > 0 {
        println!("{}", crate::report::format_outliers(&run.outliers));
    }
    if let Some(backtest) = &run.backtest {
        println!("{}", crate::report::format_backtest(backtest));
    }

    // Optional exports.
    if let Some(path) = &config.export_forecast {
        crate::io::write_forecast_csv(path, &run.forecast)?;
        info!(path = %path.display(), "forecast exported");
    }
    if let Some(path) = &config.export_components {
        crate::io::write_components_csv(path, &run.components, &run.calendar.names())?;
        info!(path = %path.display(), "components exported");
    }
    if let Some(path) = &config.export_model {
        crate::io::write_model_json(path, &ModelFile::new(config.model.clone(), run.fitted.clone()))?;
        info!(path = %path.display(), "model exported");
    }
    if let (Some(path), Some(backtest)) = (&config.export_backtest, &run.backtest) {
        crate::io::write_backtest_csv(path, backtest)?;
        info!(path = %path.display(), "backtest exported");
    }
    Ok(())
}

fn handle_backtest(args: BacktestArgs) -> Result<()> {
    let config = input_run_config(&args.input, args.model.to_config());
    let (prepared, calendar) = pipeline::load_inputs(&config)?;
    let split = match args.split_date {
        Some(date) => BacktestSplit::Date(date),
        None => BacktestSplit::HoldoutDays(args.holdout_days),
    };
    let result = pipeline::run_backtest_on(&prepared.observations, &calendar, &config.model, split)?;

    println!("{}", crate::report::format_backtest(&result));
    if let Some(path) = &args.export {
        crate::io::write_backtest_csv(path, &result)?;
    }
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<()> {
    let file = crate::io::read_model_json(&args.model)?;
    let model = ForecastModel::new(file.config)?;
    let forecast = model.predict(&file.model, &file.model.trend().future_dates(args.horizon))?;

    println!("{}", crate::report::format_forecast(&forecast, args.horizon));
    if let Some(path) = &args.export {
        crate::io::write_forecast_csv(path, &forecast)?;
    }
    Ok(())
}

fn handle_demo(args: DemoArgs) -> Result<()> {
    let spec = SyntheticSpec {
        days: args.days,
        seed: args.seed,
        ..SyntheticSpec::default()
    };
    let rows: Vec<RawRow> = generate(&spec)?
        .into_iter()
        .map(|o| RawRow::new(o.date.to_string(), o.value))
        .collect();
    let prepared = SeriesPreparer::default().prepare(&rows)?;
    let calendar = EventCalendar::from_events(spec.spike_events("reporting_backlog"))?;

    let mut config = base_run_config(ModelConfig {
        uncertainty: args.uncertainty,
        ..ModelConfig::default()
    });
    config.horizon = args.horizon;
    config.backtest = Some(BacktestSplit::HoldoutDays(args.holdout_days));
    config.export_forecast = args.export;

    let run = pipeline::run_forecast_on(prepared, calendar, &config)?;
    report_run(&run, &config)
}

pub fn run_config_from_args(args: &ForecastArgs) -> RunConfig {
    let mut config = input_run_config(&args.input, args.model.to_config());
    config.horizon = args.horizon;
    config.include_history = args.include_history;
    config.backtest = match (args.backtest_split, args.backtest_holdout) {
        (Some(date), _) => Some(BacktestSplit::Date(date)),
        (None, Some(days)) => Some(BacktestSplit::HoldoutDays(days)),
        (None, None) => None,
    };
    config.top_n = args.top;
    config.rows = args.rows;
    config.export_forecast = args.export.clone();
    config.export_components = args.export_components.clone();
    config.export_model = args.export_model.clone();
    config.export_backtest = args.export_backtest.clone();
    config
}

fn input_run_config(input: &InputArgs, model: ModelConfig) -> RunConfig {
    RunConfig {
        csv_path: input.csv.clone(),
        format: input.format,
        region: input.region.clone(),
        events_path: input.events.clone(),
        min_observations: input.min_observations,
        ..base_run_config(model)
    }
}

/// Defaults for everything a subcommand does not set itself.
fn base_run_config(model: ModelConfig) -> RunConfig {
    RunConfig {
        csv_path: PathBuf::new(),
        format: InputFormat::Auto,
        region: None,
        events_path: None,
        min_observations: DEFAULT_MIN_OBSERVATIONS,
        horizon: 30,
        include_history: false,
        backtest: None,
        model,
        top_n: 5,
        rows: 30,
        export_forecast: None,
        export_components: None,
        export_model: None,
        export_backtest: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn forecast_flags_map_onto_run_config() {
        let cli = Cli::parse_from([
            "cf",
            "forecast",
            "--csv",
            "time_series_covid19_confirmed_global.csv",
            "--region",
            "India",
            "--events",
            "events.json",
            "--horizon",
            "60",
            "--backtest-holdout",
            "21",
            "--changepoint-penalty",
            "0.01",
        ]);
        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        let config = run_config_from_args(&args);
        assert_eq!(config.region.as_deref(), Some("India"));
        assert_eq!(config.horizon, 60);
        assert_eq!(config.backtest, Some(BacktestSplit::HoldoutDays(21)));
        assert_eq!(config.model.changepoint_penalty, 0.01);
        assert_eq!(config.model.n_changepoints, 25);
    }
}
