//! Command-line parsing for the case-count forecaster.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling code; `app` turns these structs into a `RunConfig`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{InputFormat, ModelConfig, UncertaintyMode};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cf", version, about = "Decomposition-based forecaster for daily case counts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a CSV series, print diagnostics and forecast, and optionally export.
    Forecast(ForecastArgs),
    /// Fit on a prefix and score the held-out suffix (MAE/RMSE).
    Backtest(BacktestArgs),
    /// Forecast from a previously exported model JSON.
    Predict(PredictArgs),
    /// Run the full workflow on a seeded synthetic epidemic curve.
    Demo(DemoArgs),
}

/// Where the series and its event calendar come from.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Input CSV (long `date,value` or JHU wide time series).
    #[arg(long, value_name = "CSV")]
    pub csv: PathBuf,

    /// CSV layout.
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub format: InputFormat,

    /// Country/region to aggregate from wide input (case-insensitive).
    #[arg(long)]
    pub region: Option<String>,

    /// Event calendar (JSON, or CSV by extension).
    #[arg(long, value_name = "FILE")]
    pub events: Option<PathBuf>,

    /// Minimum observations required after preparation.
    #[arg(long, default_value_t = 14)]
    pub min_observations: usize,
}

/// Model knobs. Defaults mirror `ModelConfig::default()`.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Candidate trend changepoints.
    #[arg(long, default_value_t = 25)]
    pub changepoints: usize,

    /// Fraction of history eligible for changepoints.
    #[arg(long, default_value_t = 0.8)]
    pub changepoint_range: f64,

    /// L1 penalty on slope changes (larger = stiffer trend).
    #[arg(long, default_value_t = 1e-3)]
    pub changepoint_penalty: f64,

    /// Weekly Fourier order (0 disables).
    #[arg(long, default_value_t = 3)]
    pub weekly_order: usize,

    /// Yearly Fourier order (0 disables).
    #[arg(long, default_value_t = 10)]
    pub yearly_order: usize,

    /// Prior scale on seasonal coefficients.
    #[arg(long, default_value_t = 10.0)]
    pub seasonality_prior_scale: f64,

    /// Prior scale on event coefficients.
    #[arg(long, default_value_t = 10.0)]
    pub event_prior_scale: f64,

    /// Central interval coverage.
    #[arg(long, default_value_t = 0.80)]
    pub interval_width: f64,

    /// Interval construction.
    #[arg(long, value_enum, default_value_t = UncertaintyMode::Normal)]
    pub uncertainty: UncertaintyMode,

    /// Simulation draws for `--uncertainty simulated`.
    #[arg(long, default_value_t = 1000)]
    pub samples: usize,

    /// Random seed for simulated intervals.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fixed slope (value/day) beyond the last observation.
    #[arg(long, allow_hyphen_values = true)]
    pub extrapolation_slope: Option<f64>,

    /// Solver iteration cap.
    #[arg(long, default_value_t = 1000)]
    pub max_iterations: usize,

    /// Solver wall-clock cap in milliseconds.
    #[arg(long)]
    pub max_solve_millis: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Days to forecast past the last observation.
    #[arg(long, default_value_t = 30)]
    pub horizon: usize,

    /// Also predict the observed dates (like a future frame including history).
    #[arg(long)]
    pub include_history: bool,

    /// Additionally backtest with this split date (YYYY-MM-DD).
    #[arg(long)]
    pub backtest_split: Option<NaiveDate>,

    /// Additionally backtest holding out this many trailing days.
    #[arg(long, conflicts_with = "backtest_split")]
    pub backtest_holdout: Option<i64>,

    /// Largest in-sample misses shown per side.
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Forecast rows printed to the terminal.
    #[arg(long, default_value_t = 30)]
    pub rows: usize,

    /// Export forecast to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export component decomposition to CSV.
    #[arg(long)]
    pub export_components: Option<PathBuf>,

    /// Export the fitted model to JSON.
    #[arg(long)]
    pub export_model: Option<PathBuf>,

    /// Export backtest rows to CSV.
    #[arg(long)]
    pub export_backtest: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct BacktestArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Train on dates strictly before this date (YYYY-MM-DD).
    #[arg(long)]
    pub split_date: Option<NaiveDate>,

    /// Hold out this many trailing days (used when no split date is given).
    #[arg(long, default_value_t = 30, conflicts_with = "split_date")]
    pub holdout_days: i64,

    /// Export backtest rows to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    /// Model JSON produced by `cf forecast --export-model`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// Days to forecast past the model's last observation.
    #[arg(long, default_value_t = 30)]
    pub horizon: usize,

    /// Export forecast to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Days of synthetic history.
    #[arg(long, default_value_t = 240)]
    pub days: usize,

    /// Seed for the synthetic series.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Days to forecast.
    #[arg(long, default_value_t = 30)]
    pub horizon: usize,

    /// Trailing days held out for the demo backtest.
    #[arg(long, default_value_t = 30)]
    pub holdout_days: i64,

    /// Interval construction.
    #[arg(long, value_enum, default_value_t = UncertaintyMode::Normal)]
    pub uncertainty: UncertaintyMode,

    /// Export forecast to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl ModelArgs {
    pub fn to_config(&self) -> ModelConfig {
        ModelConfig {
            n_changepoints: self.changepoints,
            changepoint_range: self.changepoint_range,
            changepoint_penalty: self.changepoint_penalty,
            weekly_order: self.weekly_order,
            yearly_order: self.yearly_order,
            seasonality_prior_scale: self.seasonality_prior_scale,
            event_prior_scale: self.event_prior_scale,
            interval_width: self.interval_width,
            uncertainty: self.uncertainty,
            uncertainty_samples: self.samples,
            seed: self.seed,
            extrapolation_slope: self.extrapolation_slope,
            max_iterations: self.max_iterations,
            max_solve_millis: self.max_solve_millis,
            ..ModelConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_flag_defaults_match_model_config() {
        let cli = Cli::parse_from(["cf", "forecast", "--csv", "cases.csv"]);
        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert_eq!(args.model.to_config(), ModelConfig::default());
        assert_eq!(args.horizon, 30);
        assert_eq!(args.input.format, InputFormat::Auto);
    }

    #[test]
    fn backtest_split_date_parses() {
        let cli = Cli::parse_from([
            "cf",
            "backtest",
            "--csv",
            "cases.csv",
            "--split-date",
            "2020-06-01",
            "--uncertainty",
            "simulated",
        ]);
        let Command::Backtest(args) = cli.command else {
            panic!("expected backtest");
        };
        assert_eq!(args.split_date, NaiveDate::from_ymd_opt(2020, 6, 1));
        assert_eq!(args.model.to_config().uncertainty, UncertaintyMode::Simulated);
    }

    #[test]
    fn negative_extrapolation_slope_is_accepted() {
        let cli = Cli::parse_from(["cf", "forecast", "--csv", "c.csv", "--extrapolation-slope", "-4.5"]);
        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert_eq!(args.model.to_config().extrapolation_slope, Some(-4.5));
    }
}
