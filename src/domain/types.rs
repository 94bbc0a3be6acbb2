//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between the preparation, fitting and backtest stages
//! - exported to JSON/CSV
//! - reloaded later for prediction from a saved model

use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A raw input row before normalization.
///
/// Produced by CSV ingest (or built directly by callers); dates are still text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub date: String,
    pub value: f64,
}

impl RawRow {
    pub fn new(date: impl Into<String>, value: f64) -> Self {
        Self {
            date: date.into(),
            value,
        }
    }
}

/// A normalized observation point used for fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Output of series preparation: observations plus what was changed on the way.
#[derive(Debug, Clone)]
pub struct PreparedSeries {
    /// Strictly increasing by date.
    pub observations: Vec<Observation>,
    /// Dates whose negative value was clamped to zero.
    pub clamped: Vec<NaiveDate>,
    /// Rows dropped because a later row carried the same date.
    pub duplicates_dropped: usize,
    /// Calendar days between the first and last observation with no row.
    pub missing_days: usize,
}

/// A named calendar event with an effect window in days around its date.
///
/// The event is active on every day in
/// `[date + lower_window, date + upper_window]` (inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub lower_window: i64,
    #[serde(default)]
    pub upper_window: i64,
}

impl Event {
    pub fn new(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            date,
            lower_window: 0,
            upper_window: 0,
        }
    }

    pub fn with_window(mut self, lower: i64, upper: i64) -> Self {
        self.lower_window = lower;
        self.upper_window = upper;
        self
    }

    /// First covered day. Saturates at `NaiveDate::MIN` for offsets chrono
    /// cannot represent.
    pub fn window_start(&self) -> NaiveDate {
        offset_date(self.date, self.lower_window).unwrap_or(NaiveDate::MIN)
    }

    /// Last covered day. Saturates at `NaiveDate::MAX`.
    pub fn window_end(&self) -> NaiveDate {
        offset_date(self.date, self.upper_window).unwrap_or(NaiveDate::MAX)
    }

    /// Both window edges are representable dates.
    pub fn window_in_range(&self) -> bool {
        offset_date(self.date, self.lower_window).is_some() && offset_date(self.date, self.upper_window).is_some()
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.window_start() && date <= self.window_end()
    }
}

fn offset_date(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days).and_then(|d| date.checked_add_signed(d))
}

/// Periodic component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalPeriod {
    Weekly,
    Yearly,
}

impl SeasonalPeriod {
    /// Period length in days.
    pub fn days(self) -> f64 {
        match self {
            SeasonalPeriod::Weekly => 7.0,
            SeasonalPeriod::Yearly => 365.25,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SeasonalPeriod::Weekly => "weekly",
            SeasonalPeriod::Yearly => "yearly",
        }
    }
}

/// Fitted Fourier coefficients for one periodic component.
///
/// `coefficients` holds `[sin_1, cos_1, sin_2, cos_2, ...]` in value units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalComponent {
    pub period: SeasonalPeriod,
    pub order: usize,
    pub coefficients: Vec<f64>,
}

impl SeasonalComponent {
    /// Evaluate the component at a date.
    pub fn value_at(&self, date: NaiveDate) -> f64 {
        let terms = crate::math::fourier_terms(crate::math::epoch_days(date), self.period.days(), self.order);
        terms
            .iter()
            .zip(self.coefficients.iter())
            .map(|(x, b)| x * b)
            .sum()
    }

    /// Peak-to-trough range over one period, sampled daily.
    pub fn amplitude(&self) -> f64 {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
        let steps = self.period.days().ceil() as i64;
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for d in 0..steps {
            let v = self.value_at(start + Duration::days(d));
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if lo.is_finite() && hi.is_finite() { hi - lo } else { 0.0 }
    }
}

/// One linear piece of the fitted trend.
///
/// `slope` is in value units per day and `intercept` is the trend value at
/// `start_date`. Consecutive segments share their boundary date. The last
/// segment of a fitted model is open-ended (`end_date = None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSegment {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub slope: f64,
    pub intercept: f64,
}

impl TrendSegment {
    pub fn value_at(&self, date: NaiveDate) -> f64 {
        let days = (date - self.start_date).num_days() as f64;
        self.intercept + self.slope * days
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.is_none_or(|end| date <= end)
    }
}

/// Fitted coefficient for one named event column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEffect {
    pub name: String,
    pub coefficient: f64,
}

/// A single forecast row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ForecastPoint {
    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}

/// Additive decomposition of the model at one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentPoint {
    pub date: NaiveDate,
    pub trend: f64,
    pub weekly: f64,
    pub yearly: f64,
    /// Sum of all active event terms.
    pub events: f64,
    /// Per-event contributions for events active at `date`.
    pub event_terms: Vec<(String, f64)>,
}

impl ComponentPoint {
    pub fn total(&self) -> f64 {
        self.trend + self.weekly + self.yearly + self.events
    }
}

/// How forecast intervals are derived from the fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UncertaintyMode {
    /// Closed-form normal approximation of noise plus future trend changes.
    Normal,
    /// Monte Carlo simulation of future changepoints plus observation noise.
    Simulated,
}

/// Every modeling knob, with defaults matching common daily-series practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Candidate changepoints placed over the early history.
    pub n_changepoints: usize,
    /// Fraction of the history (by observation count) eligible for changepoints.
    pub changepoint_range: f64,
    /// L1 penalty on slope changes, in scaled units (y / max|y|, t / span).
    pub changepoint_penalty: f64,

    /// Fourier order of the weekly component (0 disables it).
    pub weekly_order: usize,
    /// Fourier order of the yearly component (0 disables it).
    pub yearly_order: usize,
    /// Normal prior scale on seasonal coefficients (ridge weight `1/scale²`).
    pub seasonality_prior_scale: f64,
    /// Normal prior scale on event coefficients.
    pub event_prior_scale: f64,

    /// Central coverage of the forecast interval, in `(0, 1)`.
    pub interval_width: f64,
    pub uncertainty: UncertaintyMode,
    /// Simulation draws for `UncertaintyMode::Simulated`.
    pub uncertainty_samples: usize,
    pub seed: u64,

    /// Overrides the slope (value/day) used beyond the last observation.
    pub extrapolation_slope: Option<f64>,

    pub max_iterations: usize,
    pub tolerance: f64,
    /// Optional wall-clock cap on the penalized solve, in milliseconds.
    pub max_solve_millis: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_penalty: 1e-3,
            weekly_order: 3,
            yearly_order: 10,
            seasonality_prior_scale: 10.0,
            event_prior_scale: 10.0,
            interval_width: 0.80,
            uncertainty: UncertaintyMode::Normal,
            uncertainty_samples: 1000,
            seed: 42,
            extrapolation_slope: None,
            max_iterations: 1000,
            tolerance: 1e-7,
            max_solve_millis: None,
        }
    }
}

/// Input layout for CSV ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Detect from the header row.
    Auto,
    /// One row per date: `date,value`.
    Long,
    /// JHU global time series: one row per region, one column per date.
    Wide,
}

/// How a backtest picks its split date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacktestSplit {
    /// Train on dates strictly before this date.
    Date(NaiveDate),
    /// Hold out this many trailing calendar days.
    HoldoutDays(i64),
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub csv_path: PathBuf,
    pub format: InputFormat,
    /// Country/region to extract from wide-format input.
    pub region: Option<String>,
    pub events_path: Option<PathBuf>,
    pub min_observations: usize,

    pub horizon: usize,
    pub include_history: bool,
    /// Optional second, independent fit scored on a held-out suffix.
    pub backtest: Option<BacktestSplit>,

    pub model: ModelConfig,

    /// Outliers shown per side.
    pub top_n: usize,
    /// Forecast rows printed to the terminal.
    pub rows: usize,

    pub export_forecast: Option<PathBuf>,
    pub export_components: Option<PathBuf>,
    pub export_model: Option<PathBuf>,
    pub export_backtest: Option<PathBuf>,
}
