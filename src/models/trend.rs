//! Piecewise-linear trend with sparse changepoints.
//!
//! Candidate changepoints sit at evenly spaced quantiles of the early history.
//! In scaled time `s = days_since_start / span_days` the trend basis is:
//!
//! ```text
//! [1, s, (s - c_1)+, ..., (s - c_K)+]
//! ```
//!
//! The coefficient of each hinge is the slope change at that changepoint. An L1
//! penalty on those coefficients makes most of them collapse to zero, so the
//! trend bends only where the data demands it.

use chrono::{Duration, NaiveDate};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ModelConfig, Observation, TrendSegment};
use crate::error::{ForecastError, Result};
use crate::math::{hinge, solve_penalized, value_scale, Penalty, SolveOptions};
use crate::models::check_observations;

/// Slope changes below this (in scaled units) are reported as "no change".
const COLLAPSED_DELTA: f64 = 1e-5;

/// Fits and describes the trend component.
#[derive(Debug, Clone)]
pub struct TrendEstimator {
    n_changepoints: usize,
    changepoint_range: f64,
    penalty: f64,
    extrapolation_slope: Option<f64>,
    solve: SolveOptions,
}

impl TrendEstimator {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            n_changepoints: config.n_changepoints,
            changepoint_range: config.changepoint_range,
            penalty: config.changepoint_penalty,
            extrapolation_slope: config.extrapolation_slope,
            solve: SolveOptions {
                max_iterations: config.max_iterations,
                tolerance: config.tolerance,
                time_limit: config.max_solve_millis.map(std::time::Duration::from_millis),
            },
        }
    }

    pub fn solve_options(&self) -> &SolveOptions {
        &self.solve
    }

    pub fn extrapolation_slope(&self) -> Option<f64> {
        self.extrapolation_slope
    }

    /// Free trend parameters: intercept, base slope, one slope change per
    /// configured changepoint.
    pub fn parameter_count(&self) -> usize {
        2 + self.n_changepoints
    }

    /// Candidate changepoint dates for a strictly increasing date sequence.
    ///
    /// Uses observed dates at `linspace(0, m - 1, K + 1)[1..]` where `m` is the
    /// number of observations inside the changepoint range, so gaps in the
    /// calendar are handled naturally. The count is reduced when the history
    /// is too short to hold `K` distinct candidates.
    pub fn candidate_changepoints(&self, dates: &[NaiveDate]) -> Vec<NaiveDate> {
        let n = dates.len();
        if n < 3 || self.n_changepoints == 0 {
            return Vec::new();
        }

        // Keep every candidate strictly before the last observation.
        let eligible = ((n as f64 * self.changepoint_range).floor() as usize).clamp(2, n - 1);
        let k = self.n_changepoints.min(eligible - 1);
        if k < self.n_changepoints {
            debug!(
                requested = self.n_changepoints,
                used = k,
                "history too short for requested changepoints"
            );
        }

        let mut out: Vec<NaiveDate> = Vec::with_capacity(k);
        for i in 1..=k {
            let idx = (i as f64 * (eligible - 1) as f64 / k as f64).round() as usize;
            let date = dates[idx];
            if out.last() != Some(&date) {
                out.push(date);
            }
        }
        out
    }

    /// Build the trend basis for a history.
    pub fn basis(&self, dates: &[NaiveDate]) -> Result<TrendBasis> {
        let (Some(&first), Some(&last)) = (dates.first(), dates.last()) else {
            return Err(ForecastError::MalformedInput("no observations to build a trend from".to_string()));
        };
        Ok(TrendBasis::new(first, last, self.candidate_changepoints(dates)))
    }

    /// Column penalties for a basis: intercept and base slope are free.
    pub fn penalties(&self, basis: &TrendBasis) -> Vec<Penalty> {
        let mut out = vec![Penalty::None, Penalty::None];
        out.extend(std::iter::repeat_n(Penalty::Lasso(self.penalty), basis.changepoints().len()));
        out
    }

    /// Trend-only fit, reported as segments.
    pub fn fit(&self, observations: &[Observation]) -> Result<Vec<TrendSegment>> {
        Ok(self.fit_trend(observations)?.segments())
    }

    /// Trend-only fit (no seasonality, no events).
    pub fn fit_trend(&self, observations: &[Observation]) -> Result<PiecewiseTrend> {
        check_observations(observations)?;
        if observations.len() < self.parameter_count() {
            return Err(ForecastError::InsufficientData {
                needed: self.parameter_count(),
                got: observations.len(),
            });
        }
        if !(self.penalty.is_finite() && self.penalty >= 0.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "changepoint penalty must be >= 0, got {}",
                self.penalty
            )));
        }

        let dates: Vec<NaiveDate> = observations.iter().map(|o| o.date).collect();
        let values: Vec<f64> = observations.iter().map(|o| o.value).collect();
        let y_scale = value_scale(&values);

        let basis = self.basis(&dates)?;
        let p = basis.column_count();
        let mut row = Vec::with_capacity(p);
        let mut x = DMatrix::<f64>::zeros(dates.len(), p);
        for (i, &date) in dates.iter().enumerate() {
            row.clear();
            basis.fill_row(date, &mut row);
            for (j, v) in row.iter().enumerate() {
                x[(i, j)] = *v;
            }
        }
        let y = DVector::from_iterator(values.len(), values.iter().map(|v| v / y_scale));

        let solution = solve_penalized(&x, &y, &self.penalties(&basis), &self.solve)?;
        let coefs: Vec<f64> = solution.beta.iter().copied().collect();
        Ok(PiecewiseTrend::from_scaled(
            &basis,
            &coefs,
            y_scale,
            dates[dates.len() - 1],
            self.extrapolation_slope,
        ))
    }
}

/// Trend design for one history: origin, time scale and changepoint knots.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendBasis {
    start: NaiveDate,
    span_days: f64,
    changepoints: Vec<NaiveDate>,
    knots: Vec<f64>,
}

impl TrendBasis {
    pub fn new(start: NaiveDate, end: NaiveDate, changepoints: Vec<NaiveDate>) -> Self {
        let span_days = ((end - start).num_days() as f64).max(1.0);
        let knots = changepoints
            .iter()
            .map(|c| (*c - start).num_days() as f64 / span_days)
            .collect();
        Self {
            start,
            span_days,
            changepoints,
            knots,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn span_days(&self) -> f64 {
        self.span_days
    }

    pub fn changepoints(&self) -> &[NaiveDate] {
        &self.changepoints
    }

    pub fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.span_days
    }

    pub fn column_count(&self) -> usize {
        2 + self.knots.len()
    }

    pub fn fill_row(&self, date: NaiveDate, out: &mut Vec<f64>) {
        let s = self.scaled_time(date);
        out.push(1.0);
        out.push(s);
        out.extend(self.knots.iter().map(|&c| hinge(s, c)));
    }
}

/// Fitted piecewise-linear trend in value units (slopes per day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiecewiseTrend {
    start: NaiveDate,
    last_observed: NaiveDate,
    /// Trend value at `start`.
    intercept: f64,
    /// Slope before the first changepoint.
    slope: f64,
    changepoints: Vec<NaiveDate>,
    /// Slope change at each changepoint.
    deltas: Vec<f64>,
    extrapolation_slope: Option<f64>,
    collapse_threshold: f64,
}

impl PiecewiseTrend {
    /// Convert scaled coefficients `[m, k, δ_1..δ_K]` back to value units.
    ///
    /// # Panics
    /// Panics if `coefs.len() != basis.column_count()`.
    pub fn from_scaled(
        basis: &TrendBasis,
        coefs: &[f64],
        y_scale: f64,
        last_observed: NaiveDate,
        extrapolation_slope: Option<f64>,
    ) -> Self {
        assert_eq!(coefs.len(), basis.column_count(), "trend coefficient length mismatch");
        let per_day = y_scale / basis.span_days();
        Self {
            start: basis.start(),
            last_observed,
            intercept: coefs[0] * y_scale,
            slope: coefs[1] * per_day,
            changepoints: basis.changepoints().to_vec(),
            deltas: coefs[2..].iter().map(|d| d * per_day).collect(),
            extrapolation_slope,
            collapse_threshold: COLLAPSED_DELTA * per_day,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn last_observed(&self) -> NaiveDate {
        self.last_observed
    }

    pub fn changepoints(&self) -> &[NaiveDate] {
        &self.changepoints
    }

    /// Slope changes (value/day), aligned with [`PiecewiseTrend::changepoints`].
    pub fn deltas(&self) -> &[f64] {
        &self.deltas
    }

    /// Fixed slope used past the last observation, if one was configured.
    pub fn extrapolation_slope(&self) -> Option<f64> {
        self.extrapolation_slope
    }

    /// Changepoints whose slope change did not collapse to zero.
    pub fn active_changepoints(&self) -> Vec<(NaiveDate, f64)> {
        self.changepoints
            .iter()
            .zip(self.deltas.iter())
            .filter(|(_, d)| d.abs() > self.collapse_threshold)
            .map(|(c, d)| (*c, *d))
            .collect()
    }

    fn fitted_value(&self, date: NaiveDate) -> f64 {
        let d = (date - self.start).num_days() as f64;
        let bends: f64 = self
            .changepoints
            .iter()
            .zip(self.deltas.iter())
            .map(|(c, delta)| delta * (d - (*c - self.start).num_days() as f64).max(0.0))
            .sum();
        self.intercept + self.slope * d + bends
    }

    /// Trend value at any date, honoring the extrapolation override.
    pub fn value_at(&self, date: NaiveDate) -> f64 {
        match self.extrapolation_slope {
            Some(slope) if date > self.last_observed => {
                let ahead = (date - self.last_observed).num_days() as f64;
                self.fitted_value(self.last_observed) + slope * ahead
            }
            _ => self.fitted_value(date),
        }
    }

    /// Slope in effect just after `date` (within the observed range).
    fn slope_after(&self, date: NaiveDate) -> f64 {
        self.slope
            + self
                .changepoints
                .iter()
                .zip(self.deltas.iter())
                .filter(|(c, _)| **c <= date)
                .map(|(_, d)| d)
                .sum::<f64>()
    }

    /// Slope used beyond the last observation.
    pub fn final_slope(&self) -> f64 {
        self.extrapolation_slope
            .unwrap_or_else(|| self.slope + self.deltas.iter().sum::<f64>())
    }

    /// Segments covering the observed range, followed by one open-ended
    /// extrapolation segment starting at the last observation.
    pub fn segments(&self) -> Vec<TrendSegment> {
        let mut out = Vec::new();
        let mut seg_start = self.start;
        for (c, _) in self.active_changepoints() {
            if c <= seg_start || c >= self.last_observed {
                continue;
            }
            out.push(TrendSegment {
                start_date: seg_start,
                end_date: Some(c),
                slope: self.slope_after(seg_start),
                intercept: self.fitted_value(seg_start),
            });
            seg_start = c;
        }
        out.push(TrendSegment {
            start_date: seg_start,
            end_date: Some(self.last_observed),
            slope: self.slope_after(seg_start),
            intercept: self.fitted_value(seg_start),
        });
        out.push(TrendSegment {
            start_date: self.last_observed,
            end_date: None,
            slope: self.final_slope(),
            intercept: self.fitted_value(self.last_observed),
        });
        out
    }

    /// Segments closed at `horizon_end` (or the last observation, if later).
    pub fn segments_through(&self, horizon_end: NaiveDate) -> Vec<TrendSegment> {
        let mut segments = self.segments();
        if let Some(last) = segments.last_mut() {
            last.end_date = Some(horizon_end.max(self.last_observed));
        }
        segments
    }

    /// Historical changepoint rate (candidates per day of history).
    pub fn changepoint_rate(&self) -> f64 {
        let span = ((self.last_observed - self.start).num_days() as f64).max(1.0);
        self.changepoints.len() as f64 / span
    }

    /// Mean absolute slope change (value/day): the Laplace scale used when
    /// projecting future trend changes.
    pub fn mean_abs_delta(&self) -> f64 {
        if self.deltas.is_empty() {
            0.0
        } else {
            self.deltas.iter().map(|d| d.abs()).sum::<f64>() / self.deltas.len() as f64
        }
    }

    /// Dates `1..=horizon` days after the last observation.
    pub fn future_dates(&self, horizon: usize) -> Vec<NaiveDate> {
        (1..=horizon as i64)
            .map(|i| self.last_observed + Duration::days(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 22).unwrap() + Duration::days(i)
    }

    fn series(n: i64, f: impl Fn(i64) -> f64) -> Vec<Observation> {
        (0..n).map(|i| Observation::new(day(i), f(i))).collect()
    }

    fn estimator(n_changepoints: usize, penalty: f64) -> TrendEstimator {
        TrendEstimator::from_config(&ModelConfig {
            n_changepoints,
            changepoint_penalty: penalty,
            ..ModelConfig::default()
        })
    }

    #[test]
    fn candidates_are_evenly_spaced_in_early_history() {
        let dates: Vec<NaiveDate> = (0..100).map(day).collect();
        let cps = estimator(4, 1e-3).candidate_changepoints(&dates);
        assert_eq!(cps.len(), 4);
        // 80 eligible observations -> indices round(79 * i / 4)
        assert_eq!(cps, vec![day(20), day(40), day(59), day(79)]);
    }

    #[test]
    fn short_history_reduces_candidate_count() {
        let dates: Vec<NaiveDate> = (0..6).map(day).collect();
        let cps = estimator(25, 1e-3).candidate_changepoints(&dates);
        assert!(cps.len() < 25);
        assert!(cps.iter().all(|c| *c < day(5)));
    }

    #[test]
    fn linear_series_yields_single_slope() {
        let obs = series(120, |i| 100.0 + 2.0 * i as f64);
        let segments = estimator(25, 1e-3).fit(&obs).unwrap();

        assert_eq!(segments.len(), 2, "{segments:?}");
        for s in &segments {
            assert!((s.slope - 2.0).abs() < 1e-3, "slope {}", s.slope);
        }
        assert!((segments[0].intercept - 100.0).abs() < 1e-2);
        assert_eq!(segments[1].end_date, None);
    }

    #[test]
    fn regime_shift_is_detected() {
        // Slope 5 until day 60, then slope 1.
        let obs = series(150, |i| if i < 60 { 5.0 * i as f64 } else { 300.0 + (i - 60) as f64 });
        let trend = estimator(25, 1e-4).fit_trend(&obs).unwrap();

        assert!((trend.final_slope() - 1.0).abs() < 0.05, "final {}", trend.final_slope());
        assert!((trend.value_at(day(30)) - 150.0).abs() < 5.0);
        let big: Vec<_> = trend
            .active_changepoints()
            .into_iter()
            .filter(|(_, d)| d.abs() > 0.5)
            .collect();
        assert!(!big.is_empty());
        assert!(big.iter().all(|(c, _)| (*c - day(60)).num_days().abs() <= 6), "{big:?}");
    }

    #[test]
    fn segments_are_contiguous_through_horizon() {
        let obs = series(150, |i| if i < 60 { 5.0 * i as f64 } else { 300.0 + (i - 60) as f64 });
        let trend = estimator(25, 1e-4).fit_trend(&obs).unwrap();
        let horizon_end = day(179);
        let segments = trend.segments_through(horizon_end);

        assert_eq!(segments[0].start_date, day(0));
        assert_eq!(segments.last().unwrap().end_date, Some(horizon_end));
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end_date, Some(pair[1].start_date));
            let end = pair[0].end_date.unwrap();
            assert!((pair[0].value_at(end) - pair[1].intercept).abs() < 1e-2);
        }
    }

    #[test]
    fn extrapolation_override_replaces_final_slope() {
        let obs = series(80, |i| 10.0 + 3.0 * i as f64);
        let est = TrendEstimator::from_config(&ModelConfig {
            extrapolation_slope: Some(0.0),
            ..ModelConfig::default()
        });
        let trend = est.fit_trend(&obs).unwrap();
        let last = trend.value_at(day(79));
        assert!((trend.value_at(day(100)) - last).abs() < 1e-9);
        assert_eq!(trend.segments().last().unwrap().slope, 0.0);
    }

    #[test]
    fn too_few_points_is_insufficient() {
        let obs = series(20, |i| i as f64);
        let err = estimator(25, 1e-3).fit(&obs).unwrap_err();
        assert_eq!(err, ForecastError::InsufficientData { needed: 27, got: 20 });
    }
}
