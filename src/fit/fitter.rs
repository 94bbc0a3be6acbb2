//! Joint fit of trend, seasonality and events.
//!
//! Given:
//! - observations `(date_i, y_i)`, strictly increasing by date
//! - an event calendar
//! - a `ModelConfig`
//!
//! we:
//! - scale `y` by `max |y|` and time by the history span
//! - build the design `[trend | seasonal | events]`
//! - solve one penalized least squares problem (lasso on slope changes, ridge
//!   on seasonal and event coefficients)
//! - convert coefficients back to value units and estimate the residual scale
//!
//! and return an immutable `FittedModel`. Prediction evaluates the same terms
//! at arbitrary dates and attaches uncertainty bounds.

use chrono::NaiveDate;
use nalgebra::DVector;
use tracing::{debug, info};

use crate::domain::{ComponentPoint, EventEffect, ForecastPoint, ModelConfig, Observation};
use crate::error::{ForecastError, Result};
use crate::fit::fitted::FittedModel;
use crate::fit::uncertainty::interval_half_widths;
use crate::math::{solve_penalized, value_scale};
use crate::models::{check_observations, Design, EventCalendar, PiecewiseTrend, SeasonalBasis, TrendEstimator};

/// Stateless fit/predict driver. Every `fit` call returns a new `FittedModel`.
#[derive(Debug, Clone)]
pub struct ForecastModel {
    config: ModelConfig,
    trend: TrendEstimator,
    seasonal: SeasonalBasis,
}

impl ForecastModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self {
            trend: TrendEstimator::from_config(&config),
            seasonal: SeasonalBasis::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn seasonal_basis(&self) -> &SeasonalBasis {
        &self.seasonal
    }

    /// Free parameters for a calendar: trend (intercept, slope, changepoints),
    /// seasonal features and one column per distinct event name.
    pub fn parameter_count(&self, calendar: &EventCalendar) -> usize {
        self.trend.parameter_count() + self.seasonal.feature_len() + calendar.names().len()
    }

    /// Fit the additive model to a history.
    ///
    /// # Errors
    /// - `MalformedInput` for empty, unsorted or non-finite observations
    /// - `InsufficientData` when there are fewer observations than parameters
    /// - `FitDidNotConverge` when the penalized solve hits its cap
    pub fn fit(&self, observations: &[Observation], calendar: &EventCalendar) -> Result<FittedModel> {
        check_observations(observations)?;
        let needed = self.parameter_count(calendar);
        if observations.len() < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: observations.len(),
            });
        }

        let dates: Vec<NaiveDate> = observations.iter().map(|o| o.date).collect();
        let values: Vec<f64> = observations.iter().map(|o| o.value).collect();
        let y_scale = value_scale(&values);
        let first = dates[0];
        let last = dates[dates.len() - 1];

        let design = Design::new(self.trend.basis(&dates)?, &self.seasonal, calendar);
        let layout = design.layout();
        let x = design.matrix(&dates);
        let y = DVector::from_iterator(values.len(), values.iter().map(|v| v / y_scale));

        let penalties = design.penalties(
            self.trend.penalties(&design.trend),
            prior_weight(self.config.seasonality_prior_scale),
            prior_weight(self.config.event_prior_scale),
        );
        debug!(
            rows = x.nrows(),
            columns = x.ncols(),
            changepoints = design.trend.changepoints().len(),
            events = design.event_names.len(),
            "solving penalized design"
        );
        let solution = solve_penalized(&x, &y, &penalties, self.trend.solve_options())?;

        // In-sample residual scale, in value units.
        let fitted_scaled = &x * &solution.beta;
        let sse: f64 = y
            .iter()
            .zip(fitted_scaled.iter())
            .map(|(yi, fi)| (yi - fi).powi(2))
            .sum();
        let sigma = (sse / values.len() as f64).sqrt() * y_scale;

        let beta: Vec<f64> = solution.beta.iter().copied().collect();
        let trend = PiecewiseTrend::from_scaled(
            &design.trend,
            &beta[layout.trend.clone()],
            y_scale,
            last,
            self.trend.extrapolation_slope(),
        );
        let seasonal_coefs: Vec<f64> = beta[layout.seasonal.clone()].iter().map(|b| b * y_scale).collect();
        let seasonal = self.seasonal.split_coefficients(&seasonal_coefs);
        let event_effects: Vec<EventEffect> = design
            .event_names
            .iter()
            .zip(beta[layout.events.clone()].iter())
            .map(|(name, b)| EventEffect {
                name: name.clone(),
                coefficient: b * y_scale,
            })
            .collect();

        info!(
            n = values.len(),
            first = %first,
            last = %last,
            iterations = solution.iterations,
            active_changepoints = trend.active_changepoints().len(),
            sigma,
            "model fitted"
        );

        Ok(FittedModel::new(
            trend,
            seasonal,
            calendar.clone(),
            event_effects,
            sigma,
            values.len(),
            first,
            last,
            solution.iterations,
        ))
    }

    /// Point forecasts with uncertainty bounds, in ascending date order
    /// (duplicates removed).
    pub fn predict(&self, fitted: &FittedModel, dates: &[NaiveDate]) -> Result<Vec<ForecastPoint>> {
        let mut dates = dates.to_vec();
        dates.sort_unstable();
        dates.dedup();

        let widths = interval_half_widths(fitted, &dates, &self.config)?;
        Ok(dates
            .iter()
            .zip(widths)
            .map(|(&date, (below, above))| {
                let point = fitted.value_at(date);
                ForecastPoint {
                    date,
                    point_estimate: point,
                    lower_bound: point - below,
                    upper_bound: point + above,
                }
            })
            .collect())
    }

    /// Predict the history plus `horizon` days past the last observation.
    pub fn predict_with_history(
        &self,
        fitted: &FittedModel,
        history: &[Observation],
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>> {
        let mut dates: Vec<NaiveDate> = history.iter().map(|o| o.date).collect();
        dates.extend(fitted.trend().future_dates(horizon));
        self.predict(fitted, &dates)
    }

    /// Additive decomposition at each date.
    pub fn components(&self, fitted: &FittedModel, dates: &[NaiveDate]) -> Vec<ComponentPoint> {
        dates.iter().map(|&d| fitted.components_at(d)).collect()
    }
}

/// Ridge weight for a normal prior with the given scale (in scaled units).
fn prior_weight(scale: f64) -> f64 {
    1.0 / (scale * scale)
}

fn validate_config(config: &ModelConfig) -> Result<()> {
    let invalid = |msg: String| Err(ForecastError::InvalidConfig(msg));

    if !(config.changepoint_range > 0.0 && config.changepoint_range <= 1.0) {
        return invalid(format!("changepoint_range must be in (0, 1], got {}", config.changepoint_range));
    }
    if !(config.changepoint_penalty.is_finite() && config.changepoint_penalty >= 0.0) {
        return invalid(format!("changepoint_penalty must be >= 0, got {}", config.changepoint_penalty));
    }
    for (name, scale) in [
        ("seasonality_prior_scale", config.seasonality_prior_scale),
        ("event_prior_scale", config.event_prior_scale),
    ] {
        if !(scale.is_finite() && scale > 0.0) {
            return invalid(format!("{name} must be > 0, got {scale}"));
        }
    }
    if !(config.interval_width > 0.0 && config.interval_width < 1.0) {
        return invalid(format!("interval_width must be in (0, 1), got {}", config.interval_width));
    }
    if config.uncertainty_samples == 0 {
        return invalid("uncertainty_samples must be >= 1".to_string());
    }
    if config.max_iterations == 0 {
        return invalid("max_iterations must be >= 1".to_string());
    }
    if !(config.tolerance.is_finite() && config.tolerance >= 0.0) {
        return invalid(format!("tolerance must be >= 0, got {}", config.tolerance));
    }
    if let Some(slope) = config.extrapolation_slope {
        if !slope.is_finite() {
            return invalid("extrapolation_slope must be finite".to_string());
        }
    }
    Ok(())
}
