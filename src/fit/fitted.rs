//! The immutable result of one fit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{ComponentPoint, EventEffect, SeasonalComponent, SeasonalPeriod, TrendSegment};
use crate::models::{EventCalendar, PiecewiseTrend};

/// Trend, seasonal and event terms plus the residual scale of one fit.
///
/// There is no mutating API: refitting produces a new value. It serializes to
/// JSON so a fit can be saved and used for prediction later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    trend: PiecewiseTrend,
    seasonal: Vec<SeasonalComponent>,
    calendar: EventCalendar,
    event_effects: Vec<EventEffect>,
    /// In-sample residual RMSE (value units).
    sigma: f64,
    n_observations: usize,
    first_observed: NaiveDate,
    last_observed: NaiveDate,
    iterations: usize,
}

impl FittedModel {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        trend: PiecewiseTrend,
        seasonal: Vec<SeasonalComponent>,
        calendar: EventCalendar,
        event_effects: Vec<EventEffect>,
        sigma: f64,
        n_observations: usize,
        first_observed: NaiveDate,
        last_observed: NaiveDate,
        iterations: usize,
    ) -> Self {
        Self {
            trend,
            seasonal,
            calendar,
            event_effects,
            sigma,
            n_observations,
            first_observed,
            last_observed,
            iterations,
        }
    }

    pub fn trend(&self) -> &PiecewiseTrend {
        &self.trend
    }

    pub fn seasonal_components(&self) -> &[SeasonalComponent] {
        &self.seasonal
    }

    pub fn seasonal_component(&self, period: SeasonalPeriod) -> Option<&SeasonalComponent> {
        self.seasonal.iter().find(|c| c.period == period)
    }

    pub fn calendar(&self) -> &EventCalendar {
        &self.calendar
    }

    pub fn event_effects(&self) -> &[EventEffect] {
        &self.event_effects
    }

    pub fn event_coefficient(&self, name: &str) -> Option<f64> {
        self.event_effects
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.coefficient)
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    pub fn first_observed(&self) -> NaiveDate {
        self.first_observed
    }

    pub fn last_observed(&self) -> NaiveDate {
        self.last_observed
    }

    /// Solver iterations used by the fit.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Observed-range segments plus the open extrapolation segment.
    pub fn trend_segments(&self) -> Vec<TrendSegment> {
        self.trend.segments()
    }

    /// Segments covering `[first_observed, horizon_end]`.
    pub fn trend_segments_through(&self, horizon_end: NaiveDate) -> Vec<TrendSegment> {
        self.trend.segments_through(horizon_end)
    }

    pub fn trend_at(&self, date: NaiveDate) -> f64 {
        self.trend.value_at(date)
    }

    pub fn seasonal_at(&self, period: SeasonalPeriod, date: NaiveDate) -> f64 {
        self.seasonal_component(period).map_or(0.0, |c| c.value_at(date))
    }

    /// Contributions of every event active at `date`.
    pub fn event_terms_at(&self, date: NaiveDate) -> Vec<(String, f64)> {
        let active = self.calendar.effect_at(date);
        self.event_effects
            .iter()
            .filter(|e| active.contains(&e.name))
            .map(|e| (e.name.clone(), e.coefficient))
            .collect()
    }

    pub fn components_at(&self, date: NaiveDate) -> ComponentPoint {
        let event_terms = self.event_terms_at(date);
        ComponentPoint {
            date,
            trend: self.trend_at(date),
            weekly: self.seasonal_at(SeasonalPeriod::Weekly, date),
            yearly: self.seasonal_at(SeasonalPeriod::Yearly, date),
            events: event_terms.iter().map(|(_, v)| v).sum(),
            event_terms,
        }
    }

    /// Point estimate: trend + seasonal + events.
    pub fn value_at(&self, date: NaiveDate) -> f64 {
        self.components_at(date).total()
    }
}
