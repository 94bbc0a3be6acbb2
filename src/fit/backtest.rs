//! Chronological train/test evaluation.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::domain::{ForecastPoint, ModelConfig, Observation};
use crate::error::{ForecastError, Result};
use crate::fit::fitted::FittedModel;
use crate::fit::fitter::ForecastModel;
use crate::math::{mae, rmse};
use crate::models::{check_observations, EventCalendar};

/// Fits a fresh model on everything before a split date and scores it on the
/// rest.
#[derive(Debug, Clone)]
pub struct Backtester {
    config: ModelConfig,
    calendar: EventCalendar,
}

/// Outcome of one backtest. `actual` and `predicted` are aligned with `dates`.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub split_date: NaiveDate,
    pub train_len: usize,
    pub dates: Vec<NaiveDate>,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub forecast: Vec<ForecastPoint>,
    #[serde(skip)]
    pub fitted: FittedModel,
}

impl BacktestResult {
    pub fn test_len(&self) -> usize {
        self.dates.len()
    }

    pub fn mae(&self) -> f64 {
        mae(&self.actual, &self.predicted).unwrap_or(f64::NAN)
    }

    pub fn rmse(&self) -> f64 {
        rmse(&self.actual, &self.predicted).unwrap_or(f64::NAN)
    }

    /// Share of test observations inside the forecast interval.
    pub fn coverage(&self) -> f64 {
        let inside = self
            .forecast
            .iter()
            .zip(&self.actual)
            .filter(|(f, a)| f.lower_bound <= **a && **a <= f.upper_bound)
            .count();
        inside as f64 / self.forecast.len().max(1) as f64
    }
}

impl Backtester {
    pub fn new(config: ModelConfig, calendar: EventCalendar) -> Self {
        Self { config, calendar }
    }

    /// Train on `date < split_date`, predict exactly the `date >= split_date`
    /// observations.
    ///
    /// # Errors
    /// `InvalidSplit` when either side is empty; fit and predict errors are
    /// returned unchanged.
    pub fn evaluate(&self, series: &[Observation], split_date: NaiveDate) -> Result<BacktestResult> {
        check_observations(series)?;
        let cut = series.partition_point(|o| o.date < split_date);
        let (train, test) = series.split_at(cut);
        if train.is_empty() {
            return Err(ForecastError::InvalidSplit(format!(
                "split date {split_date} is on or before the first observation {}",
                series[0].date
            )));
        }
        if test.is_empty() {
            return Err(ForecastError::InvalidSplit(format!(
                "split date {split_date} is after the last observation {}",
                series[series.len() - 1].date
            )));
        }
        info!(%split_date, train = train.len(), test = test.len(), "backtest split");

        let model = ForecastModel::new(self.config.clone())?;
        let fitted = model.fit(train, &self.calendar)?;
        let dates: Vec<NaiveDate> = test.iter().map(|o| o.date).collect();
        let forecast = model.predict(&fitted, &dates)?;

        let result = BacktestResult {
            split_date,
            train_len: train.len(),
            actual: test.iter().map(|o| o.value).collect(),
            predicted: forecast.iter().map(|f| f.point_estimate).collect(),
            dates,
            forecast,
            fitted,
        };
        info!(mae = result.mae(), rmse = result.rmse(), "backtest scored");
        Ok(result)
    }

    /// Split that holds out the last `holdout_days` calendar days.
    pub fn split_for_holdout(series: &[Observation], holdout_days: i64) -> Result<NaiveDate> {
        let last = series
            .last()
            .ok_or_else(|| ForecastError::InvalidSplit("cannot split an empty series".to_string()))?;
        if holdout_days < 1 {
            return Err(ForecastError::InvalidSplit(format!("holdout must be >= 1 day, got {holdout_days}")));
        }
        Ok(last.date - chrono::Duration::days(holdout_days - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{generate, SyntheticSpec};
    use chrono::Duration;

    fn spec() -> SyntheticSpec {
        SyntheticSpec {
            days: 180,
            regimes: vec![(0, 30.0), (90, 10.0)],
            weekly_amplitude: 150.0,
            spikes: vec![],
            noise_sd: 40.0,
            ..SyntheticSpec::default()
        }
    }

    #[test]
    fn split_partitions_series_and_aligns_output() {
        let spec = spec();
        let obs = generate(&spec).unwrap();
        let split = spec.start + Duration::days(150);
        let result = Backtester::new(ModelConfig::default(), EventCalendar::new())
            .evaluate(&obs, split)
            .unwrap();

        assert_eq!(result.train_len, 150);
        assert_eq!(result.test_len(), 30);
        assert_eq!(result.dates[0], split);
        assert_eq!(result.fitted.last_observed(), split - Duration::days(1));
        assert_eq!(result.actual.len(), result.predicted.len());
        assert_eq!(result.actual[0], obs[150].value);

        // The tail is a clean linear regime, so the forecast should track it.
        let level = spec.expected(165);
        assert!(result.mae() < 0.1 * level, "mae {} vs level {level}", result.mae());
        assert!(result.rmse() >= result.mae());
        assert!(result.coverage() > 0.5);
    }

    #[test]
    fn split_before_first_observation_is_invalid() {
        let spec = spec();
        let obs = generate(&spec).unwrap();
        let bt = Backtester::new(ModelConfig::default(), EventCalendar::new());

        let err = bt.evaluate(&obs, spec.start - Duration::days(3)).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidSplit(_)));
        let err = bt.evaluate(&obs, spec.start).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidSplit(_)));
        let err = bt.evaluate(&obs, spec.start + Duration::days(400)).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidSplit(_)));
    }

    #[test]
    fn short_training_prefix_propagates_insufficient_data() {
        let spec = spec();
        let obs = generate(&spec).unwrap();
        let err = Backtester::new(ModelConfig::default(), EventCalendar::new())
            .evaluate(&obs, spec.start + Duration::days(20))
            .unwrap_err();
        assert_eq!(err, ForecastError::InsufficientData { needed: 53, got: 20 });
    }

    #[test]
    fn backtest_does_not_disturb_an_earlier_fit() {
        let spec = spec();
        let obs = generate(&spec).unwrap();
        let model = ForecastModel::new(ModelConfig::default()).unwrap();
        let full = model.fit(&obs, &EventCalendar::new()).unwrap();
        let snapshot = full.clone();

        Backtester::new(ModelConfig::default(), EventCalendar::new())
            .evaluate(&obs, spec.start + Duration::days(120))
            .unwrap();
        assert_eq!(full, snapshot);
    }

    #[test]
    fn holdout_split_keeps_requested_days() {
        let obs = generate(&spec()).unwrap();
        let split = Backtester::split_for_holdout(&obs, 14).unwrap();
        assert_eq!(obs.iter().filter(|o| o.date >= split).count(), 14);
        assert!(Backtester::split_for_holdout(&obs, 0).is_err());
    }
}
