//! Seeded synthetic case series.
//!
//! Used by the `demo` command and by tests that need realistic, repeatable
//! data: a piecewise-linear epidemic curve with a weekly reporting cycle,
//! optional one-off spikes and Gaussian reporting noise.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::domain::{Event, Observation};
use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSpec {
    pub start: NaiveDate,
    pub days: usize,
    /// Value on the first day.
    pub level: f64,
    /// `(day, slope)` regime starts; the first entry should be day 0.
    pub regimes: Vec<(usize, f64)>,
    /// Peak-to-mean amplitude of the weekly cycle.
    pub weekly_amplitude: f64,
    /// `(day, size)` one-off additions (e.g. reporting backlogs).
    pub spikes: Vec<(usize, f64)>,
    pub noise_sd: f64,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    /// A first wave that grows, is flattened by a lockdown and then declines.
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap_or_default(),
            days: 240,
            level: 50.0,
            regimes: vec![(0, 40.0), (75, 5.0), (150, -12.0)],
            weekly_amplitude: 300.0,
            spikes: vec![(120, 2500.0), (121, 2500.0)],
            noise_sd: 120.0,
            seed: 42,
        }
    }
}

impl SyntheticSpec {
    /// Noise-free expected value on day `i`.
    pub fn expected(&self, i: usize) -> f64 {
        let mut value = self.level;
        let mut regimes = self.regimes.clone();
        regimes.sort_by_key(|(day, _)| *day);
        for (k, &(from, slope)) in regimes.iter().enumerate() {
            let to = regimes.get(k + 1).map_or(usize::MAX, |(d, _)| *d);
            if i > from {
                value += slope * (i.min(to) - from) as f64;
            }
        }
        let weekly = self.weekly_amplitude * (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin();
        let spike: f64 = self.spikes.iter().filter(|(d, _)| *d == i).map(|(_, s)| s).sum();
        value + weekly + spike
    }

    /// Events matching the configured spikes, one per contiguous run of
    /// spike days.
    pub fn spike_events(&self, name: &str) -> Vec<Event> {
        let mut days: Vec<usize> = self.spikes.iter().map(|(d, _)| *d).collect();
        days.sort_unstable();
        days.dedup();

        let mut out = Vec::new();
        let mut iter = days.into_iter().peekable();
        while let Some(first) = iter.next() {
            let mut last = first;
            while iter.peek() == Some(&(last + 1)) {
                last += 1;
                iter.next();
            }
            out.push(
                Event::new(name, self.start + Duration::days(first as i64))
                    .with_window(0, (last - first) as i64),
            );
        }
        out
    }
}

/// Generate daily observations. Values are floored at zero, as case counts are.
pub fn generate(spec: &SyntheticSpec) -> Result<Vec<Observation>> {
    if spec.days == 0 {
        return Err(ForecastError::InvalidConfig("synthetic series needs at least one day".to_string()));
    }
    let noise = Normal::new(0.0, spec.noise_sd)
        .map_err(|e| ForecastError::InvalidConfig(format!("noise distribution: {e}")))?;
    let mut rng = StdRng::seed_from_u64(spec.seed);

    Ok((0..spec.days)
        .map(|i| {
            let value = (spec.expected(i) + noise.sample(&mut rng)).max(0.0);
            Observation::new(spec.start + Duration::days(i as i64), value)
        })
        .collect())
}
