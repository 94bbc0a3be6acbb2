//! Forecast interval widths.
//!
//! Two sources of uncertainty are combined:
//! - observation noise, `N(0, sigma)` with `sigma` the in-sample RMSE
//! - future trend changes: past the last observation, slope changes arrive at
//!   the historical changepoint rate with Laplace magnitudes whose scale is the
//!   mean absolute historical slope change
//!
//! `Normal` mode uses the closed-form variance of that process:
//!
//! ```text
//! Var(h) = sigma^2 + rate * 2 b^2 * h^3 / 3
//! ```
//!
//! `Simulated` mode draws seeded sample paths and takes empirical quantiles.
//! Both apply a running maximum over horizon so widths never shrink.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};
use rayon::prelude::*;
use tracing::debug;

use crate::domain::{ModelConfig, UncertaintyMode};
use crate::error::{ForecastError, Result};
use crate::fit::fitted::FittedModel;
use crate::math::{normal_critical_value, quantile_sorted};

/// `(below, above)` distances from the point estimate for each of `dates`
/// (expected in ascending order).
pub fn interval_half_widths(
    fitted: &FittedModel,
    dates: &[NaiveDate],
    config: &ModelConfig,
) -> Result<Vec<(f64, f64)>> {
    let horizons: Vec<f64> = dates
        .iter()
        .map(|d| ((*d - fitted.last_observed()).num_days().max(0)) as f64)
        .collect();
    let process = TrendChangeProcess::from_fitted(fitted);

    let raw = match config.uncertainty {
        UncertaintyMode::Normal => normal_widths(&process, fitted.sigma(), &horizons, config.interval_width)?,
        UncertaintyMode::Simulated => simulated_widths(
            &process,
            fitted.sigma(),
            &horizons,
            config.interval_width,
            config.uncertainty_samples,
            config.seed,
        )?,
    };
    Ok(monotone_envelope(&horizons, raw))
}

/// Parameters of the future slope-change process.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TrendChangeProcess {
    /// Expected slope changes per day.
    rate: f64,
    /// Laplace scale of each change (value/day).
    scale: f64,
}

impl TrendChangeProcess {
    fn from_fitted(fitted: &FittedModel) -> Self {
        let trend = fitted.trend();
        // A fixed extrapolation slope removes trend uncertainty.
        if trend.extrapolation_slope().is_some() {
            return Self { rate: 0.0, scale: 0.0 };
        }
        Self {
            rate: trend.changepoint_rate().min(1.0),
            scale: trend.mean_abs_delta(),
        }
    }

    fn variance(&self, h: f64) -> f64 {
        self.rate * 2.0 * self.scale * self.scale * h.powi(3) / 3.0
    }
}

fn normal_widths(
    process: &TrendChangeProcess,
    sigma: f64,
    horizons: &[f64],
    coverage: f64,
) -> Result<Vec<(f64, f64)>> {
    let z = normal_critical_value(coverage)?;
    Ok(horizons
        .iter()
        .map(|&h| {
            let w = z * (sigma * sigma + process.variance(h)).sqrt();
            (w, w)
        })
        .collect())
}

fn simulated_widths(
    process: &TrendChangeProcess,
    sigma: f64,
    horizons: &[f64],
    coverage: f64,
    samples: usize,
    seed: u64,
) -> Result<Vec<(f64, f64)>> {
    if !(coverage > 0.0 && coverage < 1.0) {
        return Err(ForecastError::InvalidConfig(format!(
            "interval width must be in (0, 1), got {coverage}"
        )));
    }
    let noise = Normal::new(0.0, sigma.max(0.0)).map_err(|e| ForecastError::InvalidConfig(e.to_string()))?;
    let magnitude = if process.scale > 0.0 && process.rate > 0.0 {
        Some(Exp::new(1.0 / process.scale).map_err(|e| ForecastError::InvalidConfig(e.to_string()))?)
    } else {
        None
    };
    let max_h = horizons.iter().fold(0.0_f64, |a, &h| a.max(h)) as usize;

    // Each sample has its own seeded generator, so results do not depend on
    // how rayon schedules the work.
    let paths: Vec<Vec<f64>> = (0..samples)
        .into_par_iter()
        .map(|s| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(s as u64));
            let offsets = trend_offsets(&mut rng, process.rate, magnitude.as_ref(), max_h);
            horizons
                .iter()
                .map(|&h| offsets[h as usize] + noise.sample(&mut rng))
                .collect()
        })
        .collect();
    debug!(samples, horizon = max_h, "simulated forecast paths");

    let lo_q = (1.0 - coverage) / 2.0;
    let hi_q = 1.0 - lo_q;
    let mut column = Vec::with_capacity(samples);
    let mut out = Vec::with_capacity(horizons.len());
    // Every in-sample date sits at distance zero and shares one band.
    let mut in_sample: Option<(f64, f64)> = None;
    for j in 0..horizons.len() {
        if horizons[j] <= 0.0 {
            if let Some(w) = in_sample {
                out.push(w);
                continue;
            }
        }
        column.clear();
        column.extend(paths.iter().map(|p| p[j]));
        column.sort_by(f64::total_cmp);
        let lo = quantile_sorted(&column, lo_q).unwrap_or(0.0);
        let hi = quantile_sorted(&column, hi_q).unwrap_or(0.0);
        let w = ((-lo).max(0.0), hi.max(0.0));
        if horizons[j] <= 0.0 {
            in_sample = Some(w);
        }
        out.push(w);
    }
    Ok(out)
}

/// Trend deviation from the point forecast at each day `0..=max_h` for one
/// simulated path of future slope changes.
fn trend_offsets(rng: &mut StdRng, rate: f64, magnitude: Option<&Exp<f64>>, max_h: usize) -> Vec<f64> {
    let mut offsets = vec![0.0; max_h + 1];
    let Some(magnitude) = magnitude else {
        return offsets;
    };
    let mut slope = 0.0;
    let mut level = 0.0;
    for offset in offsets.iter_mut().skip(1) {
        level += slope;
        *offset = level;
        if rng.gen_bool(rate) {
            let delta = magnitude.sample(rng);
            slope += if rng.gen_bool(0.5) { delta } else { -delta };
        }
    }
    offsets
}

/// Running maximum of each side over increasing horizon, starting from the
/// widest in-sample band so the first forecast day is never narrower than the
/// last observed one.
fn monotone_envelope(horizons: &[f64], widths: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let mut order: Vec<usize> = (0..horizons.len()).collect();
    order.sort_by(|&a, &b| horizons[a].total_cmp(&horizons[b]));

    let mut out = widths.clone();
    let (mut below, mut above) = horizons
        .iter()
        .zip(&widths)
        .filter(|(h, _)| **h <= 0.0)
        .fold((0.0_f64, 0.0_f64), |(b, a), (_, w)| (b.max(w.0), a.max(w.1)));
    for i in order {
        if horizons[i] > 0.0 {
            below = below.max(widths[i].0);
            above = above.max(widths[i].1);
            out[i] = (below, above);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_form_variance_grows_cubically() {
        let p = TrendChangeProcess { rate: 0.2, scale: 1.5 };
        assert_eq!(p.variance(0.0), 0.0);
        assert!((p.variance(10.0) - 0.2 * 2.0 * 2.25 * 1000.0 / 3.0).abs() < 1e-9);
        assert!((p.variance(20.0) / p.variance(10.0) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn normal_widths_are_symmetric_and_noise_only_in_sample() {
        let p = TrendChangeProcess { rate: 0.1, scale: 2.0 };
        let w = normal_widths(&p, 10.0, &[0.0, 5.0], 0.8).unwrap();
        assert!((w[0].0 - 1.2816 * 10.0).abs() < 0.01);
        assert_eq!(w[1].0, w[1].1);
        assert!(w[1].0 > w[0].0);
    }

    #[test]
    fn envelope_never_shrinks_forward() {
        let horizons = [0.0, 0.0, 1.0, 2.0, 3.0];
        let raw = vec![(5.0, 5.0), (4.0, 4.0), (3.0, 6.0), (2.0, 8.0), (7.0, 7.0)];
        let out = monotone_envelope(&horizons, raw);
        assert_eq!(out[0], (5.0, 5.0));
        assert_eq!(out[1], (4.0, 4.0));
        assert_eq!(out[2], (5.0, 6.0));
        assert_eq!(out[3], (5.0, 8.0));
        assert_eq!(out[4], (7.0, 8.0));
    }

    #[test]
    fn in_sample_dates_share_one_simulated_band() {
        let p = TrendChangeProcess { rate: 0.0, scale: 0.0 };
        let w = simulated_widths(&p, 10.0, &[0.0, 0.0, 0.0, 1.0], 0.8, 300, 3).unwrap();
        assert_eq!(w[0], w[1]);
        assert_eq!(w[1], w[2]);
    }

    #[test]
    fn simulated_noise_band_never_narrows_past_last_observation() {
        let p = TrendChangeProcess { rate: 0.0, scale: 0.0 };
        let horizons = [0.0, 1.0, 2.0];
        for seed in 0..20 {
            let raw = simulated_widths(&p, 10.0, &horizons, 0.8, 200, seed).unwrap();
            let w = monotone_envelope(&horizons, raw);
            assert!(w[1].0 >= w[0].0 && w[1].1 >= w[0].1, "seed {seed}: {w:?}");
            assert!(w[2].0 >= w[1].0 && w[2].1 >= w[1].1, "seed {seed}: {w:?}");
        }
    }

    #[test]
    fn simulation_is_seeded() {
        let p = TrendChangeProcess { rate: 0.2, scale: 1.0 };
        let h: Vec<f64> = (0..30).map(f64::from).collect();
        let a = simulated_widths(&p, 3.0, &h, 0.8, 200, 7).unwrap();
        let b = simulated_widths(&p, 3.0, &h, 0.8, 200, 7).unwrap();
        let c = simulated_widths(&p, 3.0, &h, 0.8, 200, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn without_trend_changes_simulation_matches_noise_band() {
        let p = TrendChangeProcess { rate: 0.0, scale: 0.0 };
        let w = simulated_widths(&p, 10.0, &[1.0, 2.0, 3.0], 0.8, 4000, 1).unwrap();
        for (below, above) in w {
            assert!((below - 12.8).abs() < 1.5, "below {below}");
            assert!((above - 12.8).abs() < 1.5, "above {above}");
        }
    }
}
