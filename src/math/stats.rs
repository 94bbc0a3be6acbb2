//! Small statistical helpers used for interval construction and reporting.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{ForecastError, Result};

/// Two-sided standard normal critical value for a central interval of the
/// given coverage (e.g. `0.80 -> 1.2816`).
pub fn normal_critical_value(coverage: f64) -> Result<f64> {
    if !(coverage.is_finite() && coverage > 0.0 && coverage < 1.0) {
        return Err(ForecastError::InvalidConfig(format!(
            "interval width must be in (0, 1), got {coverage}"
        )));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| ForecastError::InvalidConfig(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + coverage / 2.0))
}

/// Linear-interpolated quantile of an already sorted slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Scale used to normalize values before fitting: `max |y|`, or 1 for an
/// all-zero series.
pub fn value_scale(values: &[f64]) -> f64 {
    let m = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if m > 0.0 && m.is_finite() { m } else { 1.0 }
}

/// Mean absolute error of aligned sequences. `None` when empty or misaligned.
pub fn mae(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return None;
    }
    let total: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();
    Some(total / actual.len() as f64)
}

/// Root mean squared error of aligned sequences.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return None;
    }
    let total: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    Some((total / actual.len() as f64).sqrt())
}
