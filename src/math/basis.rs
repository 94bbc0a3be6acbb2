//! Basis functions for the additive regression.
//!
//! - Fourier terms: `sin(2πk·t/P)`, `cos(2πk·t/P)` for `k = 1..order`
//! - Hinge terms: `(s - c)+`, the piecewise-linear trend basis
//!
//! Fourier terms are evaluated on days since 1970-01-01 rather than days since
//! the start of the history, so the phase of a fitted component does not depend
//! on which window it was trained on.

use chrono::NaiveDate;
use std::f64::consts::PI;

/// Days since 1970-01-01 (negative before).
pub fn epoch_days(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as f64
}

/// Fourier terms `[sin_1, cos_1, ..., sin_order, cos_order]` at time `t` (days).
pub fn fourier_terms(t: f64, period: f64, order: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(2 * order);
    fill_fourier_terms(t, period, order, &mut out);
    out
}

/// Append Fourier terms to `out` (avoids an allocation per row when building
/// design matrices).
pub fn fill_fourier_terms(t: f64, period: f64, order: usize, out: &mut Vec<f64>) {
    for k in 1..=order {
        let x = 2.0 * PI * k as f64 * t / period;
        out.push(x.sin());
        out.push(x.cos());
    }
}

/// Hinge `(s - c)+`.
pub fn hinge(s: f64, c: f64) -> f64 {
    (s - c).max(0.0)
}
