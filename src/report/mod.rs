//! Reporting utilities: in-sample residuals, outlier rankings, formatted output.

pub mod format;

pub use format::*;

use chrono::NaiveDate;

use crate::domain::Observation;
use crate::error::{ForecastError, Result};
use crate::fit::FittedModel;

/// One observation against its in-sample fitted value.
#[derive(Debug, Clone, PartialEq)]
pub struct Residual {
    pub date: NaiveDate,
    pub actual: f64,
    pub fitted: f64,
    pub residual: f64,
}

/// Largest under- and over-predictions (top-N each side).
#[derive(Debug, Clone)]
pub struct Outliers {
    /// Actual above fitted (positive residual).
    pub above: Vec<Residual>,
    /// Actual below fitted (negative residual).
    pub below: Vec<Residual>,
}

/// Fitted value and residual for each observation.
pub fn compute_residuals(observations: &[Observation], fitted: &FittedModel) -> Result<Vec<Residual>> {
    observations
        .iter()
        .map(|o| {
            let value = fitted.value_at(o.date);
            if !value.is_finite() {
                return Err(ForecastError::FitDidNotConverge {
                    iterations: fitted.iterations(),
                    reason: format!("non-finite fitted value at {}", o.date),
                });
            }
            Ok(Residual {
                date: o.date,
                actual: o.value,
                fitted: value,
                residual: o.value - value,
            })
        })
        .collect()
}

/// Rank residuals from both ends.
pub fn rank_outliers(residuals: &[Residual], top_n: usize) -> Outliers {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| b.residual.total_cmp(&a.residual));
    let above = sorted.iter().take(top_n).filter(|r| r.residual > 0.0).cloned().collect();
    let below = sorted.iter().rev().take(top_n).filter(|r| r.residual < 0.0).cloned().collect();
    Outliers { above, below }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residual(day: u32, r: f64) -> Residual {
        Residual {
            date: NaiveDate::from_ymd_opt(2020, 6, day).unwrap(),
            actual: 100.0 + r,
            fitted: 100.0,
            residual: r,
        }
    }

    #[test]
    fn outliers_come_from_both_ends() {
        let residuals = vec![residual(1, 0.5), residual(2, 30.0), residual(3, -12.0), residual(4, -1.0)];
        let outliers = rank_outliers(&residuals, 1);
        assert_eq!(outliers.above.len(), 1);
        assert_eq!(outliers.above[0].residual, 30.0);
        assert_eq!(outliers.below.len(), 1);
        assert_eq!(outliers.below[0].residual, -12.0);
    }

    #[test]
    fn sides_only_hold_matching_signs() {
        let residuals = vec![residual(1, 2.0), residual(2, 3.0)];
        let outliers = rank_outliers(&residuals, 5);
        assert_eq!(outliers.above.len(), 2);
        assert!(outliers.below.is_empty());
    }
}
