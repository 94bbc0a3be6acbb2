//! Additive design matrix: `[trend | seasonal | events]`.
//!
//! The fitter relies on two primitive operations:
//! - build a design row for a given date (for the penalized solve)
//! - know which column range belongs to which component (to split coefficients)

use std::ops::Range;

use chrono::NaiveDate;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::math::Penalty;
use crate::models::{EventCalendar, SeasonalBasis, TrendBasis};

/// Column ranges of each component block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub trend: Range<usize>,
    pub seasonal: Range<usize>,
    pub events: Range<usize>,
}

/// One history's full design: trend basis, seasonal basis and event columns.
#[derive(Debug, Clone)]
pub struct Design<'a> {
    pub trend: TrendBasis,
    pub seasonal: &'a SeasonalBasis,
    pub calendar: &'a EventCalendar,
    pub event_names: Vec<String>,
}

impl<'a> Design<'a> {
    pub fn new(trend: TrendBasis, seasonal: &'a SeasonalBasis, calendar: &'a EventCalendar) -> Self {
        Self {
            trend,
            seasonal,
            calendar,
            event_names: calendar.names(),
        }
    }

    pub fn layout(&self) -> ColumnLayout {
        let t = self.trend.column_count();
        let s = t + self.seasonal.feature_len();
        let e = s + self.event_names.len();
        ColumnLayout {
            trend: 0..t,
            seasonal: t..s,
            events: s..e,
        }
    }

    pub fn column_count(&self) -> usize {
        self.layout().events.end
    }

    /// Fill a design row for one date.
    pub fn fill_design_row(&self, date: NaiveDate, out: &mut Vec<f64>) {
        out.clear();
        self.trend.fill_row(date, out);
        self.seasonal.fill_features(date, out);
        self.calendar.fill_indicators(date, &self.event_names, out);
    }

    /// Build the design matrix for a set of dates. Rows are independent, so
    /// they are evaluated in parallel.
    pub fn matrix(&self, dates: &[NaiveDate]) -> DMatrix<f64> {
        let p = self.column_count();
        let rows: Vec<Vec<f64>> = dates
            .par_iter()
            .map(|&date| {
                let mut row = Vec::with_capacity(p);
                self.fill_design_row(date, &mut row);
                row
            })
            .collect();
        DMatrix::from_fn(dates.len(), p, |i, j| rows[i][j])
    }

    /// Per-column penalties: lasso on slope changes, ridge on seasonal and
    /// event coefficients, none on intercept and base slope.
    pub fn penalties(&self, trend_penalties: Vec<Penalty>, seasonal_ridge: f64, event_ridge: f64) -> Vec<Penalty> {
        let mut out = trend_penalties;
        out.extend(std::iter::repeat_n(Penalty::Ridge(seasonal_ridge), self.seasonal.feature_len()));
        out.extend(std::iter::repeat_n(Penalty::Ridge(event_ridge), self.event_names.len()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Event;
    use chrono::Duration;

    #[test]
    fn rows_follow_layout() {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let end = start + Duration::days(9);
        let trend = TrendBasis::new(start, end, vec![start + Duration::days(5)]);
        let seasonal = SeasonalBasis::new(1, 0);
        let calendar = EventCalendar::from_events([Event::new("lockdown", start + Duration::days(8)).with_window(0, 1)]).unwrap();
        let design = Design::new(trend, &seasonal, &calendar);

        let layout = design.layout();
        assert_eq!(layout.trend, 0..3);
        assert_eq!(layout.seasonal, 3..5);
        assert_eq!(layout.events, 5..6);

        let dates: Vec<NaiveDate> = (0..10).map(|i| start + Duration::days(i)).collect();
        let x = design.matrix(&dates);
        assert_eq!(x.shape(), (10, 6));
        assert_eq!(x[(0, 0)], 1.0);
        assert!((x[(9, 1)] - 1.0).abs() < 1e-12);
        assert_eq!(x[(4, 2)], 0.0);
        assert!((x[(9, 2)] - 4.0 / 9.0).abs() < 1e-12);
        assert_eq!(x[(7, 5)], 0.0);
        assert_eq!(x[(8, 5)], 1.0);
        assert_eq!(x[(9, 5)], 1.0);
    }

    #[test]
    fn penalties_cover_every_column() {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let trend = TrendBasis::new(start, start + Duration::days(30), vec![start + Duration::days(10)]);
        let seasonal = SeasonalBasis::new(3, 10);
        let calendar = EventCalendar::new();
        let design = Design::new(trend, &seasonal, &calendar);
        let pens = design.penalties(vec![Penalty::None, Penalty::None, Penalty::Lasso(0.1)], 0.01, 0.01);
        assert_eq!(pens.len(), design.column_count());
        assert_eq!(pens[3], Penalty::Ridge(0.01));
    }
}
