//! Series preparation: raw rows into a clean, strictly increasing daily series.
//!
//! - dates are parsed from a small set of formats (ISO plus the US-style dates
//!   of the JHU dataset)
//! - rows are sorted by date, and a repeated date keeps the last row in input
//!   order
//! - negative values (downward revisions) are clamped to zero and reported
//! - missing calendar days stay missing; they are counted, never filled

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::{Observation, PreparedSeries, RawRow};
use crate::error::{ForecastError, Result};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d"];

/// Minimum observations a prepared series must keep by default.
pub const DEFAULT_MIN_OBSERVATIONS: usize = 14;

#[derive(Debug, Clone)]
pub struct SeriesPreparer {
    min_observations: usize,
}

impl Default for SeriesPreparer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_OBSERVATIONS)
    }
}

impl SeriesPreparer {
    pub fn new(min_observations: usize) -> Self {
        Self { min_observations }
    }

    pub fn prepare(&self, rows: &[RawRow]) -> Result<PreparedSeries> {
        // BTreeMap gives date order; inserting in input order keeps the last
        // duplicate.
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        let mut duplicates_dropped = 0usize;
        for (i, row) in rows.iter().enumerate() {
            let date = parse_date(&row.date)
                .ok_or_else(|| ForecastError::MalformedInput(format!("row {}: unparseable date '{}'", i + 1, row.date)))?;
            if !row.value.is_finite() {
                return Err(ForecastError::MalformedInput(format!(
                    "row {} ({date}): value {} is not finite",
                    i + 1,
                    row.value
                )));
            }
            if by_date.insert(date, row.value).is_some() {
                duplicates_dropped += 1;
            }
        }

        if by_date.len() < self.min_observations {
            return Err(ForecastError::MalformedInput(format!(
                "{} usable observations, at least {} required",
                by_date.len(),
                self.min_observations
            )));
        }

        let mut clamped = Vec::new();
        let observations: Vec<Observation> = by_date
            .into_iter()
            .map(|(date, value)| {
                if value < 0.0 {
                    clamped.push(date);
                    Observation::new(date, 0.0)
                } else {
                    Observation::new(date, value)
                }
            })
            .collect();

        let span = match (observations.first(), observations.last()) {
            (Some(first), Some(last)) => (last.date - first.date).num_days() as usize + 1,
            _ => 0,
        };
        let missing_days = span.saturating_sub(observations.len());

        if !clamped.is_empty() {
            warn!(count = clamped.len(), first = %clamped[0], "negative values clamped to zero");
        }
        if duplicates_dropped > 0 {
            warn!(duplicates_dropped, "duplicate dates dropped (last row kept)");
        }
        if missing_days > 0 {
            warn!(missing_days, "calendar gaps left unfilled");
        }
        debug!(observations = observations.len(), "series prepared");

        Ok(PreparedSeries {
            observations,
            clamped,
            duplicates_dropped,
            missing_days,
        })
    }
}

/// Parse a date in any accepted format.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
