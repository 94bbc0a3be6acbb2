//! Model components: calendar events, seasonal basis, piecewise trend, and the
//! additive design that combines them.

pub mod calendar;
pub mod design;
pub mod seasonal;
pub mod trend;

pub use calendar::*;
pub use design::*;
pub use seasonal::*;
pub use trend::*;

use crate::domain::Observation;
use crate::error::{ForecastError, Result};

/// Reject empty, unsorted or non-finite observation sequences before any fit
/// state is built.
pub(crate) fn check_observations(observations: &[Observation]) -> Result<()> {
    if observations.is_empty() {
        return Err(ForecastError::MalformedInput("no observations".to_string()));
    }
    if let Some(bad) = observations.iter().find(|o| !o.value.is_finite()) {
        return Err(ForecastError::MalformedInput(format!("non-finite value on {}", bad.date)));
    }
    if let Some(pair) = observations.windows(2).find(|w| w[1].date <= w[0].date) {
        return Err(ForecastError::MalformedInput(format!(
            "observations must be strictly increasing by date ({} then {})",
            pair[0].date, pair[1].date
        )));
    }
    Ok(())
}
