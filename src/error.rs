//! Error type shared by every stage of the pipeline.
//!
//! Each variant is a distinct failure kind the caller can match on. The binary
//! maps them onto process exit codes via [`ForecastError::exit_code`]:
//!
//! - `2`: malformed input, bad configuration, IO
//! - `3`: not enough data (under-determined fit, empty split)
//! - `4`: numerical failure (solver did not converge)

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ForecastError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Raw rows could not be turned into a usable series.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The regression has more free parameters than observations.
    #[error("insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Backtest split leaves the train or test side empty.
    #[error("invalid split: {0}")]
    InvalidSplit(String),

    /// Penalized solve hit its iteration or time cap.
    #[error("fit did not converge after {iterations} iterations: {reason}")]
    FitDidNotConverge { iterations: usize, reason: String },

    /// A model or calendar setting is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Io(String),
}

impl ForecastError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ForecastError::MalformedInput(_) | ForecastError::InvalidConfig(_) | ForecastError::Io(_) => 2,
            ForecastError::InsufficientData { .. } | ForecastError::InvalidSplit(_) => 3,
            ForecastError::FitDidNotConverge { .. } => 4,
        }
    }

    pub(crate) fn io(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        ForecastError::Io(format!("{context}: {err}"))
    }
}
