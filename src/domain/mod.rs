//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw and prepared series (`RawRow`, `Observation`, `PreparedSeries`)
//! - calendar events (`Event`)
//! - fitted pieces and outputs (`TrendSegment`, `SeasonalComponent`, `ForecastPoint`, ...)
//! - configuration (`ModelConfig`, `RunConfig`)

pub mod types;

pub use types::*;
