//! Input/output helpers.
//!
//! - CSV ingest, long and JHU wide layouts (`ingest`)
//! - raw rows to a clean daily series (`prepare`)
//! - event calendar files (`calendar`)
//! - forecast/components/backtest CSV exports (`export`)
//! - fitted-model JSON read/write (`model_file`)

pub mod calendar;
pub mod export;
pub mod ingest;
pub mod model_file;
pub mod prepare;

pub use calendar::*;
pub use export::*;
pub use ingest::*;
pub use model_file::*;
pub use prepare::*;
