//! Model fitting orchestration.
//!
//! Responsibilities:
//!
//! - fit trend, seasonality and events jointly (`fitter`)
//! - hold the immutable fit result (`fitted`)
//! - attach uncertainty bounds to predictions (`uncertainty`)
//! - score a model on a held-out suffix (`backtest`)

pub mod backtest;
pub mod fitted;
pub mod fitter;
pub mod uncertainty;

pub use backtest::*;
pub use fitted::*;
pub use fitter::*;
pub use uncertainty::*;
