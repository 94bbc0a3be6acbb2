//! `case-forecast` library crate.
//!
//! The binary (`cf`) is a thin wrapper around this library so that:
//!
//! - the forecasting core is testable without spawning processes
//! - modules are reusable from other front-ends or notebooks
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
