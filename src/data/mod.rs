//! Built-in data sources.

pub mod synthetic;

pub use synthetic::*;
