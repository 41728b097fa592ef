//! Historical event replay through the strategy machinery.
//!
//! The [`BacktestEngine`] feeds a time-ordered event stream (CSV-loaded
//! market data and scripted fills, or anything injected by hand) to a
//! strategy wrapped in the same lifecycle helper the live runtime uses,
//! while keeping capital, position, and equity accounting on the side. The
//! result is a [`BacktestReport`] with the usual summary statistics and CSV
//! writers for the equity curve and the trade log.

mod engine;
mod report;

pub use engine::{BacktestConfig, BacktestEngine, BacktestError};
pub use report::{BacktestReport, ReportError};
