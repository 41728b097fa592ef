//! CPU implementations of the numeric kernel capability set.
//!
//! Every kernel takes input slices and caller-sized output slices and
//! validates lengths up front. These are the compute primitives strategies
//! build signals from; a GPU backend could implement the same signatures,
//! but the CPU versions here are the conformance target.

mod error;
mod options;
mod portfolio;
mod sim;
mod ta;

pub use error::KernelError;
pub use options::{black_scholes, OptionContract};
pub use portfolio::{portfolio_optimization, value_at_risk};
pub use sim::{monte_carlo, PathSpec};
pub use ta::{bollinger_bands, exponential_moving_average, moving_average, rsi};
