//! Strategy error types.

use execution_core::RouterError;
use model::StrategyStatus;
use thiserror::Error;

/// Errors raised by strategy hooks and lifecycle transitions.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// A lifecycle call that the state machine does not allow.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: StrategyStatus,
        to: StrategyStatus,
    },

    /// `on_initialize` failed; the strategy is now in `ERROR`.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// A hook failed while the strategy was operating.
    #[error("strategy execution failed: {0}")]
    Execution(String),

    /// An order operation through the execution core failed.
    #[error(transparent)]
    Router(#[from] RouterError),
}
