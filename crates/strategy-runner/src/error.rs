//! Strategy manager error types.

use strategy_core::StrategyError;
use thiserror::Error;

/// Errors from strategy registry operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("strategy already registered: {0}")]
    AlreadyRegistered(String),

    #[error("strategy not found: {0}")]
    NotFound(String),

    /// A lifecycle call on the underlying strategy failed.
    #[error(transparent)]
    Strategy(#[from] StrategyError),
}
