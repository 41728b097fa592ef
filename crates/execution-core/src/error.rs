//! Routing error kinds.

use exchange_core::AdapterError;
use risk::RiskRejection;
use thiserror::Error;

/// Errors surfaced by order submission and the exchange registry.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No adapter registered under the requested name.
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),

    /// Registration under a name that is already taken.
    #[error("exchange already registered: {0}")]
    AlreadyRegistered(String),

    /// Registry operation on a name that is not present.
    #[error("exchange not found: {0}")]
    NotFound(String),

    /// Unregistration refused while live orders remain; cancel them first.
    #[error("{count} live orders remain on {exchange}")]
    ActiveOrders { exchange: String, count: usize },

    /// The order intent violates its own invariants.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// The risk manager refused the order. Returned to the caller, never
    /// treated as a fault.
    #[error("risk rejected: {0}")]
    RiskRejected(#[from] RiskRejection),

    /// The adapter reported a transport, protocol, or venue failure.
    #[error("adapter failure: {0}")]
    AdapterFailure(#[from] AdapterError),
}
