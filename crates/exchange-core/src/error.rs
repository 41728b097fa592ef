//! Adapter failure kinds.

use thiserror::Error;

/// A transport, protocol, or venue-reported failure from an exchange
/// adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("venue rejected request: {0}")]
    Venue(String),

    #[error("unknown order: {0}")]
    UnknownOrder(String),

    #[error("unsupported symbol: {0}")]
    UnsupportedSymbol(String),
}
