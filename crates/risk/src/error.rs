//! Risk rejection reasons.

use thiserror::Error;

/// Why the risk manager refused an order. The first failing check wins;
/// checks run in the order the variants are declared.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskRejection {
    /// Order notional exceeds the single-order cap.
    #[error("order notional {notional} exceeds limit {limit}")]
    Notional { notional: f64, limit: f64 },

    /// Order volume exceeds the per-symbol cap.
    #[error("order volume {volume} exceeds symbol limit {limit} for {symbol}")]
    SymbolLimit {
        symbol: String,
        volume: f64,
        limit: f64,
    },

    /// The projected position after this order exceeds the position cap.
    #[error("projected position {projected} exceeds limit {limit} for {symbol}")]
    PositionLimit {
        symbol: String,
        projected: f64,
        limit: f64,
    },

    /// Gross exposure over balance exceeds the leverage cap, or the account
    /// has no balance to lever.
    #[error("leverage {leverage} exceeds limit {limit}")]
    Leverage { leverage: f64, limit: f64 },

    /// Balance drawdown from the peak exceeds the cap.
    #[error("drawdown {drawdown} exceeds limit {limit}")]
    Drawdown { drawdown: f64, limit: f64 },

    /// Loss since the daily reset exceeds the cap.
    #[error("daily loss {loss} exceeds limit {limit}")]
    DailyLoss { loss: f64, limit: f64 },
}
