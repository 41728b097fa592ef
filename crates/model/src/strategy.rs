//! Strategy classification and lifecycle states.

use serde::{Deserialize, Serialize};

/// Broad family a strategy belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    MarketMaking,
    TrendFollowing,
    MeanReversion,
    Arbitrage,
}

/// Lifecycle state of a strategy.
///
/// `Initialized -> Running -> Stopped`, with `Error` reachable from any
/// state. Terminal-state strategies receive no further events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyStatus {
    Initialized,
    Running,
    Stopped,
    Error,
}

impl std::fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initialized => "INITIALIZED",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// A `(symbol, exchange)` pair a strategy wants market data for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketSubscription {
    pub symbol: String,
    pub exchange: String,
}

impl MarketSubscription {
    pub fn new(symbol: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
        }
    }
}
