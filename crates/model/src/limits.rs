//! Pre-trade risk limits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Limits evaluated by the risk manager before an order leaves the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Maximum notional (price x volume) of a single order.
    pub max_order_size: f64,
    /// Maximum absolute position per symbol, in base units.
    pub max_position_size: f64,
    /// Maximum gross exposure over current balance.
    pub max_leverage: f64,
    /// Maximum peak-to-current balance drawdown, as a fraction.
    pub max_drawdown: f64,
    /// Maximum loss since the daily reset, in quote units.
    pub max_daily_loss: f64,
    /// Per-symbol volume caps, overriding nothing else.
    #[serde(default)]
    pub symbol_limits: HashMap<String, f64>,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_size: 100_000.0,
            max_position_size: 1_000_000.0,
            max_leverage: 3.0,
            max_drawdown: 0.1,
            max_daily_loss: 10_000.0,
            symbol_limits: HashMap::new(),
        }
    }
}

impl RiskLimits {
    /// The volume cap for a symbol, if one is configured.
    pub fn symbol_limit(&self, symbol: &str) -> Option<f64> {
        self.symbol_limits.get(symbol).copied()
    }
}
