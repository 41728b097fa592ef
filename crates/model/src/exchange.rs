//! Static exchange metadata.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Descriptive metadata reported by an exchange adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeInfo {
    pub name: String,
    /// Taker fee rate per symbol.
    pub trading_fees: HashMap<String, f64>,
    /// Minimum order volume per symbol.
    pub minimum_orders: HashMap<String, f64>,
    /// Price decimal places per symbol.
    pub decimals: HashMap<String, u32>,
}

impl ExchangeInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
