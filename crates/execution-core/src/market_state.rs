//! Last-quote cache shared between the core and strategies.

use std::collections::HashMap;
use std::sync::Arc;

use model::MarketData;
use parking_lot::RwLock;

/// Top-of-book snapshot for one symbol.
#[derive(Debug, Clone, Copy)]
pub struct Quote {
    pub last_price: f64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub timestamp_ms: i64,
}

/// Latest quotes per symbol, updated by the core's market data handler and
/// read by strategies through their context.
#[derive(Default)]
pub struct MarketState {
    quotes: RwLock<HashMap<String, Quote>>,
}

impl MarketState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, data: &MarketData) {
        self.quotes.write().insert(
            data.symbol.clone(),
            Quote {
                last_price: data.last_price,
                best_bid: data.best_bid,
                best_ask: data.best_ask,
                timestamp_ms: data.timestamp_ms,
            },
        );
    }

    pub fn quote(&self, symbol: &str) -> Option<Quote> {
        self.quotes.read().get(symbol).copied()
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.quote(symbol).map(|q| q.last_price)
    }

    pub fn best_bid(&self, symbol: &str) -> Option<f64> {
        self.quote(symbol).map(|q| q.best_bid)
    }

    pub fn best_ask(&self, symbol: &str) -> Option<f64> {
        self.quote(symbol).map(|q| q.best_ask)
    }

    pub fn mid_price(&self, symbol: &str) -> Option<f64> {
        self.quote(symbol).and_then(|q| {
            if q.best_bid > 0.0 && q.best_ask > 0.0 {
                Some((q.best_bid + q.best_ask) / 2.0)
            } else {
                None
            }
        })
    }
}

/// Shared market state handle.
pub type SharedMarketState = Arc<MarketState>;

pub fn create_market_state() -> SharedMarketState {
    Arc::new(MarketState::new())
}
