//! Market data snapshots.

use serde::{Deserialize, Serialize};

/// One price level of depth: `(price, volume)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub volume: f64,
}

impl PriceLevel {
    pub fn new(price: f64, volume: f64) -> Self {
        Self { price, volume }
    }
}

/// A market data update for one symbol.
///
/// Depth arrays, when present, are sorted: bids descending, asks ascending.
/// `best_bid <= best_ask` whenever both sides are quoted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub timestamp_ms: i64,
    pub last_price: f64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub bid_volume: f64,
    pub ask_volume: f64,
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
}

impl MarketData {
    /// A quote-only snapshot with no depth.
    pub fn quote(
        symbol: impl Into<String>,
        timestamp_ms: i64,
        last_price: f64,
        best_bid: f64,
        best_ask: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp_ms,
            last_price,
            best_bid,
            best_ask,
            bid_volume: 0.0,
            ask_volume: 0.0,
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// Mid price, when both sides are quoted.
    pub fn mid_price(&self) -> Option<f64> {
        if self.best_bid > 0.0 && self.best_ask > 0.0 {
            Some((self.best_bid + self.best_ask) / 2.0)
        } else {
            None
        }
    }

    /// Quoted spread, when both sides are quoted.
    pub fn spread(&self) -> Option<f64> {
        if self.best_bid > 0.0 && self.best_ask > 0.0 {
            Some(self.best_ask - self.best_bid)
        } else {
            None
        }
    }

    /// Check the quote and depth invariants: an uncrossed top of book, bids
    /// sorted descending, asks ascending.
    pub fn is_consistent(&self) -> bool {
        if self.best_bid > 0.0 && self.best_ask > 0.0 && self.best_bid > self.best_ask {
            return false;
        }
        let bids_sorted = self.bids.windows(2).all(|w| w[0].price >= w[1].price);
        let asks_sorted = self.asks.windows(2).all(|w| w[0].price <= w[1].price);
        bids_sorted && asks_sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mid_and_spread() {
        let md = MarketData::quote("BTCUSDT", 1000, 50_050.0, 50_000.0, 50_100.0);
        assert_eq!(md.mid_price(), Some(50_050.0));
        assert_eq!(md.spread(), Some(100.0));

        let one_sided = MarketData::quote("BTCUSDT", 1000, 50_050.0, 50_000.0, 0.0);
        assert_eq!(one_sided.mid_price(), None);
        assert_eq!(one_sided.spread(), None);
    }

    #[test]
    fn test_consistency() {
        let mut md = MarketData::quote("BTCUSDT", 1000, 50_050.0, 50_000.0, 50_100.0);
        md.bids = vec![PriceLevel::new(50_000.0, 1.0), PriceLevel::new(49_990.0, 2.0)];
        md.asks = vec![PriceLevel::new(50_100.0, 1.0), PriceLevel::new(50_110.0, 2.0)];
        assert!(md.is_consistent());

        // Crossed book.
        let crossed = MarketData::quote("BTCUSDT", 1000, 50_050.0, 50_200.0, 50_100.0);
        assert!(!crossed.is_consistent());

        // Misordered depth.
        md.bids.reverse();
        assert!(!md.is_consistent());
    }
}
