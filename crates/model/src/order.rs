//! Order intents, lifecycle updates, and trade reports.

use serde::{Deserialize, Serialize};

use crate::VOLUME_EPSILON;

/// Exchange-assigned order identifier. Opaque; strategies never mint one.
pub type OrderId = String;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Sign applied to a volume on this side (+1 buy, -1 sell).
    pub fn sign(&self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderType {
    /// Whether this type requires a positive limit price.
    pub fn requires_price(&self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit)
    }
}

/// Order status as reported by the venue.
///
/// Statuses form a DAG: `Pending -> {Partial, Filled, Cancelled, Rejected}`,
/// `Partial -> {Partial, Filled, Cancelled}`; `Filled`, `Cancelled`, and
/// `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Partial,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Check if this is a terminal status (order is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }

    /// Check whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match self {
            Self::Pending => matches!(
                next,
                Self::Partial | Self::Filled | Self::Cancelled | Self::Rejected
            ),
            Self::Partial => matches!(next, Self::Partial | Self::Filled | Self::Cancelled),
            Self::Filled | Self::Cancelled | Self::Rejected => false,
        }
    }
}

/// An order intent: what a strategy asks the router to place.
///
/// The exchange assigns the [`OrderId`]; until then the intent is identified
/// by `client_order_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Trading pair symbol in the exchange's native form.
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    /// Limit price. Ignored for market orders.
    pub price: f64,
    /// Requested quantity. Must be positive.
    pub volume: f64,
    /// Caller-supplied correlation id.
    pub client_order_id: String,
}

impl Order {
    pub fn new(
        symbol: impl Into<String>,
        order_type: OrderType,
        side: OrderSide,
        price: f64,
        volume: f64,
        client_order_id: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            order_type,
            side,
            price,
            volume,
            client_order_id: client_order_id.into(),
        }
    }

    /// Convenience constructor for a limit order.
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        price: f64,
        volume: f64,
        client_order_id: impl Into<String>,
    ) -> Self {
        Self::new(symbol, OrderType::Limit, side, price, volume, client_order_id)
    }

    /// Convenience constructor for a market order.
    pub fn market(
        symbol: impl Into<String>,
        side: OrderSide,
        volume: f64,
        client_order_id: impl Into<String>,
    ) -> Self {
        Self::new(symbol, OrderType::Market, side, 0.0, volume, client_order_id)
    }

    /// Price x volume.
    pub fn notional(&self) -> f64 {
        self.price * self.volume
    }

    /// Volume signed by side (+ for buys, - for sells).
    pub fn signed_volume(&self) -> f64 {
        self.side.sign() * self.volume
    }

    /// Check the intent invariants: positive volume, and a positive price
    /// for order types that carry one.
    ///
    /// Returns a human-readable description of the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.volume <= VOLUME_EPSILON {
            return Err(format!("volume must be positive, got {}", self.volume));
        }
        if self.order_type.requires_price() && self.price <= 0.0 {
            return Err(format!(
                "{:?} order requires a positive price, got {}",
                self.order_type, self.price
            ));
        }
        Ok(())
    }
}

/// A status update for one order, as reported by the venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub status: OrderStatus,
    /// Average fill price so far (0 when nothing filled).
    pub filled_price: f64,
    /// Cumulative filled volume. Monotonically non-decreasing over the life
    /// of the order.
    pub filled_volume: f64,
    pub timestamp_ms: i64,
    /// Venue-provided free text (reject reasons and the like).
    pub message: String,
}

/// A single trade (fill) on an order. One or more per order; the volumes of
/// all trades for an order sum to at most the order volume, with equality
/// exactly when the order finishes `Filled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeUpdate {
    pub order_id: OrderId,
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub side: OrderSide,
    pub timestamp_ms: i64,
}

impl TradeUpdate {
    /// Volume signed by side (+ for buys, - for sells).
    pub fn signed_volume(&self) -> f64 {
        self.side.sign() * self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Partial.is_terminal());
    }

    #[test]
    fn test_status_dag() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Partial));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Rejected));
        assert!(OrderStatus::Partial.can_transition_to(OrderStatus::Partial));
        assert!(OrderStatus::Partial.can_transition_to(OrderStatus::Filled));

        // Partial orders cannot be rejected, only cancelled.
        assert!(!OrderStatus::Partial.can_transition_to(OrderStatus::Rejected));

        for terminal in [
            OrderStatus::Filled,
            OrderStatus::Cancelled,
            OrderStatus::Rejected,
        ] {
            assert!(!terminal.can_transition_to(OrderStatus::Pending));
            assert!(!terminal.can_transition_to(OrderStatus::Filled));
        }
    }

    #[test]
    fn test_validate_volume() {
        let order = Order::limit("BTCUSDT", OrderSide::Buy, 50_000.0, 0.0, "c1");
        assert!(order.validate().is_err());

        let order = Order::limit("BTCUSDT", OrderSide::Buy, 50_000.0, 0.5, "c1");
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_validate_price_required() {
        let mut order = Order::new(
            "BTCUSDT",
            OrderType::StopLimit,
            OrderSide::Sell,
            0.0,
            1.0,
            "c2",
        );
        assert!(order.validate().is_err());

        order.price = 48_000.0;
        assert!(order.validate().is_ok());

        // Market orders carry no price.
        let market = Order::market("BTCUSDT", OrderSide::Buy, 1.0, "c3");
        assert!(market.validate().is_ok());
    }

    #[test]
    fn test_signed_volume() {
        let buy = Order::market("BTCUSDT", OrderSide::Buy, 2.0, "c");
        let sell = Order::market("BTCUSDT", OrderSide::Sell, 2.0, "c");
        assert_eq!(buy.signed_volume(), 2.0);
        assert_eq!(sell.signed_volume(), -2.0);
    }
}
