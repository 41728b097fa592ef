//! Per-invocation strategy context.

use std::sync::Arc;

use execution_core::{ExecutionCore, RouterError};
use model::{now_ms, Event, Order, OrderId, OrderStatus, StrategySignal};

/// Handle passed into every strategy hook.
///
/// Carries the execution core for order operations and quote lookups, plus
/// the timestamp at which the dispatch began. Strategies use the context
/// instead of storing runtime references, which keeps ownership a tree:
/// the runtime owns strategies, never the other way around.
pub struct StrategyContext {
    /// Dispatch timestamp in milliseconds since the epoch.
    pub timestamp_ms: i64,
    core: Arc<ExecutionCore>,
}

impl StrategyContext {
    pub fn new(core: Arc<ExecutionCore>) -> Self {
        Self {
            timestamp_ms: now_ms(),
            core,
        }
    }

    /// Submit an order on the named exchange, through the risk gate.
    pub async fn submit_order(
        &self,
        order: Order,
        exchange: &str,
    ) -> Result<OrderId, RouterError> {
        self.core.submit_order(order, exchange).await
    }

    /// Request cancellation of a live order.
    pub async fn cancel_order(&self, order_id: &OrderId, exchange: &str) -> Result<(), RouterError> {
        self.core.cancel_order(order_id, exchange).await
    }

    /// Query the venue for an order's status.
    pub async fn get_order_status(
        &self,
        order_id: &OrderId,
        exchange: &str,
    ) -> Result<OrderStatus, RouterError> {
        self.core.get_order_status(order_id, exchange).await
    }

    /// Announce an order intent on the bus, for observability.
    pub fn publish_signal(&self, signal: StrategySignal) {
        let _ = self
            .core
            .publish(Event::strategy_signal(signal, now_ms()));
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.core.market_state().last_price(symbol)
    }

    pub fn best_bid(&self, symbol: &str) -> Option<f64> {
        self.core.market_state().best_bid(symbol)
    }

    pub fn best_ask(&self, symbol: &str) -> Option<f64> {
        self.core.market_state().best_ask(symbol)
    }

    pub fn mid_price(&self, symbol: &str) -> Option<f64> {
        self.core.market_state().mid_price(symbol)
    }
}
