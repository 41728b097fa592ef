//! The strategy capability trait.

use async_trait::async_trait;
use model::{MarketData, MarketSubscription, OrderUpdate, StrategyKind, TradeUpdate};

use crate::context::StrategyContext;
use crate::error::StrategyError;

/// Behavior a trading strategy plugs into the runtime.
///
/// Lifecycle hooks run once per transition; event hooks run on the event
/// processor's consumer task for every event the strategy is routed while
/// `RUNNING`. Hooks that call adapter-backed operations (order submission,
/// status queries) block that task for the duration; latency-sensitive
/// strategies should hand slow work to a background task.
///
/// Hook errors are logged by the caller and never poison other strategies.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Unique registry name.
    fn name(&self) -> &str;

    /// Strategy family, for introspection.
    fn kind(&self) -> StrategyKind;

    /// The `(symbol, exchange)` pairs this strategy wants market data for.
    fn subscriptions(&self) -> Vec<MarketSubscription>;

    /// Called once before the first start.
    async fn on_initialize(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Called when the strategy enters `RUNNING`, after market data
    /// subscriptions are installed.
    async fn on_start(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Called when the strategy leaves `RUNNING`.
    async fn on_stop(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Called from a terminal state to release resources.
    async fn on_cleanup(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
        Ok(())
    }

    /// A market data tick for one of the subscribed pairs.
    async fn on_market_data(
        &mut self,
        _data: &MarketData,
        _ctx: &StrategyContext,
    ) -> Result<(), StrategyError> {
        Ok(())
    }

    /// An order status change.
    async fn on_order_update(
        &mut self,
        _update: &OrderUpdate,
        _ctx: &StrategyContext,
    ) -> Result<(), StrategyError> {
        Ok(())
    }

    /// A fill. The handle has already applied it to the per-strategy
    /// position book before this hook runs.
    async fn on_trade_update(
        &mut self,
        _update: &TradeUpdate,
        _ctx: &StrategyContext,
    ) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Strategy-local risk verdict; `false` should make the strategy hold
    /// back new orders.
    fn check_risk_limits(&self) -> bool {
        true
    }

    /// Refresh strategy-local risk metrics (volatility estimates and the
    /// like).
    fn update_risk_metrics(&mut self) {}
}

/// A boxed strategy trait object.
pub type BoxedStrategy = Box<dyn Strategy>;
