//! Moving-average crossover trend following.

use async_trait::async_trait;
use model::{
    MarketData, MarketSubscription, Order, StrategyKind, TradeUpdate, VOLUME_EPSILON,
};
use strategy_core::{Strategy, StrategyContext, StrategyError};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct TrendFollowerConfig {
    pub symbol: String,
    pub exchange: String,
    /// Fast moving-average window.
    pub fast_period: usize,
    /// Slow moving-average window. Must exceed the fast one.
    pub slow_period: usize,
    /// Position size while long.
    pub order_volume: f64,
    /// Price history cap.
    pub max_history: usize,
}

impl Default for TrendFollowerConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            exchange: "paper".to_string(),
            fast_period: 5,
            slow_period: 20,
            order_volume: 0.01,
            max_history: 512,
        }
    }
}

/// Long while the fast moving average sits above the slow one, flat
/// otherwise. Orders are market orders for the difference between the
/// target and the current holding; the holding is updated from observed
/// fills, so a pending order is never doubled up.
pub struct TrendFollowerStrategy {
    name: String,
    config: TrendFollowerConfig,
    prices: Vec<f64>,
    holding: f64,
    awaiting_fill: bool,
    order_seq: u64,
}

impl TrendFollowerStrategy {
    pub fn new(name: impl Into<String>, config: TrendFollowerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            prices: Vec::new(),
            holding: 0.0,
            awaiting_fill: false,
            order_seq: 0,
        }
    }

    pub fn holding(&self) -> f64 {
        self.holding
    }

    fn record_price(&mut self, price: f64) {
        self.prices.push(price);
        if self.prices.len() > self.config.max_history {
            let excess = self.prices.len() - self.config.max_history;
            self.prices.drain(..excess);
        }
    }

    /// Latest moving-average value over the trailing `period` prices.
    fn trailing_ma(&self, period: usize) -> Option<f64> {
        if self.prices.len() < period {
            return None;
        }
        let window = &self.prices[self.prices.len() - period..];
        let mut out = [0.0];
        kernels::moving_average(window, &mut out, period).ok()?;
        Some(out[0])
    }
}

#[async_trait]
impl Strategy for TrendFollowerStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::TrendFollowing
    }

    fn subscriptions(&self) -> Vec<MarketSubscription> {
        vec![MarketSubscription::new(
            &self.config.symbol,
            &self.config.exchange,
        )]
    }

    async fn on_initialize(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
        if self.config.fast_period == 0 || self.config.fast_period >= self.config.slow_period {
            return Err(StrategyError::Execution(format!(
                "fast period {} must be positive and below slow period {}",
                self.config.fast_period, self.config.slow_period
            )));
        }
        self.prices.clear();
        self.holding = 0.0;
        self.awaiting_fill = false;
        Ok(())
    }

    async fn on_market_data(
        &mut self,
        data: &MarketData,
        ctx: &StrategyContext,
    ) -> Result<(), StrategyError> {
        if data.symbol != self.config.symbol || data.last_price <= 0.0 {
            return Ok(());
        }
        self.record_price(data.last_price);

        let (Some(fast), Some(slow)) = (
            self.trailing_ma(self.config.fast_period),
            self.trailing_ma(self.config.slow_period),
        ) else {
            return Ok(());
        };

        if self.awaiting_fill {
            return Ok(());
        }

        let target = if fast > slow {
            self.config.order_volume
        } else {
            0.0
        };
        let delta = target - self.holding;
        if delta.abs() < VOLUME_EPSILON {
            return Ok(());
        }

        let side = if delta > 0.0 {
            model::OrderSide::Buy
        } else {
            model::OrderSide::Sell
        };
        self.order_seq += 1;
        let order = Order::market(
            &self.config.symbol,
            side,
            delta.abs(),
            format!("{}-{}", self.name, self.order_seq),
        );

        match ctx.submit_order(order, &self.config.exchange).await {
            Ok(order_id) => {
                self.awaiting_fill = true;
                info!(
                    strategy = %self.name,
                    order_id = %order_id,
                    side = %side,
                    delta = delta.abs(),
                    fast,
                    slow,
                    "trend signal"
                );
            }
            Err(error) => {
                warn!(strategy = %self.name, error = %error, "trend order refused");
            }
        }
        Ok(())
    }

    async fn on_trade_update(
        &mut self,
        update: &TradeUpdate,
        _ctx: &StrategyContext,
    ) -> Result<(), StrategyError> {
        if update.symbol == self.config.symbol {
            self.holding += update.signed_volume();
            self.awaiting_fill = false;
        }
        Ok(())
    }

    fn check_risk_limits(&self) -> bool {
        self.holding.abs() <= self.config.order_volume + VOLUME_EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::StrategyManager;
    use exchange_core::{ExchangeAdapter, PaperExchange};
    use execution_core::{CoreConfig, ExecutionCore};
    use model::now_ms;
    use std::sync::Arc;
    use std::time::Duration;

    fn tick(price: f64) -> MarketData {
        MarketData::quote("BTCUSDT", now_ms(), price, price - 1.0, price + 1.0)
    }

    async fn wait_for(check: impl Fn() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_crossover_round_trip() {
        let core = ExecutionCore::new(CoreConfig::default());
        core.disable_risk_manager();
        core.start();

        let paper = Arc::new(PaperExchange::new("paper"));
        paper.set_cash(100_000.0);
        core.register_exchange("paper", Arc::clone(&paper) as exchange_core::SharedAdapter)
            .unwrap();

        let manager = StrategyManager::new(Arc::clone(&core));
        let config = TrendFollowerConfig {
            fast_period: 2,
            slow_period: 4,
            order_volume: 0.5,
            ..TrendFollowerConfig::default()
        };
        manager
            .register(Box::new(TrendFollowerStrategy::new("tf", config)))
            .unwrap();
        manager.start("tf").await.unwrap();

        // Rising prices: fast MA crosses above slow, strategy goes long.
        for price in [100.0, 101.0, 102.0, 104.0, 108.0] {
            paper.inject_market_data(tick(price));
        }

        let handle = manager.strategy("tf").unwrap();
        wait_for(|| {
            handle
                .position("BTCUSDT")
                .map(|p| (p.volume - 0.5).abs() < 1e-9)
                .unwrap_or(false)
        })
        .await;

        // Falling prices: fast MA drops below slow, strategy flattens.
        for price in [104.0, 100.0, 96.0, 92.0, 88.0] {
            paper.inject_market_data(tick(price));
        }

        wait_for(|| {
            handle
                .position("BTCUSDT")
                .map(|p| p.is_flat())
                .unwrap_or(false)
        })
        .await;

        // The venue ledger agrees.
        let venue_positions = paper.get_positions().await.unwrap();
        assert!(venue_positions.is_empty());

        manager.stop_all().await;
        core.stop().await;
    }

    #[tokio::test]
    async fn test_rejects_bad_periods() {
        let core = ExecutionCore::new(CoreConfig::default());
        let ctx = strategy_core::StrategyContext::new(core);

        let config = TrendFollowerConfig {
            fast_period: 10,
            slow_period: 5,
            ..TrendFollowerConfig::default()
        };
        let mut strategy = TrendFollowerStrategy::new("tf", config);
        assert!(strategy.on_initialize(&ctx).await.is_err());
    }
}
