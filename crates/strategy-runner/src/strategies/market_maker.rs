//! Two-sided quoting around the mid with volatility-aware spread and
//! inventory skew.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use model::{
    MarketData, MarketSubscription, Order, OrderId, OrderSide, OrderUpdate, StrategyKind,
    TradeUpdate,
};
use strategy_core::{Strategy, StrategyContext, StrategyError};
use tracing::{debug, warn};

/// Relative mid move below which standing quotes are left alone.
const REQUOTE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct MarketMakerConfig {
    pub symbol: String,
    pub exchange: String,
    /// Base half-spread-pair as a fraction of the mid.
    pub spread_pct: f64,
    /// Spread floor and ceiling, as fractions.
    pub min_spread: f64,
    pub max_spread: f64,
    /// Size of each quote.
    pub order_volume: f64,
    /// Maximum absolute inventory before quoting pauses.
    pub inventory_limit: f64,
    /// Prices kept for the volatility estimate.
    pub price_window: usize,
    /// How strongly volatility widens the spread.
    pub vol_multiplier: f64,
    /// How strongly inventory shifts the quoted mid.
    pub skew_factor: f64,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            exchange: "paper".to_string(),
            spread_pct: 0.002,
            min_spread: 0.0005,
            max_spread: 0.02,
            order_volume: 0.01,
            inventory_limit: 0.1,
            price_window: 64,
            vol_multiplier: 1.0,
            skew_factor: 0.1,
        }
    }
}

/// Quotes a bid and an ask around the current mid. Re-quotes when the mid
/// moves, widens with realized volatility, and skews quotes against its own
/// inventory. Stops quoting entirely while inventory exceeds the limit.
pub struct MarketMakerStrategy {
    name: String,
    config: MarketMakerConfig,
    prices: VecDeque<f64>,
    volatility: f64,
    inventory: f64,
    last_quote_mid: f64,
    active_orders: HashMap<OrderId, OrderSide>,
    order_seq: u64,
}

impl MarketMakerStrategy {
    pub fn new(name: impl Into<String>, config: MarketMakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            prices: VecDeque::new(),
            volatility: 0.0,
            inventory: 0.0,
            last_quote_mid: 0.0,
            active_orders: HashMap::new(),
            order_seq: 0,
        }
    }

    pub fn inventory(&self) -> f64 {
        self.inventory
    }

    fn next_client_id(&mut self) -> String {
        self.order_seq += 1;
        format!("{}-{}", self.name, self.order_seq)
    }

    fn record_price(&mut self, price: f64) {
        self.prices.push_back(price);
        while self.prices.len() > self.config.price_window {
            self.prices.pop_front();
        }
    }

    fn compute_volatility(&mut self) {
        if self.prices.len() < 2 {
            self.volatility = 0.0;
            return;
        }
        let n = self.prices.len() as f64;
        let mean = self.prices.iter().sum::<f64>() / n;
        let variance = self.prices.iter().map(|p| (p - mean) * (p - mean)).sum::<f64>() / n;
        self.volatility = variance.sqrt();
    }

    fn target_spread(&self, mid: f64) -> f64 {
        let vol_term = if mid > 0.0 {
            self.volatility / mid * self.config.vol_multiplier
        } else {
            0.0
        };
        (self.config.spread_pct + vol_term)
            .max(self.config.min_spread)
            .min(self.config.max_spread)
    }

    async fn cancel_quotes(&mut self, ctx: &StrategyContext) {
        for (order_id, _) in self.active_orders.drain() {
            if let Err(error) = ctx.cancel_order(&order_id, &self.config.exchange).await {
                debug!(strategy = %self.name, order_id = %order_id, error = %error, "cancel failed");
            }
        }
    }

    async fn place_quotes(&mut self, mid: f64, ctx: &StrategyContext) {
        let spread = self.target_spread(mid);
        let skewed_mid = mid * (1.0 - self.inventory * self.config.skew_factor);
        let bid = skewed_mid * (1.0 - spread / 2.0);
        let ask = skewed_mid * (1.0 + spread / 2.0);

        for (side, price) in [(OrderSide::Buy, bid), (OrderSide::Sell, ask)] {
            let client_id = self.next_client_id();
            let order = Order::limit(
                &self.config.symbol,
                side,
                price,
                self.config.order_volume,
                client_id,
            );
            match ctx.submit_order(order, &self.config.exchange).await {
                Ok(order_id) => {
                    self.active_orders.insert(order_id, side);
                }
                Err(error) => {
                    warn!(strategy = %self.name, side = %side, error = %error, "quote refused");
                }
            }
        }
    }
}

#[async_trait]
impl Strategy for MarketMakerStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::MarketMaking
    }

    fn subscriptions(&self) -> Vec<MarketSubscription> {
        vec![MarketSubscription::new(
            &self.config.symbol,
            &self.config.exchange,
        )]
    }

    async fn on_initialize(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
        self.prices.clear();
        self.active_orders.clear();
        self.inventory = 0.0;
        self.volatility = 0.0;
        self.last_quote_mid = 0.0;
        Ok(())
    }

    async fn on_stop(&mut self, ctx: &StrategyContext) -> Result<(), StrategyError> {
        self.cancel_quotes(ctx).await;
        Ok(())
    }

    async fn on_market_data(
        &mut self,
        data: &MarketData,
        ctx: &StrategyContext,
    ) -> Result<(), StrategyError> {
        if data.symbol != self.config.symbol {
            return Ok(());
        }

        let mid = data.mid_price().unwrap_or(data.last_price);
        if mid <= 0.0 {
            return Ok(());
        }

        self.record_price(mid);
        self.compute_volatility();

        // Keep quotes in place while the mid holds still, within a
        // price-relative tolerance.
        let mid_unchanged = (mid - self.last_quote_mid).abs() <= mid * REQUOTE_TOLERANCE;
        if !self.active_orders.is_empty() && mid_unchanged {
            return Ok(());
        }

        self.cancel_quotes(ctx).await;

        if !self.check_risk_limits() {
            warn!(
                strategy = %self.name,
                inventory = self.inventory,
                limit = self.config.inventory_limit,
                "inventory limit reached, quoting paused"
            );
            return Ok(());
        }

        self.place_quotes(mid, ctx).await;
        self.last_quote_mid = mid;
        Ok(())
    }

    async fn on_order_update(
        &mut self,
        update: &OrderUpdate,
        _ctx: &StrategyContext,
    ) -> Result<(), StrategyError> {
        if update.status.is_terminal() {
            self.active_orders.remove(&update.order_id);
        }
        Ok(())
    }

    async fn on_trade_update(
        &mut self,
        update: &TradeUpdate,
        _ctx: &StrategyContext,
    ) -> Result<(), StrategyError> {
        if update.symbol == self.config.symbol {
            self.inventory += update.signed_volume();
        }
        Ok(())
    }

    fn check_risk_limits(&self) -> bool {
        self.inventory.abs() <= self.config.inventory_limit
    }

    fn update_risk_metrics(&mut self) {
        self.compute_volatility();
    }
}
