//! In-process venue simulation.
//!
//! Fills orders instantly at the limit price (or the last injected market
//! price for market orders), keeps a cash and position ledger, and reports
//! everything back through the event sink the way a live adapter would.
//! Used by the runner's dry mode and by integration tests.

use dashmap::DashMap;
use model::{
    now_ms, Balance, Event, ExchangeInfo, MarketData, Order, OrderId, OrderSide, OrderStatus,
    OrderType, OrderUpdate, Position, TradeUpdate,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use async_trait::async_trait;

use crate::adapter::ExchangeAdapter;
use crate::error::AdapterError;
use crate::sink::EventSink;

/// Quote asset the cash ledger is denominated in.
const QUOTE_ASSET: &str = "USDT";

/// When simulated orders fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Fill fully as soon as the order is accepted.
    Immediate,
    /// Rest until [`PaperExchange::fill_order`] is called.
    Resting,
}

struct PaperOrder {
    order: Order,
    status: OrderStatus,
    filled_volume: f64,
    fill_price: f64,
}

/// A simulated exchange venue.
pub struct PaperExchange {
    name: String,
    fill_mode: FillMode,
    fee_rate: f64,
    supported: Vec<String>,
    sink: RwLock<Option<EventSink>>,
    last_prices: DashMap<String, f64>,
    subscribed: DashMap<String, ()>,
    orders: DashMap<OrderId, PaperOrder>,
    positions: DashMap<String, Position>,
    cash: Mutex<f64>,
}

impl PaperExchange {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fill_mode: FillMode::Immediate,
            fee_rate: 0.0,
            supported: Vec::new(),
            sink: RwLock::new(None),
            last_prices: DashMap::new(),
            subscribed: DashMap::new(),
            orders: DashMap::new(),
            positions: DashMap::new(),
            cash: Mutex::new(0.0),
        }
    }

    pub fn with_fill_mode(mut self, mode: FillMode) -> Self {
        self.fill_mode = mode;
        self
    }

    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Restrict trading to the given symbols.
    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.supported = symbols;
        self
    }

    /// Set the starting cash balance.
    pub fn set_cash(&self, amount: f64) {
        *self.cash.lock() = amount;
    }

    pub fn cash(&self) -> f64 {
        *self.cash.lock()
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_prices.get(symbol).map(|p| *p)
    }

    /// Feed a market data tick into the simulation. Updates the last price
    /// and republishes the tick to the runtime when the symbol has an
    /// active subscription.
    pub fn inject_market_data(&self, data: MarketData) {
        self.last_prices.insert(data.symbol.clone(), data.last_price);
        if self.subscribed.contains_key(&data.symbol) {
            self.emit(Event::market_data(data, self.name.clone()));
        }
    }

    /// Fill a resting order completely, at its recorded fill price.
    pub fn fill_order(&self, order_id: &str) -> Result<(), AdapterError> {
        if !self.orders.contains_key(order_id) {
            return Err(AdapterError::UnknownOrder(order_id.to_string()));
        }
        self.execute_fill(order_id);
        Ok(())
    }

    fn check_symbol(&self, symbol: &str) -> Result<(), AdapterError> {
        if !self.supported.is_empty() && !self.supported.iter().any(|s| s == symbol) {
            return Err(AdapterError::UnsupportedSymbol(symbol.to_string()));
        }
        Ok(())
    }

    fn emit(&self, event: Event) {
        if let Some(sink) = self.sink.read().as_ref() {
            sink.publish(event);
        }
    }

    fn execute_fill(&self, order_id: &str) {
        let (order, price) = {
            let mut entry = match self.orders.get_mut(order_id) {
                Some(entry) => entry,
                None => return,
            };
            if entry.status.is_terminal() {
                return;
            }
            entry.status = OrderStatus::Filled;
            entry.filled_volume = entry.order.volume;
            (entry.order.clone(), entry.fill_price)
        };

        let notional = price * order.volume;
        let fee = notional * self.fee_rate;
        {
            let mut cash = self.cash.lock();
            match order.side {
                OrderSide::Buy => *cash -= notional + fee,
                OrderSide::Sell => *cash += notional - fee,
            }
        }

        self.positions
            .entry(order.symbol.clone())
            .or_insert_with(|| Position::new(&order.symbol))
            .apply_fill(order.side.sign() * order.volume, price);

        let ts = now_ms();
        self.emit(Event::trade_update(
            TradeUpdate {
                order_id: order_id.to_string(),
                symbol: order.symbol.clone(),
                price,
                volume: order.volume,
                side: order.side,
                timestamp_ms: ts,
            },
            self.name.clone(),
        ));
        self.emit(Event::order_update(
            OrderUpdate {
                order_id: order_id.to_string(),
                status: OrderStatus::Filled,
                filled_price: price,
                filled_volume: order.volume,
                timestamp_ms: ts,
                message: String::new(),
            },
            self.name.clone(),
        ));

        debug!(
            order_id,
            symbol = %order.symbol,
            side = %order.side,
            price,
            volume = order.volume,
            "paper fill"
        );
    }
}

#[async_trait]
impl ExchangeAdapter for PaperExchange {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_symbols(&self) -> Vec<String> {
        self.supported.clone()
    }

    fn exchange_info(&self) -> ExchangeInfo {
        let mut info = ExchangeInfo::named(&self.name);
        for symbol in &self.supported {
            info.trading_fees.insert(symbol.clone(), self.fee_rate);
        }
        info
    }

    fn attach_event_sink(&self, sink: EventSink) {
        *self.sink.write() = Some(sink);
        info!(exchange = %self.name, "event sink attached");
    }

    async fn submit_order(&self, order: &Order) -> Result<OrderId, AdapterError> {
        self.check_symbol(&order.symbol)?;

        let fill_price = match order.order_type {
            OrderType::Market => self.last_price(&order.symbol).ok_or_else(|| {
                AdapterError::Venue(format!("no market price for {}", order.symbol))
            })?,
            _ => order.price,
        };

        let order_id = format!("paper-{}", Uuid::new_v4().simple());
        self.orders.insert(
            order_id.clone(),
            PaperOrder {
                order: order.clone(),
                status: OrderStatus::Pending,
                filled_volume: 0.0,
                fill_price,
            },
        );

        self.emit(Event::order_update(
            OrderUpdate {
                order_id: order_id.clone(),
                status: OrderStatus::Pending,
                filled_price: 0.0,
                filled_volume: 0.0,
                timestamp_ms: now_ms(),
                message: String::new(),
            },
            self.name.clone(),
        ));

        if self.fill_mode == FillMode::Immediate {
            self.execute_fill(&order_id);
        }

        Ok(order_id)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), AdapterError> {
        {
            let mut entry = self
                .orders
                .get_mut(order_id)
                .ok_or_else(|| AdapterError::UnknownOrder(order_id.clone()))?;
            if entry.status.is_terminal() {
                return Err(AdapterError::Venue(format!(
                    "order {order_id} already {:?}",
                    entry.status
                )));
            }
            entry.status = OrderStatus::Cancelled;
        }

        self.emit(Event::order_update(
            OrderUpdate {
                order_id: order_id.clone(),
                status: OrderStatus::Cancelled,
                filled_price: 0.0,
                filled_volume: 0.0,
                timestamp_ms: now_ms(),
                message: "cancelled".to_string(),
            },
            self.name.clone(),
        ));
        Ok(())
    }

    async fn get_order_status(&self, order_id: &OrderId) -> Result<OrderStatus, AdapterError> {
        self.orders
            .get(order_id)
            .map(|entry| entry.status)
            .ok_or_else(|| AdapterError::UnknownOrder(order_id.clone()))
    }

    async fn get_balance(&self) -> Result<Balance, AdapterError> {
        let mut balance = Balance::new();
        balance.set(QUOTE_ASSET, *self.cash.lock(), 0.0);
        Ok(balance)
    }

    async fn get_positions(&self) -> Result<Vec<Position>, AdapterError> {
        Ok(self
            .positions
            .iter()
            .filter(|entry| !entry.is_flat())
            .map(|entry| entry.clone())
            .collect())
    }

    async fn subscribe_market_data(&self, symbol: &str) -> Result<(), AdapterError> {
        self.check_symbol(symbol)?;
        self.subscribed.insert(symbol.to_string(), ());
        debug!(exchange = %self.name, symbol, "market data subscribed");
        Ok(())
    }

    async fn unsubscribe_market_data(&self, symbol: &str) -> Result<(), AdapterError> {
        self.subscribed.remove(symbol);
        debug!(exchange = %self.name, symbol, "market data unsubscribed");
        Ok(())
    }
}
