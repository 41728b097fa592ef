//! The event envelope carried by the event processor.

use serde::{Deserialize, Serialize};

use crate::market::MarketData;
use crate::order::{Order, OrderUpdate, TradeUpdate};

/// Payload of the end-of-day system event. Triggers a daily risk metric
/// reset when dispatched.
pub const SYSTEM_EVENT_EOD: &str = "EOD";

/// Discriminant over event payloads. Handler subscriptions are keyed by
/// this kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    MarketData,
    OrderUpdate,
    TradeUpdate,
    StrategySignal,
    SystemEvent,
}

/// An order intent announced by a strategy, for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySignal {
    pub strategy: String,
    pub exchange: String,
    pub order: Order,
}

/// Typed event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    MarketData(MarketData),
    OrderUpdate(OrderUpdate),
    TradeUpdate(TradeUpdate),
    StrategySignal(StrategySignal),
    /// Free-form system notice; `"EOD"` is the only payload the runtime
    /// itself reacts to.
    SystemEvent(String),
}

/// One event flowing through the processor: a typed payload plus the
/// publish timestamp and the name of the producing component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub payload: EventPayload,
    pub timestamp_ms: i64,
    /// Producing component, typically an exchange adapter name.
    pub source: String,
}

impl Event {
    pub fn new(payload: EventPayload, timestamp_ms: i64, source: impl Into<String>) -> Self {
        Self {
            payload,
            timestamp_ms,
            source: source.into(),
        }
    }

    pub fn market_data(data: MarketData, source: impl Into<String>) -> Self {
        let ts = data.timestamp_ms;
        Self::new(EventPayload::MarketData(data), ts, source)
    }

    pub fn order_update(update: OrderUpdate, source: impl Into<String>) -> Self {
        let ts = update.timestamp_ms;
        Self::new(EventPayload::OrderUpdate(update), ts, source)
    }

    pub fn trade_update(update: TradeUpdate, source: impl Into<String>) -> Self {
        let ts = update.timestamp_ms;
        Self::new(EventPayload::TradeUpdate(update), ts, source)
    }

    pub fn strategy_signal(signal: StrategySignal, timestamp_ms: i64) -> Self {
        let source = signal.strategy.clone();
        Self::new(EventPayload::StrategySignal(signal), timestamp_ms, source)
    }

    pub fn system(notice: impl Into<String>, timestamp_ms: i64, source: impl Into<String>) -> Self {
        Self::new(EventPayload::SystemEvent(notice.into()), timestamp_ms, source)
    }

    /// The kind used for handler dispatch.
    pub fn kind(&self) -> EventKind {
        match &self.payload {
            EventPayload::MarketData(_) => EventKind::MarketData,
            EventPayload::OrderUpdate(_) => EventKind::OrderUpdate,
            EventPayload::TradeUpdate(_) => EventKind::TradeUpdate,
            EventPayload::StrategySignal(_) => EventKind::StrategySignal,
            EventPayload::SystemEvent(_) => EventKind::SystemEvent,
        }
    }
}
