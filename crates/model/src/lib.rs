//! Shared domain types for the trading runtime.
//!
//! Everything that crosses a crate boundary lives here: market data, order
//! intents and lifecycle updates, positions, balances, risk limits, and the
//! event envelope carried by the event processor.
//!
//! Prices and volumes are `f64`; comparisons against zero use
//! [`VOLUME_EPSILON`] to absorb representation error.

mod balance;
mod event;
mod exchange;
mod fills;
mod limits;
mod market;
mod order;
mod position;
mod strategy;

pub use balance::Balance;
pub use event::{Event, EventKind, EventPayload, StrategySignal, SYSTEM_EVENT_EOD};
pub use exchange::ExchangeInfo;
pub use fills::FillLedger;
pub use limits::RiskLimits;
pub use market::{MarketData, PriceLevel};
pub use order::{Order, OrderId, OrderSide, OrderStatus, OrderType, OrderUpdate, TradeUpdate};
pub use position::Position;
pub use strategy::{MarketSubscription, StrategyKind, StrategyStatus};

/// Absolute tolerance for "is this volume zero" checks on `f64` quantities.
pub const VOLUME_EPSILON: f64 = 1e-9;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
