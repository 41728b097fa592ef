//! Strategy building blocks.
//!
//! A strategy implements the [`Strategy`] capability trait: lifecycle hooks,
//! event hooks, and risk hooks. The [`StrategyHandle`] lifecycle helper wraps
//! an implementation with the state machine
//! (`INITIALIZED -> RUNNING -> STOPPED`, `ERROR` from anywhere),
//! per-strategy position bookkeeping from observed fills, and the
//! subscription list. Concrete strategies embed behavior, not a base class;
//! the handle owns everything shared.
//!
//! Hooks receive a [`StrategyContext`] carrying the execution core handle
//! and the quote cache; strategies keep no long-lived references back into
//! the runtime.

mod context;
mod error;
mod lifecycle;
mod strategy;

pub use context::StrategyContext;
pub use error::StrategyError;
pub use lifecycle::{SharedStrategyHandle, StrategyHandle};
pub use strategy::{BoxedStrategy, Strategy};

// Re-export the types strategy implementations touch constantly.
pub use model::{
    MarketData, MarketSubscription, Order, OrderId, OrderSide, OrderStatus, OrderType,
    OrderUpdate, Position, StrategyKind, StrategyStatus, TradeUpdate,
};
