//! The adapter capability set.

use std::sync::Arc;

use async_trait::async_trait;
use model::{Balance, ExchangeInfo, Order, OrderId, OrderStatus, Position};

use crate::error::AdapterError;
use crate::sink::EventSink;

/// Everything the order router and execution core need from a venue.
///
/// Trading calls may block on network I/O; they are async and the caller
/// decides where to await them. Implementations must be safe to call
/// concurrently from the router and their own I/O tasks.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// The registry name of this venue.
    fn name(&self) -> &str;

    /// Symbols this venue can trade. Empty means unrestricted.
    fn supported_symbols(&self) -> Vec<String>;

    /// Static venue metadata: fees, minimums, precisions.
    fn exchange_info(&self) -> ExchangeInfo;

    /// Receive the runtime's event sink. Called once at registration;
    /// market data and order/trade reports flow through it from then on.
    fn attach_event_sink(&self, sink: EventSink);

    /// Place an order. Returns the venue-assigned order id.
    async fn submit_order(&self, order: &Order) -> Result<OrderId, AdapterError>;

    /// Request cancellation of a live order.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), AdapterError>;

    /// Query the venue for an order's current status. The venue is ground
    /// truth; the router's book is advisory.
    async fn get_order_status(&self, order_id: &OrderId) -> Result<OrderStatus, AdapterError>;

    async fn get_balance(&self) -> Result<Balance, AdapterError>;

    async fn get_positions(&self) -> Result<Vec<Position>, AdapterError>;

    /// Start streaming market data for a symbol through the event sink.
    async fn subscribe_market_data(&self, symbol: &str) -> Result<(), AdapterError>;

    async fn unsubscribe_market_data(&self, symbol: &str) -> Result<(), AdapterError>;
}

/// Shared adapter handle as held by the router.
pub type SharedAdapter = Arc<dyn ExchangeAdapter>;
