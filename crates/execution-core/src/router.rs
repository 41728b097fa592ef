//! The order router: exchange registry, risk gate, live-order book.

use std::collections::{HashMap, HashSet};

use exchange_core::SharedAdapter;
use metrics::{Counter, SharedMetrics};
use model::{Order, OrderId, OrderStatus, OrderUpdate};
use parking_lot::Mutex;
use risk::SharedRiskManager;
use tracing::{debug, info, warn};

use crate::error::RouterError;

struct LiveOrder {
    order: Order,
    exchange: String,
}

#[derive(Default)]
struct RouterState {
    exchanges: HashMap<String, SharedAdapter>,
    live_orders: HashMap<OrderId, LiveOrder>,
    active_by_exchange: HashMap<String, HashSet<OrderId>>,
}

/// Routes order intents to named exchange adapters, after the risk gate.
///
/// The router's book tracks orders it believes to be open. It is advisory:
/// the venue remains ground truth for order status, and entries leave the
/// book only when a terminal status update confirms it. In particular a
/// cancel request does not remove the order; the `Cancelled` update does.
pub struct OrderRouter {
    risk: SharedRiskManager,
    metrics: SharedMetrics,
    state: Mutex<RouterState>,
}

impl OrderRouter {
    pub fn new(risk: SharedRiskManager, metrics: SharedMetrics) -> Self {
        info!("order router initialized");
        Self {
            risk,
            metrics,
            state: Mutex::new(RouterState::default()),
        }
    }

    /// Register an adapter under a name. Fails when the name is taken.
    pub fn register_exchange(
        &self,
        name: impl Into<String>,
        adapter: SharedAdapter,
    ) -> Result<(), RouterError> {
        let name = name.into();
        let mut state = self.state.lock();
        if state.exchanges.contains_key(&name) {
            return Err(RouterError::AlreadyRegistered(name));
        }
        state.exchanges.insert(name.clone(), adapter);
        info!(exchange = %name, "exchange registered");
        Ok(())
    }

    /// Remove an adapter. Refused while live orders remain on it; the
    /// caller must cancel them first.
    pub fn unregister_exchange(&self, name: &str) -> Result<(), RouterError> {
        let mut state = self.state.lock();
        if !state.exchanges.contains_key(name) {
            return Err(RouterError::NotFound(name.to_string()));
        }
        let live = state
            .active_by_exchange
            .get(name)
            .map(HashSet::len)
            .unwrap_or(0);
        if live > 0 {
            return Err(RouterError::ActiveOrders {
                exchange: name.to_string(),
                count: live,
            });
        }
        state.exchanges.remove(name);
        state.active_by_exchange.remove(name);
        info!(exchange = %name, "exchange unregistered");
        Ok(())
    }

    fn adapter(&self, name: &str) -> Result<SharedAdapter, RouterError> {
        self.state
            .lock()
            .exchanges
            .get(name)
            .cloned()
            .ok_or_else(|| RouterError::UnknownExchange(name.to_string()))
    }

    /// Look up a registered adapter without treating a miss as an error.
    pub fn exchange(&self, name: &str) -> Option<SharedAdapter> {
        self.state.lock().exchanges.get(name).cloned()
    }

    pub fn exchange_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().exchanges.keys().cloned().collect();
        names.sort();
        names
    }

    /// Validate, risk-check, and place an order on the named exchange.
    /// On success the venue-assigned id is recorded in the live book.
    pub async fn submit_order(
        &self,
        order: Order,
        exchange_name: &str,
    ) -> Result<OrderId, RouterError> {
        order.validate().map_err(RouterError::InvalidOrder)?;

        let adapter = self.adapter(exchange_name)?;

        if let Err(rejection) = self.risk.check_order_risk(&order) {
            self.metrics.record(Counter::OrdersRejected);
            return Err(RouterError::RiskRejected(rejection));
        }

        // Adapter I/O happens outside the router lock.
        let order_id = adapter.submit_order(&order).await.map_err(|error| {
            warn!(
                exchange = %exchange_name,
                symbol = %order.symbol,
                client_order_id = %order.client_order_id,
                error = %error,
                "order submission failed"
            );
            RouterError::AdapterFailure(error)
        })?;

        {
            let mut state = self.state.lock();
            state.live_orders.insert(
                order_id.clone(),
                LiveOrder {
                    order: order.clone(),
                    exchange: exchange_name.to_string(),
                },
            );
            state
                .active_by_exchange
                .entry(exchange_name.to_string())
                .or_default()
                .insert(order_id.clone());
        }

        self.metrics.record(Counter::OrdersSubmitted);
        info!(
            exchange = %exchange_name,
            order_id = %order_id,
            symbol = %order.symbol,
            side = %order.side,
            volume = order.volume,
            price = order.price,
            "order submitted"
        );
        Ok(order_id)
    }

    /// Ask the venue to cancel an order. The book entry stays until the
    /// confirming `Cancelled` update arrives through `on_order_update`.
    pub async fn cancel_order(
        &self,
        order_id: &OrderId,
        exchange_name: &str,
    ) -> Result<(), RouterError> {
        let adapter = self.adapter(exchange_name)?;
        adapter.cancel_order(order_id).await?;
        self.metrics.record(Counter::OrdersCancelled);
        info!(exchange = %exchange_name, order_id = %order_id, "cancel requested");
        Ok(())
    }

    /// Query the venue for an order's status. The adapter is ground truth.
    pub async fn get_order_status(
        &self,
        order_id: &OrderId,
        exchange_name: &str,
    ) -> Result<OrderStatus, RouterError> {
        let adapter = self.adapter(exchange_name)?;
        Ok(adapter.get_order_status(order_id).await?)
    }

    /// Snapshot of the live book, optionally restricted to one exchange.
    pub fn get_active_orders(&self, exchange_name: Option<&str>) -> Vec<Order> {
        let state = self.state.lock();
        match exchange_name {
            Some(name) => state
                .active_by_exchange
                .get(name)
                .into_iter()
                .flatten()
                .filter_map(|id| state.live_orders.get(id))
                .map(|live| live.order.clone())
                .collect(),
            None => state
                .live_orders
                .values()
                .map(|live| live.order.clone())
                .collect(),
        }
    }

    /// Whether an order id is currently in the live book.
    pub fn has_live_order(&self, order_id: &str) -> bool {
        self.state.lock().live_orders.contains_key(order_id)
    }

    /// Apply a status update from the venue: terminal statuses drop the
    /// order from the book, everything else leaves it live.
    pub fn on_order_update(&self, update: &OrderUpdate) {
        if !update.status.is_terminal() {
            return;
        }
        let mut state = self.state.lock();
        if let Some(live) = state.live_orders.remove(&update.order_id) {
            if let Some(active) = state.active_by_exchange.get_mut(&live.exchange) {
                active.remove(&update.order_id);
            }
            debug!(
                order_id = %update.order_id,
                status = ?update.status,
                exchange = %live.exchange,
                "order left the live book"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use exchange_core::{AdapterError, EventSink, ExchangeAdapter};
    use model::{Balance, ExchangeInfo, OrderSide, Position, RiskLimits};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;

    /// Minimal scripted venue for router tests.
    struct StubAdapter {
        name: String,
        fail_submit: AtomicBool,
        next_id: AtomicU64,
        cancelled: Mutex<Vec<String>>,
    }

    impl StubAdapter {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail_submit: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                cancelled: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ExchangeAdapter for StubAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn supported_symbols(&self) -> Vec<String> {
            Vec::new()
        }

        fn exchange_info(&self) -> ExchangeInfo {
            ExchangeInfo::named(&self.name)
        }

        fn attach_event_sink(&self, _sink: EventSink) {}

        async fn submit_order(&self, _order: &Order) -> Result<OrderId, AdapterError> {
            if self.fail_submit.load(Ordering::Relaxed) {
                return Err(AdapterError::Transport("connection reset".into()));
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            Ok(format!("{}-{id}", self.name))
        }

        async fn cancel_order(&self, order_id: &OrderId) -> Result<(), AdapterError> {
            self.cancelled.lock().push(order_id.clone());
            Ok(())
        }

        async fn get_order_status(&self, _order_id: &OrderId) -> Result<OrderStatus, AdapterError> {
            Ok(OrderStatus::Pending)
        }

        async fn get_balance(&self) -> Result<Balance, AdapterError> {
            Ok(Balance::new())
        }

        async fn get_positions(&self) -> Result<Vec<Position>, AdapterError> {
            Ok(Vec::new())
        }

        async fn subscribe_market_data(&self, _symbol: &str) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn unsubscribe_market_data(&self, _symbol: &str) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    fn router() -> OrderRouter {
        let risk = risk::create_risk_manager(RiskLimits::default());
        risk.update_balance(1_000_000.0);
        OrderRouter::new(risk, metrics::create_metrics())
    }

    fn buy(volume: f64, price: f64) -> Order {
        Order::limit("BTCUSDT", OrderSide::Buy, price, volume, "c1")
    }

    fn update(order_id: &str, status: OrderStatus, filled: f64) -> OrderUpdate {
        OrderUpdate {
            order_id: order_id.to_string(),
            status,
            filled_price: 50_000.0,
            filled_volume: filled,
            timestamp_ms: 1,
            message: String::new(),
        }
    }

    #[tokio::test]
    async fn test_registry_round_trip() {
        let router = router();
        let adapter = StubAdapter::new("stub");

        router.register_exchange("stub", adapter.clone()).unwrap();
        assert!(matches!(
            router.register_exchange("stub", adapter.clone()),
            Err(RouterError::AlreadyRegistered(_))
        ));

        router.unregister_exchange("stub").unwrap();
        assert!(matches!(
            router.unregister_exchange("stub"),
            Err(RouterError::NotFound(_))
        ));

        // Re-registering after unregister restores the same observable state.
        router.register_exchange("stub", adapter).unwrap();
        assert_eq!(router.exchange_names(), vec!["stub"]);
        assert!(router.get_active_orders(Some("stub")).is_empty());
    }

    #[tokio::test]
    async fn test_submit_records_live_order() {
        let router = router();
        router
            .register_exchange("stub", StubAdapter::new("stub"))
            .unwrap();

        let order_id = router.submit_order(buy(1.0, 50_000.0), "stub").await.unwrap();
        assert!(router.has_live_order(&order_id));
        assert_eq!(router.get_active_orders(None).len(), 1);
        assert_eq!(router.get_active_orders(Some("stub")).len(), 1);
        assert!(router.get_active_orders(Some("other")).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_exchange() {
        let router = router();
        assert!(matches!(
            router.submit_order(buy(1.0, 50_000.0), "nowhere").await,
            Err(RouterError::UnknownExchange(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_order_never_reaches_adapter() {
        let router = router();
        router
            .register_exchange("stub", StubAdapter::new("stub"))
            .unwrap();

        assert!(matches!(
            router.submit_order(buy(0.0, 50_000.0), "stub").await,
            Err(RouterError::InvalidOrder(_))
        ));
        assert!(router.get_active_orders(None).is_empty());
    }

    #[tokio::test]
    async fn test_risk_rejection_not_recorded() {
        let risk = risk::create_risk_manager(RiskLimits {
            max_order_size: 5_000.0,
            ..RiskLimits::default()
        });
        risk.update_balance(1_000_000.0);
        let router = OrderRouter::new(risk, metrics::create_metrics());
        router
            .register_exchange("stub", StubAdapter::new("stub"))
            .unwrap();

        assert!(matches!(
            router.submit_order(buy(1.0, 50_000.0), "stub").await,
            Err(RouterError::RiskRejected(_))
        ));
        assert!(router.get_active_orders(None).is_empty());
    }

    #[tokio::test]
    async fn test_adapter_failure_not_recorded() {
        let router = router();
        let adapter = StubAdapter::new("stub");
        adapter.fail_submit.store(true, Ordering::Relaxed);
        router.register_exchange("stub", adapter).unwrap();

        assert!(matches!(
            router.submit_order(buy(1.0, 50_000.0), "stub").await,
            Err(RouterError::AdapterFailure(_))
        ));
        assert!(router.get_active_orders(None).is_empty());
    }

    #[tokio::test]
    async fn test_order_lifecycle_removes_on_terminal() {
        let router = router();
        router
            .register_exchange("stub", StubAdapter::new("stub"))
            .unwrap();

        let order_id = router.submit_order(buy(1.0, 50_000.0), "stub").await.unwrap();

        // Partial fills keep the order live.
        router.on_order_update(&update(&order_id, OrderStatus::Partial, 0.3));
        assert!(router.has_live_order(&order_id));
        router.on_order_update(&update(&order_id, OrderStatus::Partial, 0.7));
        assert!(router.has_live_order(&order_id));

        router.on_order_update(&update(&order_id, OrderStatus::Filled, 1.0));
        assert!(!router.has_live_order(&order_id));
        assert!(router.get_active_orders(Some("stub")).is_empty());

        // Updates for unknown orders are ignored.
        router.on_order_update(&update("ghost", OrderStatus::Filled, 1.0));
    }

    #[tokio::test]
    async fn test_cancel_removes_only_after_confirmation() {
        let router = router();
        let adapter = StubAdapter::new("stub");
        router.register_exchange("stub", adapter.clone()).unwrap();

        let order_id = router.submit_order(buy(1.0, 50_000.0), "stub").await.unwrap();
        router.cancel_order(&order_id, "stub").await.unwrap();

        // The cancel request reached the venue but the book still holds the
        // order until the venue confirms.
        assert_eq!(*adapter.cancelled.lock(), vec![order_id.clone()]);
        assert!(router.has_live_order(&order_id));

        router.on_order_update(&update(&order_id, OrderStatus::Cancelled, 0.0));
        assert!(!router.has_live_order(&order_id));
    }

    #[tokio::test]
    async fn test_unregister_blocked_by_live_orders() {
        let router = router();
        router
            .register_exchange("stub", StubAdapter::new("stub"))
            .unwrap();

        let order_id = router.submit_order(buy(1.0, 50_000.0), "stub").await.unwrap();
        assert!(matches!(
            router.unregister_exchange("stub"),
            Err(RouterError::ActiveOrders { count: 1, .. })
        ));

        router.on_order_update(&update(&order_id, OrderStatus::Cancelled, 0.0));
        router.unregister_exchange("stub").unwrap();
    }
}
