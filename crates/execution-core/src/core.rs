//! The execution core facade.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::RuntimeConfig;
use event_core::{EventError, EventHandler, EventProcessor, EventPublisher, HandlerId, ProcessorConfig};
use exchange_core::{EventSink, SharedAdapter};
use futures::future::BoxFuture;
use metrics::{create_metrics, Counter, SharedMetrics};
use model::{
    Event, EventKind, EventPayload, FillLedger, MarketData, Order, OrderId, OrderStatus,
    RiskLimits, SYSTEM_EVENT_EOD,
};
use parking_lot::{Mutex, RwLock};
use risk::{create_risk_manager, SharedRiskManager};
use tracing::{debug, info};

use crate::error::RouterError;
use crate::market_state::{create_market_state, SharedMarketState};
use crate::router::OrderRouter;

/// Callback invoked for market data on a subscribed `(symbol, exchange)`
/// key. Returns a future so subscribers can await downstream work; it runs
/// on the processor's consumer task.
pub type MarketDataCallback =
    Arc<dyn Fn(MarketData) -> BoxFuture<'static, ()> + Send + Sync>;

type SubscriptionTable = RwLock<HashMap<String, HashMap<String, MarketDataCallback>>>;

/// Execution core construction parameters.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub processor: ProcessorConfig,
    pub risk_limits: RiskLimits,
}

impl CoreConfig {
    /// Derive core settings from the loaded runtime configuration.
    pub fn from_runtime(config: &RuntimeConfig) -> Self {
        Self {
            processor: ProcessorConfig {
                buffer_size: config.engine.event_buffer_size,
                publish_policy: config.engine.publish_policy,
                publish_retries: config.engine.publish_retries,
            },
            risk_limits: config.risk.clone(),
        }
    }
}

/// Composes the event processor, the risk manager, and the order router
/// into the single surface strategies and adapters talk to.
///
/// Construction wires the core's own handlers onto the processor: market
/// data feeds the quote cache and the subscription callbacks, trade updates
/// feed risk positions (deduplicated), order updates maintain the router's
/// live book, and the `"EOD"` system event resets daily risk metrics.
pub struct ExecutionCore {
    processor: EventProcessor,
    risk: SharedRiskManager,
    router: Arc<OrderRouter>,
    market_state: SharedMarketState,
    subscriptions: Arc<SubscriptionTable>,
    metrics: SharedMetrics,
}

impl ExecutionCore {
    pub fn new(config: CoreConfig) -> Arc<Self> {
        let metrics = create_metrics();
        let processor = EventProcessor::new(config.processor, Arc::clone(&metrics));
        let risk = create_risk_manager(config.risk_limits);
        let router = Arc::new(OrderRouter::new(Arc::clone(&risk), Arc::clone(&metrics)));
        let market_state = create_market_state();
        let subscriptions: Arc<SubscriptionTable> = Arc::new(RwLock::new(HashMap::new()));
        let fills = Arc::new(Mutex::new(FillLedger::new()));

        processor.subscribe(
            EventKind::MarketData,
            Arc::new(MarketDataFan {
                subscriptions: Arc::clone(&subscriptions),
                market_state: Arc::clone(&market_state),
            }),
        );
        processor.subscribe(
            EventKind::TradeUpdate,
            Arc::new(TradeLedger {
                risk: Arc::clone(&risk),
                fills: Arc::clone(&fills),
                metrics: Arc::clone(&metrics),
            }),
        );
        processor.subscribe(
            EventKind::OrderUpdate,
            Arc::new(BookKeeper {
                router: Arc::clone(&router),
                fills,
            }),
        );
        processor.subscribe(
            EventKind::SystemEvent,
            Arc::new(SystemEvents {
                risk: Arc::clone(&risk),
            }),
        );

        info!("execution core initialized");
        Arc::new(Self {
            processor,
            risk,
            router,
            market_state,
            subscriptions,
            metrics,
        })
    }

    /// Start the event processor. Idempotent.
    pub fn start(&self) {
        self.processor.start();
        info!("execution core started");
    }

    /// Stop the event processor, letting the in-flight handler finish.
    /// Idempotent.
    pub async fn stop(&self) {
        self.processor.stop().await;
        info!("execution core stopped");
    }

    pub fn is_running(&self) -> bool {
        self.processor.is_running()
    }

    // --- Exchange registry ---

    /// Register an adapter and hand it the event sink it publishes through.
    pub fn register_exchange(
        &self,
        name: impl Into<String>,
        adapter: SharedAdapter,
    ) -> Result<(), RouterError> {
        let name = name.into();
        self.router.register_exchange(name, Arc::clone(&adapter))?;
        adapter.attach_event_sink(EventSink::new(self.processor.publisher()));
        Ok(())
    }

    pub fn unregister_exchange(&self, name: &str) -> Result<(), RouterError> {
        self.router.unregister_exchange(name)
    }

    pub fn exchange(&self, name: &str) -> Option<SharedAdapter> {
        self.router.exchange(name)
    }

    // --- Order passthrough ---

    pub async fn submit_order(
        &self,
        order: Order,
        exchange_name: &str,
    ) -> Result<OrderId, RouterError> {
        self.router.submit_order(order, exchange_name).await
    }

    pub async fn cancel_order(
        &self,
        order_id: &OrderId,
        exchange_name: &str,
    ) -> Result<(), RouterError> {
        self.router.cancel_order(order_id, exchange_name).await
    }

    pub async fn get_order_status(
        &self,
        order_id: &OrderId,
        exchange_name: &str,
    ) -> Result<OrderStatus, RouterError> {
        self.router.get_order_status(order_id, exchange_name).await
    }

    pub fn get_active_orders(&self, exchange_name: Option<&str>) -> Vec<Order> {
        self.router.get_active_orders(exchange_name)
    }

    // --- Market data subscriptions ---

    /// Install the callback for a `(symbol, exchange)` key, replacing any
    /// prior one, and ask the adapter to start streaming the symbol.
    ///
    /// The callback is installed even when the exchange is not registered
    /// yet; data starts flowing once the venue comes up and publishes.
    pub async fn subscribe_market_data(
        &self,
        symbol: &str,
        exchange_name: &str,
        callback: MarketDataCallback,
    ) {
        self.subscriptions
            .write()
            .entry(symbol.to_string())
            .or_default()
            .insert(exchange_name.to_string(), callback);

        if let Some(adapter) = self.router.exchange(exchange_name) {
            if let Err(error) = adapter.subscribe_market_data(symbol).await {
                debug!(
                    symbol,
                    exchange = exchange_name,
                    error = %error,
                    "adapter subscription failed, callback stays installed"
                );
            }
        }
        debug!(symbol, exchange = exchange_name, "market data subscribed");
    }

    /// Drop the callback for a `(symbol, exchange)` key and stop the
    /// adapter's stream.
    pub async fn unsubscribe_market_data(&self, symbol: &str, exchange_name: &str) {
        {
            let mut table = self.subscriptions.write();
            if let Some(by_exchange) = table.get_mut(symbol) {
                by_exchange.remove(exchange_name);
                if by_exchange.is_empty() {
                    table.remove(symbol);
                }
            }
        }

        if let Some(adapter) = self.router.exchange(exchange_name) {
            let _ = adapter.unsubscribe_market_data(symbol).await;
        }
        debug!(symbol, exchange = exchange_name, "market data unsubscribed");
    }

    // --- Risk controls ---

    pub fn enable_risk_manager(&self) {
        self.risk.enable();
    }

    pub fn disable_risk_manager(&self) {
        self.risk.disable();
    }

    pub fn set_risk_limits(&self, limits: RiskLimits) {
        self.risk.set_limits(limits);
    }

    pub fn risk(&self) -> &SharedRiskManager {
        &self.risk
    }

    // --- Plumbing ---

    /// Publishing handle for producers outside the adapter path.
    pub fn publisher(&self) -> EventPublisher {
        self.processor.publisher()
    }

    /// Publish an event onto the core's channel.
    pub fn publish(&self, event: Event) -> Result<(), EventError> {
        self.processor.publish(event)
    }

    /// Register an additional handler on the core's processor.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> HandlerId {
        self.processor.subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, kind: EventKind, id: HandlerId) {
        self.processor.unsubscribe(kind, id)
    }

    pub fn market_state(&self) -> &SharedMarketState {
        &self.market_state
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }
}

/// Shared execution core handle.
pub type SharedExecutionCore = Arc<ExecutionCore>;

/// Routes market data into the quote cache and the single callback
/// registered for the event's `(symbol, source)` key.
struct MarketDataFan {
    subscriptions: Arc<SubscriptionTable>,
    market_state: SharedMarketState,
}

#[async_trait]
impl EventHandler for MarketDataFan {
    async fn handle(&self, event: &Event) -> Result<(), EventError> {
        let EventPayload::MarketData(data) = &event.payload else {
            return Ok(());
        };

        self.market_state.update(data);

        let callback = self
            .subscriptions
            .read()
            .get(&data.symbol)
            .and_then(|by_exchange| by_exchange.get(&event.source))
            .cloned();

        if let Some(callback) = callback {
            callback(data.clone()).await;
        }
        Ok(())
    }
}

/// Feeds deduplicated fills into the risk manager's position snapshot.
struct TradeLedger {
    risk: SharedRiskManager,
    fills: Arc<Mutex<FillLedger>>,
    metrics: SharedMetrics,
}

#[async_trait]
impl EventHandler for TradeLedger {
    async fn handle(&self, event: &Event) -> Result<(), EventError> {
        let EventPayload::TradeUpdate(update) = &event.payload else {
            return Ok(());
        };

        if !self.fills.lock().observe(update) {
            debug!(order_id = %update.order_id, "duplicate trade update ignored");
            return Ok(());
        }

        self.risk
            .update_position(&update.symbol, update.signed_volume(), update.price);
        self.metrics.record(Counter::FillsApplied);
        Ok(())
    }
}

/// Keeps the router's live book in sync with venue status updates.
struct BookKeeper {
    router: Arc<OrderRouter>,
    fills: Arc<Mutex<FillLedger>>,
}

#[async_trait]
impl EventHandler for BookKeeper {
    async fn handle(&self, event: &Event) -> Result<(), EventError> {
        let EventPayload::OrderUpdate(update) = &event.payload else {
            return Ok(());
        };

        self.router.on_order_update(update);
        if update.status.is_terminal() {
            self.fills.lock().forget(&update.order_id);
        }
        Ok(())
    }
}

/// Reacts to system notices; `"EOD"` resets daily risk metrics.
struct SystemEvents {
    risk: SharedRiskManager,
}

#[async_trait]
impl EventHandler for SystemEvents {
    async fn handle(&self, event: &Event) -> Result<(), EventError> {
        let EventPayload::SystemEvent(notice) = &event.payload else {
            return Ok(());
        };

        if notice == SYSTEM_EVENT_EOD {
            self.risk.reset_daily_metrics();
        }
        Ok(())
    }
}
