//! The strategy manager.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use event_core::{EventError, EventHandler};
use execution_core::{ExecutionCore, MarketDataCallback};
use model::{
    Event, EventKind, EventPayload, MarketData, MarketSubscription, OrderUpdate, StrategyStatus,
    TradeUpdate,
};
use parking_lot::RwLock;
use strategy_core::{BoxedStrategy, SharedStrategyHandle, StrategyContext, StrategyHandle};
use tracing::{error, info, warn};

use crate::error::ManagerError;

struct ManagerInner {
    core: Arc<ExecutionCore>,
    strategies: RwLock<HashMap<String, SharedStrategyHandle>>,
    routes: RwLock<HashMap<MarketSubscription, HashSet<String>>>,
}

impl ManagerInner {
    fn ctx(&self) -> StrategyContext {
        StrategyContext::new(Arc::clone(&self.core))
    }

    /// Deliver a tick to every running strategy routed on this key.
    /// Locks are dropped before any hook runs.
    async fn route_market_data(&self, key: &MarketSubscription, data: &MarketData) {
        let names = self.routes.read().get(key).cloned().unwrap_or_default();
        if names.is_empty() {
            return;
        }
        let handles: Vec<SharedStrategyHandle> = {
            let strategies = self.strategies.read();
            names
                .iter()
                .filter_map(|name| strategies.get(name).cloned())
                .collect()
        };

        let ctx = self.ctx();
        for handle in handles {
            handle.handle_market_data(data, &ctx).await;
        }
    }

    async fn broadcast_order_update(&self, update: &OrderUpdate) {
        let handles: Vec<SharedStrategyHandle> =
            self.strategies.read().values().cloned().collect();
        let ctx = self.ctx();
        for handle in handles {
            handle.handle_order_update(update, &ctx).await;
        }
    }

    async fn broadcast_trade_update(&self, update: &TradeUpdate) {
        let handles: Vec<SharedStrategyHandle> =
            self.strategies.read().values().cloned().collect();
        let ctx = self.ctx();
        for handle in handles {
            handle.handle_trade_update(update, &ctx).await;
        }
    }

    /// Drop a strategy from its routes, unsubscribing keys nobody uses
    /// anymore.
    async fn remove_routes(&self, name: &str, subscriptions: &[MarketSubscription]) {
        for sub in subscriptions {
            let emptied = {
                let mut routes = self.routes.write();
                match routes.get_mut(sub) {
                    Some(names) => {
                        names.remove(name);
                        let emptied = names.is_empty();
                        if emptied {
                            routes.remove(sub);
                        }
                        emptied
                    }
                    None => false,
                }
            };
            if emptied {
                self.core
                    .unsubscribe_market_data(&sub.symbol, &sub.exchange)
                    .await;
            }
        }
    }
}

/// Fans order and trade events out to registered strategies. Holds the
/// manager weakly so the processor never keeps a dropped manager alive.
struct BroadcastHandler {
    inner: Weak<ManagerInner>,
}

#[async_trait]
impl EventHandler for BroadcastHandler {
    async fn handle(&self, event: &Event) -> Result<(), EventError> {
        let Some(inner) = self.inner.upgrade() else {
            return Ok(());
        };
        match &event.payload {
            EventPayload::OrderUpdate(update) => inner.broadcast_order_update(update).await,
            EventPayload::TradeUpdate(update) => inner.broadcast_trade_update(update).await,
            _ => {}
        }
        Ok(())
    }
}

fn route_callback(inner: Weak<ManagerInner>, key: MarketSubscription) -> MarketDataCallback {
    Arc::new(move |data: MarketData| {
        let inner = inner.clone();
        let key = key.clone();
        Box::pin(async move {
            if let Some(inner) = inner.upgrade() {
                inner.route_market_data(&key, &data).await;
            }
        })
    })
}

/// Registers strategies, drives their lifecycle, and routes events to
/// them.
///
/// Market data reaches a strategy only for its subscribed
/// `(symbol, exchange)` pairs, via callbacks installed on the execution
/// core when the strategy starts. Order and trade updates are broadcast to
/// every running strategy. A strategy left in `ERROR` stays registered and
/// visible until explicitly removed, but receives nothing further.
pub struct StrategyManager {
    inner: Arc<ManagerInner>,
}

impl StrategyManager {
    pub fn new(core: Arc<ExecutionCore>) -> Self {
        let inner = Arc::new(ManagerInner {
            core,
            strategies: RwLock::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
        });

        let handler = Arc::new(BroadcastHandler {
            inner: Arc::downgrade(&inner),
        });
        inner
            .core
            .subscribe(EventKind::OrderUpdate, handler.clone());
        inner.core.subscribe(EventKind::TradeUpdate, handler);

        info!("strategy manager initialized");
        Self { inner }
    }

    /// Add a strategy to the registry under its own name.
    pub fn register(&self, strategy: BoxedStrategy) -> Result<(), ManagerError> {
        let handle = Arc::new(StrategyHandle::new(strategy));
        let name = handle.name().to_string();

        let mut strategies = self.inner.strategies.write();
        if strategies.contains_key(&name) {
            return Err(ManagerError::AlreadyRegistered(name));
        }
        strategies.insert(name.clone(), handle);
        info!(strategy = %name, "strategy registered");
        Ok(())
    }

    /// Remove a strategy, stopping it first when it is running.
    pub async fn unregister(&self, name: &str) -> Result<(), ManagerError> {
        let handle = self.handle(name)?;

        if handle.status() == StrategyStatus::Running {
            self.stop(name).await?;
        }

        self.inner
            .remove_routes(name, handle.subscriptions())
            .await;
        self.inner.strategies.write().remove(name);
        info!(strategy = %name, "strategy unregistered");
        Ok(())
    }

    /// Initialize and start a strategy: install its market data routes,
    /// then run its lifecycle hooks. Routes are rolled back when the start
    /// fails.
    pub async fn start(&self, name: &str) -> Result<(), ManagerError> {
        let handle = self.handle(name)?;
        if handle.status() == StrategyStatus::Running {
            return Ok(());
        }
        let ctx = self.inner.ctx();

        handle.initialize(&ctx).await?;

        // Install routes before on_start so data begins flowing the moment
        // the strategy enters RUNNING.
        for sub in handle.subscriptions() {
            self.inner
                .routes
                .write()
                .entry(sub.clone())
                .or_default()
                .insert(name.to_string());
            self.inner
                .core
                .subscribe_market_data(
                    &sub.symbol,
                    &sub.exchange,
                    route_callback(Arc::downgrade(&self.inner), sub.clone()),
                )
                .await;
        }

        if let Err(cause) = handle.start(&ctx).await {
            self.inner
                .remove_routes(name, handle.subscriptions())
                .await;
            return Err(cause.into());
        }

        info!(strategy = %name, "strategy running");
        Ok(())
    }

    /// Stop a strategy, remove its routes, and run its cleanup hook.
    pub async fn stop(&self, name: &str) -> Result<(), ManagerError> {
        let handle = self.handle(name)?;
        let ctx = self.inner.ctx();

        handle.stop(&ctx).await?;
        self.inner
            .remove_routes(name, handle.subscriptions())
            .await;

        if let Err(cause) = handle.cleanup(&ctx).await {
            warn!(strategy = %name, error = %cause, "cleanup after stop failed");
        }
        Ok(())
    }

    /// Start every registered strategy, logging failures and continuing.
    pub async fn start_all(&self) {
        for name in self.names() {
            if let Err(cause) = self.start(&name).await {
                error!(strategy = %name, error = %cause, "failed to start strategy");
            }
        }
    }

    /// Stop every running strategy, logging failures and continuing.
    pub async fn stop_all(&self) {
        for name in self.names() {
            let running = self
                .inner
                .strategies
                .read()
                .get(&name)
                .map(|h| h.status() == StrategyStatus::Running)
                .unwrap_or(false);
            if !running {
                continue;
            }
            if let Err(cause) = self.stop(&name).await {
                error!(strategy = %name, error = %cause, "failed to stop strategy");
            }
        }
    }

    pub fn status(&self, name: &str) -> Result<StrategyStatus, ManagerError> {
        Ok(self.handle(name)?.status())
    }

    /// Registered strategy names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.strategies.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Direct handle access, for introspection.
    pub fn strategy(&self, name: &str) -> Option<SharedStrategyHandle> {
        self.inner.strategies.read().get(name).cloned()
    }

    fn handle(&self, name: &str) -> Result<SharedStrategyHandle, ManagerError> {
        self.inner
            .strategies
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ManagerError::NotFound(name.to_string()))
    }
}
