//! The strategy lifecycle helper.

use std::collections::HashMap;
use std::sync::Arc;

use model::{
    FillLedger, MarketData, MarketSubscription, OrderUpdate, Position, StrategyKind,
    StrategyStatus, TradeUpdate,
};
use parking_lot::{Mutex as PlMutex, RwLock as PlRwLock};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::context::StrategyContext;
use crate::error::StrategyError;
use crate::strategy::BoxedStrategy;

/// Wraps a [`Strategy`](crate::Strategy) implementation with everything the
/// runtime manages on its behalf: the lifecycle state machine, the
/// subscription list, and position bookkeeping from observed fills.
///
/// Transitions: `initialize` is legal only while `INITIALIZED`; `start`
/// moves `INITIALIZED -> RUNNING`; `stop` moves `RUNNING -> STOPPED`, is
/// idempotent from `STOPPED`, and settles a never-started strategy straight
/// to `STOPPED`; `cleanup` is legal from any non-running state. A hook
/// failure during a transition lands the strategy in `ERROR` and surfaces
/// the cause; once in `ERROR` the strategy receives no further events until
/// removed.
///
/// The transition lock is the hooks mutex, so lifecycle calls, event
/// deliveries, and risk hook calls are mutually exclusive per strategy.
pub struct StrategyHandle {
    name: String,
    kind: StrategyKind,
    subscriptions: Vec<MarketSubscription>,
    status: PlRwLock<StrategyStatus>,
    positions: PlMutex<HashMap<String, Position>>,
    fills: PlMutex<FillLedger>,
    hooks: Mutex<BoxedStrategy>,
}

impl StrategyHandle {
    pub fn new(strategy: BoxedStrategy) -> Self {
        Self {
            name: strategy.name().to_string(),
            kind: strategy.kind(),
            subscriptions: strategy.subscriptions(),
            status: PlRwLock::new(StrategyStatus::Initialized),
            positions: PlMutex::new(HashMap::new()),
            fills: PlMutex::new(FillLedger::new()),
            hooks: Mutex::new(strategy),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn status(&self) -> StrategyStatus {
        *self.status.read()
    }

    pub fn subscriptions(&self) -> &[MarketSubscription] {
        &self.subscriptions
    }

    /// This strategy's view of its position in a symbol, built from the
    /// fills it has observed.
    pub fn position(&self, symbol: &str) -> Option<Position> {
        self.positions.lock().get(symbol).cloned()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.positions.lock().values().cloned().collect()
    }

    /// Run the `on_initialize` hook. Legal only while `INITIALIZED`.
    pub async fn initialize(&self, ctx: &StrategyContext) -> Result<(), StrategyError> {
        let mut hooks = self.hooks.lock().await;
        let from = self.status();
        if from != StrategyStatus::Initialized {
            return Err(StrategyError::InvalidTransition {
                from,
                to: StrategyStatus::Initialized,
            });
        }

        match hooks.on_initialize(ctx).await {
            Ok(()) => {
                info!(strategy = %self.name, "strategy initialized");
                Ok(())
            }
            Err(cause) => {
                *self.status.write() = StrategyStatus::Error;
                error!(strategy = %self.name, error = %cause, "initialization failed");
                Err(StrategyError::Initialization(cause.to_string()))
            }
        }
    }

    /// Enter `RUNNING`. Legal from `INITIALIZED`; a no-op when already
    /// running. The caller installs market data subscriptions before
    /// invoking this.
    pub async fn start(&self, ctx: &StrategyContext) -> Result<(), StrategyError> {
        let mut hooks = self.hooks.lock().await;
        let from = self.status();
        if from == StrategyStatus::Running {
            return Ok(());
        }
        if from != StrategyStatus::Initialized {
            return Err(StrategyError::InvalidTransition {
                from,
                to: StrategyStatus::Running,
            });
        }

        match hooks.on_start(ctx).await {
            Ok(()) => {
                *self.status.write() = StrategyStatus::Running;
                info!(strategy = %self.name, "strategy started");
                Ok(())
            }
            Err(cause) => {
                *self.status.write() = StrategyStatus::Error;
                error!(strategy = %self.name, error = %cause, "start failed");
                Err(cause)
            }
        }
    }

    /// Leave `RUNNING`. Idempotent from `STOPPED`; a never-started strategy
    /// settles to `STOPPED` without its `on_stop` hook; `ERROR` stays put.
    pub async fn stop(&self, ctx: &StrategyContext) -> Result<(), StrategyError> {
        let mut hooks = self.hooks.lock().await;
        match self.status() {
            StrategyStatus::Running => match hooks.on_stop(ctx).await {
                Ok(()) => {
                    *self.status.write() = StrategyStatus::Stopped;
                    info!(strategy = %self.name, "strategy stopped");
                    Ok(())
                }
                Err(cause) => {
                    *self.status.write() = StrategyStatus::Error;
                    error!(strategy = %self.name, error = %cause, "stop failed");
                    Err(cause)
                }
            },
            StrategyStatus::Initialized => {
                *self.status.write() = StrategyStatus::Stopped;
                Ok(())
            }
            StrategyStatus::Stopped | StrategyStatus::Error => Ok(()),
        }
    }

    /// Run the `on_cleanup` hook. Legal from any non-running state.
    pub async fn cleanup(&self, ctx: &StrategyContext) -> Result<(), StrategyError> {
        let mut hooks = self.hooks.lock().await;
        let from = self.status();
        if from == StrategyStatus::Running {
            return Err(StrategyError::InvalidTransition {
                from,
                to: StrategyStatus::Stopped,
            });
        }

        hooks.on_cleanup(ctx).await.map_err(|cause| {
            warn!(strategy = %self.name, error = %cause, "cleanup failed");
            cause
        })?;
        info!(strategy = %self.name, "strategy cleaned up");
        Ok(())
    }

    /// Deliver a market data tick. Dropped unless `RUNNING`; hook errors
    /// are logged and swallowed.
    pub async fn handle_market_data(&self, data: &MarketData, ctx: &StrategyContext) {
        if self.status() != StrategyStatus::Running {
            return;
        }
        let mut hooks = self.hooks.lock().await;
        if let Err(cause) = hooks.on_market_data(data, ctx).await {
            error!(strategy = %self.name, error = %cause, "market data hook failed");
        }
    }

    /// Deliver an order status update. Dropped unless `RUNNING`.
    pub async fn handle_order_update(&self, update: &OrderUpdate, ctx: &StrategyContext) {
        if self.status() != StrategyStatus::Running {
            return;
        }
        let mut hooks = self.hooks.lock().await;
        if let Err(cause) = hooks.on_order_update(update, ctx).await {
            error!(strategy = %self.name, error = %cause, "order update hook failed");
        }
    }

    /// Deliver a fill. Applies the fill to the per-strategy position book
    /// (replayed duplicates are ignored), then runs the hook. Dropped
    /// unless `RUNNING`.
    pub async fn handle_trade_update(&self, update: &TradeUpdate, ctx: &StrategyContext) {
        if self.status() != StrategyStatus::Running {
            return;
        }

        if self.fills.lock().observe(update) {
            self.positions
                .lock()
                .entry(update.symbol.clone())
                .or_insert_with(|| Position::new(&update.symbol))
                .apply_fill(update.signed_volume(), update.price);
        }

        let mut hooks = self.hooks.lock().await;
        if let Err(cause) = hooks.on_trade_update(update, ctx).await {
            error!(strategy = %self.name, error = %cause, "trade update hook failed");
        }
    }

    /// Strategy-local risk verdict.
    pub async fn check_risk_limits(&self) -> bool {
        self.hooks.lock().await.check_risk_limits()
    }

    /// Refresh strategy-local risk metrics.
    pub async fn update_risk_metrics(&self) {
        self.hooks.lock().await.update_risk_metrics();
    }
}

/// Shared handle as held by the strategy manager.
pub type SharedStrategyHandle = Arc<StrategyHandle>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;
    use async_trait::async_trait;
    use execution_core::{CoreConfig, ExecutionCore};
    use model::{now_ms, OrderSide};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    #[derive(Default)]
    struct Probe {
        fail_initialize: bool,
        fail_start: bool,
        initialized: AtomicU32,
        started: AtomicU32,
        stopped: AtomicU32,
        cleaned: AtomicU32,
        ticks: AtomicU32,
        trades: AtomicU32,
        risk_ok: AtomicBool,
    }

    struct TestStrategy {
        probe: Arc<Probe>,
    }

    #[async_trait]
    impl Strategy for TestStrategy {
        fn name(&self) -> &str {
            "test"
        }

        fn kind(&self) -> StrategyKind {
            StrategyKind::MeanReversion
        }

        fn subscriptions(&self) -> Vec<MarketSubscription> {
            vec![MarketSubscription::new("BTCUSDT", "paper")]
        }

        async fn on_initialize(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
            self.probe.initialized.fetch_add(1, Ordering::SeqCst);
            if self.probe.fail_initialize {
                return Err(StrategyError::Execution("bad config".into()));
            }
            Ok(())
        }

        async fn on_start(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
            self.probe.started.fetch_add(1, Ordering::SeqCst);
            if self.probe.fail_start {
                return Err(StrategyError::Execution("no data".into()));
            }
            Ok(())
        }

        async fn on_stop(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
            self.probe.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_cleanup(&mut self, _ctx: &StrategyContext) -> Result<(), StrategyError> {
            self.probe.cleaned.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_market_data(
            &mut self,
            _data: &MarketData,
            _ctx: &StrategyContext,
        ) -> Result<(), StrategyError> {
            self.probe.ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_trade_update(
            &mut self,
            _update: &TradeUpdate,
            _ctx: &StrategyContext,
        ) -> Result<(), StrategyError> {
            self.probe.trades.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn check_risk_limits(&self) -> bool {
            self.probe.risk_ok.load(Ordering::SeqCst)
        }
    }

    fn harness(probe: Arc<Probe>) -> (StrategyHandle, StrategyContext) {
        let core = ExecutionCore::new(CoreConfig::default());
        let ctx = StrategyContext::new(core);
        let handle = StrategyHandle::new(Box::new(TestStrategy { probe }));
        (handle, ctx)
    }

    fn tick() -> MarketData {
        MarketData::quote("BTCUSDT", now_ms(), 100.0, 99.0, 101.0)
    }

    fn fill(order_id: &str, volume: f64, price: f64, ts: i64) -> TradeUpdate {
        TradeUpdate {
            order_id: order_id.to_string(),
            symbol: "BTCUSDT".to_string(),
            price,
            volume,
            side: OrderSide::Buy,
            timestamp_ms: ts,
        }
    }

    #[tokio::test]
    async fn test_happy_path_lifecycle() {
        let probe = Arc::new(Probe::default());
        let (handle, ctx) = harness(Arc::clone(&probe));

        assert_eq!(handle.status(), StrategyStatus::Initialized);
        handle.initialize(&ctx).await.unwrap();
        handle.start(&ctx).await.unwrap();
        assert_eq!(handle.status(), StrategyStatus::Running);

        handle.stop(&ctx).await.unwrap();
        assert_eq!(handle.status(), StrategyStatus::Stopped);
        handle.cleanup(&ctx).await.unwrap();

        assert_eq!(probe.initialized.load(Ordering::SeqCst), 1);
        assert_eq!(probe.started.load(Ordering::SeqCst), 1);
        assert_eq!(probe.stopped.load(Ordering::SeqCst), 1);
        assert_eq!(probe.cleaned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_strategy_stop_then_start_is_invalid() {
        let probe = Arc::new(Probe::default());
        let (handle, ctx) = harness(probe);

        handle.initialize(&ctx).await.unwrap();
        assert_eq!(handle.status(), StrategyStatus::Initialized);

        // Stopping a never-started strategy settles it without error.
        handle.stop(&ctx).await.unwrap();
        assert_eq!(handle.status(), StrategyStatus::Stopped);

        // Starting from STOPPED is an invalid transition.
        assert!(matches!(
            handle.start(&ctx).await,
            Err(StrategyError::InvalidTransition {
                from: StrategyStatus::Stopped,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_start_is_idempotent_while_running() {
        let probe = Arc::new(Probe::default());
        let (handle, ctx) = harness(Arc::clone(&probe));

        handle.initialize(&ctx).await.unwrap();
        handle.start(&ctx).await.unwrap();
        handle.start(&ctx).await.unwrap();

        assert_eq!(probe.started.load(Ordering::SeqCst), 1);
        assert_eq!(handle.status(), StrategyStatus::Running);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let probe = Arc::new(Probe::default());
        let (handle, ctx) = harness(Arc::clone(&probe));

        handle.initialize(&ctx).await.unwrap();
        handle.start(&ctx).await.unwrap();
        handle.stop(&ctx).await.unwrap();
        handle.stop(&ctx).await.unwrap();

        assert_eq!(probe.stopped.load(Ordering::SeqCst), 1);
        assert_eq!(handle.status(), StrategyStatus::Stopped);
    }

    #[tokio::test]
    async fn test_initialize_failure_lands_in_error() {
        let probe = Arc::new(Probe {
            fail_initialize: true,
            ..Probe::default()
        });
        let (handle, ctx) = harness(probe);

        let result = handle.initialize(&ctx).await;
        assert!(matches!(result, Err(StrategyError::Initialization(_))));
        assert_eq!(handle.status(), StrategyStatus::Error);

        // An errored strategy cannot start, and a second initialize is
        // refused too.
        assert!(handle.start(&ctx).await.is_err());
        assert!(handle.initialize(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_start_failure_lands_in_error() {
        let probe = Arc::new(Probe {
            fail_start: true,
            ..Probe::default()
        });
        let (handle, ctx) = harness(probe);

        handle.initialize(&ctx).await.unwrap();
        assert!(handle.start(&ctx).await.is_err());
        assert_eq!(handle.status(), StrategyStatus::Error);

        // Events are not delivered in ERROR.
        handle.handle_market_data(&tick(), &ctx).await;
    }

    #[tokio::test]
    async fn test_cleanup_refused_while_running() {
        let probe = Arc::new(Probe::default());
        let (handle, ctx) = harness(probe);

        handle.initialize(&ctx).await.unwrap();
        handle.start(&ctx).await.unwrap();
        assert!(matches!(
            handle.cleanup(&ctx).await,
            Err(StrategyError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_events_only_while_running() {
        let probe = Arc::new(Probe::default());
        let (handle, ctx) = harness(Arc::clone(&probe));

        handle.handle_market_data(&tick(), &ctx).await;
        assert_eq!(probe.ticks.load(Ordering::SeqCst), 0);

        handle.initialize(&ctx).await.unwrap();
        handle.start(&ctx).await.unwrap();
        handle.handle_market_data(&tick(), &ctx).await;
        assert_eq!(probe.ticks.load(Ordering::SeqCst), 1);

        handle.stop(&ctx).await.unwrap();
        handle.handle_market_data(&tick(), &ctx).await;
        assert_eq!(probe.ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_position_bookkeeping_with_dedupe() {
        let probe = Arc::new(Probe::default());
        let (handle, ctx) = harness(Arc::clone(&probe));

        handle.initialize(&ctx).await.unwrap();
        handle.start(&ctx).await.unwrap();

        handle.handle_trade_update(&fill("OID1", 1.0, 100.0, 1_000), &ctx).await;
        // Replay of the same fill: hook still runs, position does not move.
        handle.handle_trade_update(&fill("OID1", 1.0, 100.0, 1_000), &ctx).await;
        handle.handle_trade_update(&fill("OID1", 1.0, 110.0, 2_000), &ctx).await;

        let pos = handle.position("BTCUSDT").unwrap();
        assert!((pos.volume - 2.0).abs() < 1e-9);
        assert!((pos.average_price - 105.0).abs() < 1e-9);
        assert_eq!(probe.trades.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_risk_hooks_passthrough() {
        let probe = Arc::new(Probe::default());
        probe.risk_ok.store(true, Ordering::SeqCst);
        let (handle, ctx) = harness(Arc::clone(&probe));

        handle.initialize(&ctx).await.unwrap();
        assert!(handle.check_risk_limits().await);
        probe.risk_ok.store(false, Ordering::SeqCst);
        assert!(!handle.check_risk_limits().await);
        handle.update_risk_metrics().await;
    }
}
