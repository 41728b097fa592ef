//! Supervisor wiring: adapters, core, and strategies in order.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::RuntimeConfig;
use exchange_core::{ExchangeAdapter, PaperExchange};
use execution_core::{CoreConfig, ExecutionCore};
use model::{now_ms, MarketData};
use rand::Rng;
use strategy_runner::strategies::{
    MarketMakerConfig, MarketMakerStrategy, TrendFollowerConfig, TrendFollowerStrategy,
};
use strategy_runner::StrategyManager;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const DEFAULT_EXCHANGE: &str = "paper";
const DEFAULT_SYMBOL: &str = "BTCUSDT";
const PAPER_STARTING_CASH: f64 = 1_000_000.0;
const FEED_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the execution core, the paper venues, and the strategy manager,
/// and starts/stops them in the supervisor order: adapters, then the
/// core, then strategies; the reverse on shutdown.
pub struct TradingApp {
    core: Arc<ExecutionCore>,
    manager: StrategyManager,
    venues: Vec<(String, Arc<PaperExchange>)>,
    feed_symbols: Vec<(String, String)>,
    feed_stop: watch::Sender<bool>,
    feed_task: Option<JoinHandle<()>>,
}

impl TradingApp {
    pub fn build(config: &RuntimeConfig) -> Result<Self> {
        let core = ExecutionCore::new(CoreConfig::from_runtime(config));
        let manager = StrategyManager::new(Arc::clone(&core));

        // One simulated venue per configured exchange; a default venue
        // when the config names none.
        let mut exchange_names: Vec<String> = config.exchanges.keys().cloned().collect();
        if exchange_names.is_empty() {
            exchange_names.push(DEFAULT_EXCHANGE.to_string());
        }
        exchange_names.sort();

        let mut venues = Vec::new();
        for name in &exchange_names {
            let venue = Arc::new(PaperExchange::new(name.clone()));
            venue.set_cash(PAPER_STARTING_CASH);
            venues.push((name.clone(), venue));
        }

        let primary_exchange = exchange_names[0].clone();
        let mut feed_symbols = Vec::new();

        if config.strategies.is_empty() {
            // Demo defaults: one market maker and one trend follower on
            // the primary venue.
            manager
                .register(Box::new(MarketMakerStrategy::new(
                    "market-maker",
                    MarketMakerConfig {
                        symbol: DEFAULT_SYMBOL.to_string(),
                        exchange: primary_exchange.clone(),
                        ..MarketMakerConfig::default()
                    },
                )))
                .context("registering default market maker")?;
            manager
                .register(Box::new(TrendFollowerStrategy::new(
                    "trend-follower",
                    TrendFollowerConfig {
                        symbol: DEFAULT_SYMBOL.to_string(),
                        exchange: primary_exchange.clone(),
                        ..TrendFollowerConfig::default()
                    },
                )))
                .context("registering default trend follower")?;
            feed_symbols.push((primary_exchange.clone(), DEFAULT_SYMBOL.to_string()));
        } else {
            for (name, settings) in &config.strategies {
                let symbol = settings
                    .symbols
                    .first()
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_SYMBOL.to_string());
                let exchange = settings
                    .exchanges
                    .first()
                    .cloned()
                    .unwrap_or_else(|| primary_exchange.clone());
                feed_symbols.push((exchange.clone(), symbol.clone()));

                // Strategy flavor is picked from its configured name.
                if name.contains("maker") {
                    manager
                        .register(Box::new(MarketMakerStrategy::new(
                            name.clone(),
                            MarketMakerConfig {
                                symbol,
                                exchange,
                                ..MarketMakerConfig::default()
                            },
                        )))
                        .with_context(|| format!("registering strategy {name}"))?;
                } else {
                    manager
                        .register(Box::new(TrendFollowerStrategy::new(
                            name.clone(),
                            TrendFollowerConfig {
                                symbol,
                                exchange,
                                ..TrendFollowerConfig::default()
                            },
                        )))
                        .with_context(|| format!("registering strategy {name}"))?;
                }
            }
        }
        feed_symbols.sort();
        feed_symbols.dedup();

        let (feed_stop, _) = watch::channel(false);
        Ok(Self {
            core,
            manager,
            venues,
            feed_symbols,
            feed_stop,
            feed_task: None,
        })
    }

    pub fn core(&self) -> &Arc<ExecutionCore> {
        &self.core
    }

    /// Bring everything up: venues, then the core, then strategies, then
    /// the synthetic tick feed that drives the paper venues.
    pub async fn start(&mut self) -> Result<()> {
        for (name, venue) in &self.venues {
            let adapter: exchange_core::SharedAdapter = Arc::clone(venue) as exchange_core::SharedAdapter;
            self.core
                .register_exchange(name.clone(), adapter)
                .with_context(|| format!("registering exchange {name}"))?;
        }

        self.core.start();

        // Seed the risk manager's balance view from the venues.
        let mut balance = 0.0;
        for (_, venue) in &self.venues {
            if let Ok(b) = venue.get_balance().await {
                balance += b.total("USDT");
            }
        }
        self.core.risk().update_balance(balance);
        self.core.risk().reset_daily_metrics();

        self.manager.start_all().await;

        self.feed_task = Some(self.spawn_feed());
        info!(
            venues = self.venues.len(),
            strategies = self.manager.names().len(),
            "trading app started"
        );
        Ok(())
    }

    /// Shut down in reverse: feed, strategies, core.
    pub async fn stop(&mut self) {
        let _ = self.feed_stop.send(true);
        if let Some(task) = self.feed_task.take() {
            let _ = task.await;
        }

        self.manager.stop_all().await;
        self.core.stop().await;
        info!("trading app stopped");
    }

    /// Random-walk ticks into each venue, standing in for live market
    /// data feeds.
    fn spawn_feed(&self) -> JoinHandle<()> {
        let venues = self.venues.clone();
        let symbols = self.feed_symbols.clone();
        let mut stop = self.feed_stop.subscribe();

        tokio::spawn(async move {
            let mut prices: Vec<f64> = symbols.iter().map(|_| 50_000.0).collect();
            let mut interval = tokio::time::interval(FEED_INTERVAL);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }

                for (i, (exchange, symbol)) in symbols.iter().enumerate() {
                    let drift: f64 = rand::thread_rng().gen_range(-0.001..0.001);
                    prices[i] *= 1.0 + drift;
                    let price = prices[i];
                    let spread = price * 0.0002;

                    let Some((_, venue)) = venues.iter().find(|(name, _)| name == exchange)
                    else {
                        continue;
                    };
                    venue.inject_market_data(MarketData::quote(
                        symbol.clone(),
                        now_ms(),
                        price,
                        price - spread,
                        price + spread,
                    ));
                }
            }
            info!("synthetic feed stopped");
        })
    }

    /// Log a one-line health summary.
    pub fn log_health(&self) {
        let snapshot = self.core.metrics().snapshot();
        info!(
            health = %snapshot.health(),
            events = snapshot.events_published,
            events_per_sec = format!("{:.1}", snapshot.publish_rate()),
            backlog = snapshot.backlog(),
            orders = snapshot.orders_submitted,
            rejected = snapshot.orders_rejected,
            fills = snapshot.fills_applied,
            "health check"
        );
        if snapshot.events_dropped > 0 {
            warn!(
                dropped = snapshot.events_dropped,
                drop_ratio = format!("{:.3}", snapshot.drop_ratio()),
                "events dropped under backpressure"
            );
        }
    }
}
