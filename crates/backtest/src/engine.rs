//! The replay engine.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use execution_core::ExecutionCore;
use model::{Event, EventPayload, MarketData, OrderSide, Position, VOLUME_EPSILON};
use serde::Deserialize;
use strategy_core::{BoxedStrategy, StrategyContext, StrategyError, StrategyHandle};
use thiserror::Error;
use tracing::{info, warn};

use crate::report::{BacktestReport, ReportError};

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("failed to read market data {path}: {source}")]
    Data {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Replay parameters.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fee rate on traded notional, per symbol.
    pub trading_fees: HashMap<String, f64>,
    /// Price impact applied against the fill, per symbol.
    pub slippage: HashMap<String, f64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            trading_fees: HashMap::new(),
            slippage: HashMap::new(),
        }
    }
}

/// One row of a market data CSV file.
#[derive(Debug, Deserialize)]
struct MarketDataRow {
    timestamp: i64,
    last_price: f64,
    best_bid: f64,
    best_ask: f64,
    #[serde(default)]
    bid_volume: f64,
    #[serde(default)]
    ask_volume: f64,
}

/// Replays a time-ordered event stream through a strategy, with capital
/// and position accounting on the side.
///
/// Market data drives `on_market_data` and the last-price cache; order
/// updates drive `on_order_update`; trade updates are the fills: they
/// move capital and positions and drive `on_trade_update`. One equity
/// point is appended per processed event.
pub struct BacktestEngine {
    config: BacktestConfig,
    events: Vec<Event>,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            events: Vec::new(),
        }
    }

    /// Queue one event for replay. Events are sorted by timestamp before
    /// the run; pushes may arrive in any order.
    pub fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Load a market data CSV
    /// (`timestamp,last_price,best_bid,best_ask[,bid_volume,ask_volume]`)
    /// as events for `symbol` attributed to `source`. Returns the number of
    /// rows loaded.
    pub fn load_market_data_csv(
        &mut self,
        symbol: &str,
        source: &str,
        path: impl AsRef<Path>,
    ) -> Result<usize, BacktestError> {
        let path = path.as_ref();
        let wrap = |source: csv::Error| BacktestError::Data {
            path: path.display().to_string(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(wrap)?;
        let mut loaded = 0;
        for row in reader.deserialize::<MarketDataRow>() {
            let row = row.map_err(wrap)?;
            let mut data =
                MarketData::quote(symbol, row.timestamp, row.last_price, row.best_bid, row.best_ask);
            data.bid_volume = row.bid_volume;
            data.ask_volume = row.ask_volume;
            self.events.push(Event::market_data(data, source));
            loaded += 1;
        }
        info!(symbol, rows = loaded, path = %path.display(), "market data loaded");
        Ok(loaded)
    }

    /// Run the replay. The strategy goes through the full lifecycle:
    /// initialize, start, every event, stop, cleanup.
    pub async fn run(
        &mut self,
        strategy: BoxedStrategy,
        core: Arc<ExecutionCore>,
    ) -> Result<BacktestReport, BacktestError> {
        self.events.sort_by_key(|event| event.timestamp_ms);

        let handle = StrategyHandle::new(strategy);
        let ctx = StrategyContext::new(core);

        handle.initialize(&ctx).await?;
        handle.start(&ctx).await?;

        let mut capital = self.config.initial_capital;
        let mut positions: HashMap<String, Position> = HashMap::new();
        let mut last_prices: HashMap<String, f64> = HashMap::new();
        let mut equity_curve: Vec<(i64, f64)> = Vec::new();
        let mut trades = Vec::new();
        let mut realized_deltas: Vec<f64> = Vec::new();

        for event in self.events.clone() {
            match &event.payload {
                EventPayload::MarketData(data) => {
                    last_prices.insert(data.symbol.clone(), data.last_price);
                    handle.handle_market_data(data, &ctx).await;
                }
                EventPayload::OrderUpdate(update) => {
                    handle.handle_order_update(update, &ctx).await;
                }
                EventPayload::TradeUpdate(trade) => {
                    let slip = self.config.slippage.get(&trade.symbol).copied().unwrap_or(0.0);
                    let fill_price = match trade.side {
                        OrderSide::Buy => trade.price * (1.0 + slip),
                        OrderSide::Sell => trade.price * (1.0 - slip),
                    };
                    let notional = fill_price * trade.volume;
                    let fee_rate = self
                        .config
                        .trading_fees
                        .get(&trade.symbol)
                        .copied()
                        .unwrap_or(0.0);
                    let fee = notional * fee_rate;

                    match trade.side {
                        OrderSide::Buy => capital -= notional + fee,
                        OrderSide::Sell => capital += notional - fee,
                    }

                    let position = positions
                        .entry(trade.symbol.clone())
                        .or_insert_with(|| Position::new(&trade.symbol));
                    let realized_before = position.realized_pnl;
                    position.apply_fill(trade.signed_volume(), fill_price);
                    let delta = position.realized_pnl - realized_before;
                    if delta.abs() > VOLUME_EPSILON {
                        realized_deltas.push(delta);
                    }

                    last_prices.insert(trade.symbol.clone(), fill_price);
                    trades.push(trade.clone());
                    handle.handle_trade_update(trade, &ctx).await;
                }
                EventPayload::StrategySignal(_) | EventPayload::SystemEvent(_) => {}
            }

            let holdings: f64 = positions
                .values()
                .map(|pos| {
                    let mark = last_prices
                        .get(&pos.symbol)
                        .copied()
                        .unwrap_or(pos.average_price);
                    pos.volume * mark
                })
                .sum();
            equity_curve.push((event.timestamp_ms, capital + holdings));
        }

        handle.stop(&ctx).await?;
        if let Err(error) = handle.cleanup(&ctx).await {
            warn!(error = %error, "strategy cleanup failed after backtest");
        }

        let report = self.build_report(capital, equity_curve, trades, realized_deltas);
        info!(
            final_capital = report.final_capital,
            total_return = report.total_return,
            trades = report.total_trades,
            "backtest complete"
        );
        Ok(report)
    }

    fn build_report(
        &self,
        capital: f64,
        equity_curve: Vec<(i64, f64)>,
        trades: Vec<model::TradeUpdate>,
        realized_deltas: Vec<f64>,
    ) -> BacktestReport {
        let total_trades = trades.len();
        let winning_trades = realized_deltas.iter().filter(|d| **d > 0.0).count();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let wins: Vec<f64> = realized_deltas.iter().copied().filter(|d| *d > 0.0).collect();
        let losses: Vec<f64> = realized_deltas.iter().copied().filter(|d| *d < 0.0).collect();
        let average_win = if wins.is_empty() {
            0.0
        } else {
            wins.iter().sum::<f64>() / wins.len() as f64
        };
        let average_loss = if losses.is_empty() {
            0.0
        } else {
            losses.iter().map(|d| d.abs()).sum::<f64>() / losses.len() as f64
        };

        BacktestReport {
            final_capital: capital,
            total_return: (capital - self.config.initial_capital) / self.config.initial_capital,
            sharpe_ratio: sharpe_ratio(&equity_curve),
            max_drawdown: max_drawdown(self.config.initial_capital, &equity_curve),
            total_trades,
            winning_trades,
            win_rate,
            average_win,
            average_loss,
            equity_curve,
            trades,
        }
    }
}

fn sharpe_ratio(equity_curve: &[(i64, f64)]) -> f64 {
    if equity_curve.len() < 3 {
        return 0.0;
    }
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0].1 != 0.0)
        .map(|w| (w[1].1 - w[0].1) / w[0].1)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / returns.len() as f64;
    if variance <= 0.0 {
        return 0.0;
    }
    mean / variance.sqrt()
}

fn max_drawdown(initial_capital: f64, equity_curve: &[(i64, f64)]) -> f64 {
    let mut peak = initial_capital;
    let mut worst = 0.0f64;
    for (_, equity) in equity_curve {
        if *equity > peak {
            peak = *equity;
        }
        if peak > 0.0 {
            worst = worst.max((peak - equity) / peak);
        }
    }
    worst
}
