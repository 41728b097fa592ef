//! Backtest results and CSV output.

use std::path::Path;

use model::TradeUpdate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
}

/// Summary of one backtest run.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    /// Cash at the end of the run.
    pub final_capital: f64,
    /// `(final - initial) / initial`.
    pub total_return: f64,
    /// Mean over standard deviation of per-point equity returns; zero when
    /// the curve is too short or flat.
    pub sharpe_ratio: f64,
    /// Worst peak-to-trough drawdown of the equity curve, as a fraction.
    pub max_drawdown: f64,
    pub total_trades: usize,
    /// Closing trades whose realized P&L was positive.
    pub winning_trades: usize,
    pub win_rate: f64,
    pub average_win: f64,
    pub average_loss: f64,
    /// `(timestamp_ms, equity)` after every processed event.
    pub equity_curve: Vec<(i64, f64)>,
    pub trades: Vec<TradeUpdate>,
}

impl BacktestReport {
    /// Write the equity curve as `timestamp,equity`.
    pub fn write_equity_csv(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["timestamp", "equity"])?;
        for (timestamp, equity) in &self.equity_curve {
            writer.write_record([timestamp.to_string(), equity.to_string()])?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Write the trade log as
    /// `timestamp,orderId,symbol,side,price,volume`.
    pub fn write_trades_csv(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["timestamp", "orderId", "symbol", "side", "price", "volume"])?;
        for trade in &self.trades {
            writer.write_record([
                trade.timestamp_ms.to_string(),
                trade.order_id.clone(),
                trade.symbol.clone(),
                trade.side.as_str().to_string(),
                trade.price.to_string(),
                trade.volume.to_string(),
            ])?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}
