//! The risk manager: limits plus a continuously updated position and
//! balance snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use model::{Order, Position, RiskLimits, VOLUME_EPSILON};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::RiskRejection;

struct RiskState {
    limits: RiskLimits,
    positions: HashMap<String, Position>,
    current_balance: f64,
    peak_balance: f64,
    daily_start_balance: f64,
}

impl RiskState {
    /// Gross exposure: sum of |volume x average price| across positions.
    fn gross_exposure(&self) -> f64 {
        self.positions.values().map(Position::entry_notional).sum()
    }
}

/// Thread-safe pre-trade policy engine.
///
/// All mutation and every read of the snapshot go through one internal
/// lock, so checks are linearizable with respect to position and balance
/// updates. The enabled flag is an atomic so the disabled fast path takes
/// no lock at all.
pub struct RiskManager {
    enabled: AtomicBool,
    state: Mutex<RiskState>,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            state: Mutex::new(RiskState {
                limits,
                positions: HashMap::new(),
                current_balance: 0.0,
                peak_balance: 0.0,
                daily_start_balance: 0.0,
            }),
        }
    }

    /// Evaluate an order intent against every limit, in a fixed order:
    /// notional, per-symbol size, projected position, leverage, drawdown,
    /// daily loss. The first violated limit is returned; values exactly at
    /// a limit are accepted.
    ///
    /// When the manager is disabled every order is accepted.
    pub fn check_order_risk(&self, order: &Order) -> Result<(), RiskRejection> {
        if !self.enabled.load(Ordering::Acquire) {
            return Ok(());
        }

        let state = self.state.lock();
        let result = Self::evaluate(&state, order);

        if let Err(ref rejection) = result {
            warn!(
                symbol = %order.symbol,
                side = %order.side,
                volume = order.volume,
                price = order.price,
                reason = %rejection,
                "order rejected by risk manager"
            );
        }
        result
    }

    fn evaluate(state: &RiskState, order: &Order) -> Result<(), RiskRejection> {
        let limits = &state.limits;
        let notional = order.notional();

        if notional > limits.max_order_size {
            return Err(RiskRejection::Notional {
                notional,
                limit: limits.max_order_size,
            });
        }

        if let Some(limit) = limits.symbol_limit(&order.symbol) {
            if order.volume > limit {
                return Err(RiskRejection::SymbolLimit {
                    symbol: order.symbol.clone(),
                    volume: order.volume,
                    limit,
                });
            }
        }

        let current = state
            .positions
            .get(&order.symbol)
            .map(|p| p.volume)
            .unwrap_or(0.0);
        let projected = current + order.signed_volume();
        if projected.abs() > limits.max_position_size {
            return Err(RiskRejection::PositionLimit {
                symbol: order.symbol.clone(),
                projected,
                limit: limits.max_position_size,
            });
        }

        let gross = state.gross_exposure() + notional;
        if state.current_balance <= 0.0 {
            // No balance to lever: any exposure at all is too much.
            if gross > VOLUME_EPSILON {
                return Err(RiskRejection::Leverage {
                    leverage: f64::INFINITY,
                    limit: limits.max_leverage,
                });
            }
        } else {
            let leverage = gross / state.current_balance;
            if leverage > limits.max_leverage {
                return Err(RiskRejection::Leverage {
                    leverage,
                    limit: limits.max_leverage,
                });
            }
        }

        if state.peak_balance > 0.0 {
            let drawdown = (state.peak_balance - state.current_balance) / state.peak_balance;
            if drawdown > limits.max_drawdown {
                return Err(RiskRejection::Drawdown {
                    drawdown,
                    limit: limits.max_drawdown,
                });
            }
        }

        let loss = state.daily_start_balance - state.current_balance;
        if loss > limits.max_daily_loss {
            return Err(RiskRejection::DailyLoss {
                loss,
                limit: limits.max_daily_loss,
            });
        }

        Ok(())
    }

    /// Apply a signed fill to the tracked position for a symbol.
    pub fn update_position(&self, symbol: &str, signed_delta: f64, price: f64) {
        let mut state = self.state.lock();
        state
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::new(symbol))
            .apply_fill(signed_delta, price);
    }

    /// Record the current account balance; the peak tracks the maximum.
    pub fn update_balance(&self, balance: f64) {
        let mut state = self.state.lock();
        state.current_balance = balance;
        if balance > state.peak_balance {
            state.peak_balance = balance;
        }
    }

    /// Rebase the daily loss reference to the current balance.
    pub fn reset_daily_metrics(&self) {
        let mut state = self.state.lock();
        state.daily_start_balance = state.current_balance;
        info!(balance = state.current_balance, "daily risk metrics reset");
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
        info!("risk manager enabled");
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        warn!("risk manager disabled, all orders will pass");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn limits(&self) -> RiskLimits {
        self.state.lock().limits.clone()
    }

    pub fn set_limits(&self, limits: RiskLimits) {
        self.state.lock().limits = limits;
        info!("risk limits updated");
    }

    /// Snapshot of the tracked position for a symbol.
    pub fn position(&self, symbol: &str) -> Option<Position> {
        self.state.lock().positions.get(symbol).cloned()
    }

    /// Snapshot of every tracked position.
    pub fn positions(&self) -> Vec<Position> {
        self.state.lock().positions.values().cloned().collect()
    }

    /// Gross exposure at entry prices.
    pub fn total_exposure(&self) -> f64 {
        self.state.lock().gross_exposure()
    }

    pub fn current_balance(&self) -> f64 {
        self.state.lock().current_balance
    }
}

/// Shared risk manager handle.
pub type SharedRiskManager = Arc<RiskManager>;

pub fn create_risk_manager(limits: RiskLimits) -> SharedRiskManager {
    Arc::new(RiskManager::new(limits))
}
