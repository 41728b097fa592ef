//! Pre-trade risk checks against a live position and balance snapshot.
//!
//! The [`RiskManager`] sits between the order router and the exchange
//! adapters. Every order intent passes through [`RiskManager::check_order_risk`]
//! before it is allowed on the wire; position and balance updates flow in
//! from the event processor as fills and account updates arrive.

mod error;
mod manager;

pub use error::RiskRejection;
pub use manager::{create_risk_manager, RiskManager, SharedRiskManager};
