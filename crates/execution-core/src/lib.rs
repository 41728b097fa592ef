//! Order routing and the execution core facade.
//!
//! The [`OrderRouter`] maps named exchanges to adapters, gates every order
//! intent through the risk manager, and keeps the authoritative book of
//! currently-live orders. The [`ExecutionCore`] composes the event
//! processor, the risk manager, and the router behind the single surface
//! strategies and adapters talk to.

mod core;
mod error;
mod market_state;
mod router;

pub use crate::core::{CoreConfig, ExecutionCore, MarketDataCallback, SharedExecutionCore};
pub use error::RouterError;
pub use market_state::{create_market_state, MarketState, Quote, SharedMarketState};
pub use router::OrderRouter;
