//! Bundled reference strategies.

mod market_maker;
mod trend_follower;

pub use market_maker::{MarketMakerConfig, MarketMakerStrategy};
pub use trend_follower::{TrendFollowerConfig, TrendFollowerStrategy};
