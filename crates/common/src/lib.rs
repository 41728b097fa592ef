//! Shared infrastructure: the bounded ring buffer, runtime configuration,
//! and logging setup.

mod config;
mod logging;
mod ring;

pub use config::{
    ConfigError, EngineSettings, ExchangeEndpoints, PublishPolicy, RuntimeConfig, StrategySettings,
};
pub use logging::init_logging;
pub use ring::RingBuffer;
