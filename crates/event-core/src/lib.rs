//! The event bus: a bounded ring channel feeding a dispatcher that fans
//! events out to handlers registered per event kind.
//!
//! One [`EventProcessor`] owns the channel and a single consumer task.
//! Producers (exchange adapters, schedulers, tests) publish through an
//! [`EventPublisher`] handle; publishing never blocks beyond a bounded
//! yield-retry. Handlers run sequentially on the consumer task, so every
//! handler observes events in publish order.

mod error;
mod handler;
mod processor;

pub use error::EventError;
pub use handler::{handler_fn, EventHandler, HandlerId};
pub use processor::{EventProcessor, EventPublisher, ProcessorConfig};
