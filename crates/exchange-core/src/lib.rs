//! The exchange adapter seam.
//!
//! [`ExchangeAdapter`] is the capability set the order router consumes.
//! Adapters push market data and order/trade reports into the runtime
//! through an [`EventSink`] handed to them at registration, instead of
//! carrying per-callback setters; the sink wraps the event processor's
//! publishing handle.
//!
//! Wire-level venue adapters live outside this workspace. The bundled
//! [`PaperExchange`] simulates a venue in-process for tests, demos, and
//! dry runs.

mod adapter;
mod error;
mod paper;
mod sink;

pub use adapter::{ExchangeAdapter, SharedAdapter};
pub use error::AdapterError;
pub use paper::{FillMode, PaperExchange};
pub use sink::EventSink;
