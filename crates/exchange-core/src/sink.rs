//! Event injection handle for adapters.

use event_core::EventPublisher;
use model::Event;
use tracing::warn;

/// How adapters hand events to the runtime.
///
/// Wraps the processor's publishing handle. Publishing is expected to be
/// fast; adapter I/O threads call this inline. Backpressure drops are
/// logged rather than propagated so an adapter never stalls on a slow
/// consumer.
#[derive(Clone)]
pub struct EventSink {
    publisher: EventPublisher,
}

impl EventSink {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }

    /// Publish an event, logging and dropping it on failure.
    pub fn publish(&self, event: Event) {
        if let Err(error) = self.publisher.publish(event) {
            warn!(error = %error, "event dropped at adapter sink");
        }
    }
}
