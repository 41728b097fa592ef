//! Event handler trait and registration ids.

use std::sync::Arc;

use async_trait::async_trait;
use model::Event;

use crate::error::EventError;

/// Opaque identifier returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub(crate) u64);

/// A function invoked once per event of the kind it is subscribed to.
///
/// Handlers run on the processor's consumer task and are expected to return
/// promptly; long work should be handed to a background task. Errors are
/// logged and swallowed by the dispatcher.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), EventError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> Result<(), EventError> + Send + Sync,
{
    async fn handle(&self, event: &Event) -> Result<(), EventError> {
        (self.0)(event)
    }
}

/// Wrap a synchronous closure as an [`EventHandler`].
pub fn handler_fn<F>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(&Event) -> Result<(), EventError> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}
