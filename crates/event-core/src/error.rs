//! Event bus error types.

use thiserror::Error;

/// Errors surfaced by the event processor.
#[derive(Debug, Error)]
pub enum EventError {
    /// Publish attempted while the processor is stopped.
    #[error("event processor is not running")]
    NotRunning,

    /// The ring channel is full and the publish policy gave up.
    #[error("event queue is full")]
    QueueFull,

    /// A handler reported a failure. Logged and swallowed by the
    /// dispatcher; never stops the consumer task.
    #[error("handler failed: {0}")]
    Handler(String),
}
