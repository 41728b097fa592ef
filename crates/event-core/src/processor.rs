//! The event processor: ring channel, consumer task, handler registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use common::{PublishPolicy, RingBuffer};
use metrics::{Counter, SharedMetrics};
use model::{Event, EventKind};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::EventError;
use crate::handler::{EventHandler, HandlerId};

/// Event processor tuning.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Ring buffer slot count; usable capacity is one less.
    pub buffer_size: usize,
    /// What `publish` does when the channel is full.
    pub publish_policy: PublishPolicy,
    /// Retry attempts under [`PublishPolicy::Retry`].
    pub publish_retries: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            publish_policy: PublishPolicy::Retry,
            publish_retries: 64,
        }
    }
}

#[derive(Clone)]
struct RegisteredHandler {
    id: HandlerId,
    handler: Arc<dyn EventHandler>,
}

struct Shared {
    ring: RingBuffer<Event>,
    running: AtomicBool,
    wakeup: Notify,
    registry: RwLock<HashMap<EventKind, Vec<RegisteredHandler>>>,
    next_handler_id: AtomicU64,
    publish_policy: PublishPolicy,
    publish_retries: u32,
    metrics: SharedMetrics,
}

impl Shared {
    fn publish(&self, event: Event) -> Result<(), EventError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(EventError::NotRunning);
        }

        let mut event = event;
        let mut attempts = 0u32;
        loop {
            match self.ring.push(event) {
                Ok(()) => {
                    self.metrics.record(Counter::EventsPublished);
                    self.wakeup.notify_one();
                    return Ok(());
                }
                Err(back) => {
                    let keep_trying = matches!(self.publish_policy, PublishPolicy::Retry)
                        && attempts < self.publish_retries;
                    if !keep_trying {
                        self.metrics.record(Counter::EventsDropped);
                        return Err(EventError::QueueFull);
                    }
                    event = back;
                    attempts += 1;
                    // Give the consumer a chance to drain a slot.
                    self.wakeup.notify_one();
                    std::thread::yield_now();
                }
            }
        }
    }

    async fn dispatch(&self, event: &Event) {
        // Snapshot the handler list under a short read lock; hooks run
        // without any lock held.
        let handlers: Vec<RegisteredHandler> = self
            .registry
            .read()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        for entry in &handlers {
            if let Err(error) = entry.handler.handle(event).await {
                self.metrics.record(Counter::HandlerErrors);
                warn!(
                    kind = ?event.kind(),
                    source = %event.source,
                    handler_id = ?entry.id,
                    error = %error,
                    "event handler failed"
                );
            }
        }

        self.metrics.record(Counter::EventsDispatched);
    }
}

async fn consume(shared: Arc<Shared>) {
    loop {
        // Arm the wakeup before the state checks so a concurrent publish or
        // stop cannot slip between the check and the wait.
        let notified = shared.wakeup.notified();

        if !shared.running.load(Ordering::Acquire) {
            break;
        }

        if let Some(event) = shared.ring.pop() {
            shared.dispatch(&event).await;
            continue;
        }

        notified.await;
    }

    // Events still queued at shutdown are dropped, so a later start sees
    // an empty channel.
    let mut discarded = 0usize;
    while shared.ring.pop().is_some() {
        discarded += 1;
    }
    if discarded > 0 {
        debug!(discarded, "discarded queued events on shutdown");
    }
}

/// A cheap-to-clone publishing handle onto a processor's channel.
///
/// Handed to exchange adapters so they can inject events without holding
/// the processor itself. The channel is single-consumer and intended for a
/// single producer side; concurrent publishers must serialize upstream.
#[derive(Clone)]
pub struct EventPublisher {
    shared: Arc<Shared>,
}

impl EventPublisher {
    /// Publish an event. Fails with `NotRunning` when the processor is
    /// stopped and `QueueFull` when backpressure wins.
    pub fn publish(&self, event: Event) -> Result<(), EventError> {
        self.shared.publish(event)
    }
}

/// Owns the ring channel, the consumer task, and the handler registry.
pub struct EventProcessor {
    shared: Arc<Shared>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl EventProcessor {
    pub fn new(config: ProcessorConfig, metrics: SharedMetrics) -> Self {
        Self {
            shared: Arc::new(Shared {
                ring: RingBuffer::new(config.buffer_size),
                running: AtomicBool::new(false),
                wakeup: Notify::new(),
                registry: RwLock::new(HashMap::new()),
                next_handler_id: AtomicU64::new(1),
                publish_policy: config.publish_policy,
                publish_retries: config.publish_retries,
                metrics,
            }),
            consumer: Mutex::new(None),
        }
    }

    /// Start the consumer task. Idempotent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(consume(shared));
        *self.consumer.lock() = Some(handle);
        info!(capacity = self.shared.ring.capacity(), "event processor started");
    }

    /// Stop the consumer task and wait for the in-flight handler to finish.
    /// Idempotent. Queued events that were never dispatched are discarded.
    pub async fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }

        // notify_one stores a permit, so the wakeup cannot be lost even if
        // the consumer is between its running-check and its wait.
        self.shared.wakeup.notify_one();
        let handle = self.consumer.lock().take();
        if let Some(handle) = handle {
            if let Err(error) = handle.await {
                warn!(error = %error, "event consumer task panicked");
            }
        }
        info!("event processor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Publish an event onto the channel. Never blocks the producer beyond
    /// the configured bounded yield-retry.
    pub fn publish(&self, event: Event) -> Result<(), EventError> {
        self.shared.publish(event)
    }

    /// A clonable handle for producers.
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Register a handler for one event kind. Handlers for a kind run in
    /// subscription order.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> HandlerId {
        let id = HandlerId(self.shared.next_handler_id.fetch_add(1, Ordering::Relaxed));
        self.shared
            .registry
            .write()
            .entry(kind)
            .or_default()
            .push(RegisteredHandler { id, handler });
        debug!(?kind, handler_id = ?id, "handler subscribed");
        id
    }

    /// Remove a handler by id. No-op when the id is unknown.
    pub fn unsubscribe(&self, kind: EventKind, id: HandlerId) {
        let mut registry = self.shared.registry.write();
        if let Some(handlers) = registry.get_mut(&kind) {
            handlers.retain(|entry| entry.id != id);
        }
    }

    /// Number of events currently queued.
    pub fn queued(&self) -> usize {
        self.shared.ring.len()
    }

    /// Usable channel capacity.
    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.shared.ring.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use async_trait::async_trait;
    use model::MarketData;
    use std::time::Duration;

    fn market_event(symbol: &str, ts: i64) -> Event {
        Event::market_data(MarketData::quote(symbol, ts, 100.0, 99.0, 101.0), "test")
    }

    fn order_event(order_id: &str, ts: i64) -> Event {
        Event::order_update(
            model::OrderUpdate {
                order_id: order_id.to_string(),
                status: model::OrderStatus::Pending,
                filled_price: 0.0,
                filled_volume: 0.0,
                timestamp_ms: ts,
                message: String::new(),
            },
            "test",
        )
    }

    fn processor(buffer_size: usize, policy: PublishPolicy) -> EventProcessor {
        EventProcessor::new(
            ProcessorConfig {
                buffer_size,
                publish_policy: policy,
                publish_retries: 4,
            },
            metrics::create_metrics(),
        )
    }

    async fn wait_for(check: impl Fn() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_publish_requires_running() {
        let processor = processor(16, PublishPolicy::FailFast);
        assert!(matches!(
            processor.publish(market_event("BTCUSDT", 1)),
            Err(EventError::NotRunning)
        ));

        processor.start();
        assert!(processor.publish(market_event("BTCUSDT", 2)).is_ok());

        processor.stop().await;
        assert!(matches!(
            processor.publish(market_event("BTCUSDT", 3)),
            Err(EventError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let processor = processor(16, PublishPolicy::FailFast);

        processor.start();
        processor.start();
        assert!(processor.is_running());

        processor.stop().await;
        processor.stop().await;
        assert!(!processor.is_running());

        // Restart after stop works.
        processor.start();
        assert!(processor.is_running());
        processor.stop().await;
    }

    #[tokio::test]
    async fn test_dispatch_in_publish_order_across_kinds() {
        let processor = processor(64, PublishPolicy::Retry);
        let seen = Arc::new(Mutex::new(Vec::new()));

        for kind in [EventKind::MarketData, EventKind::OrderUpdate] {
            let seen = Arc::clone(&seen);
            processor.subscribe(
                kind,
                handler_fn(move |event| {
                    seen.lock().push(event.timestamp_ms);
                    Ok(())
                }),
            );
        }

        processor.start();
        processor.publish(market_event("BTCUSDT", 1)).unwrap();
        processor.publish(order_event("OID1", 2)).unwrap();
        processor.publish(market_event("BTCUSDT", 3)).unwrap();

        wait_for(|| seen.lock().len() == 3).await;
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        processor.stop().await;
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_later_handlers() {
        let processor = processor(16, PublishPolicy::FailFast);
        let calls = Arc::new(Mutex::new(Vec::new()));

        {
            let calls = Arc::clone(&calls);
            processor.subscribe(
                EventKind::MarketData,
                handler_fn(move |_| {
                    calls.lock().push("first");
                    Err(EventError::Handler("boom".into()))
                }),
            );
        }
        {
            let calls = Arc::clone(&calls);
            processor.subscribe(
                EventKind::MarketData,
                handler_fn(move |_| {
                    calls.lock().push("second");
                    Ok(())
                }),
            );
        }

        processor.start();
        processor.publish(market_event("BTCUSDT", 1)).unwrap();
        processor.publish(market_event("BTCUSDT", 2)).unwrap();

        wait_for(|| calls.lock().len() == 4).await;
        assert_eq!(*calls.lock(), vec!["first", "second", "first", "second"]);
        processor.stop().await;
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let processor = processor(16, PublishPolicy::FailFast);
        let count = Arc::new(Mutex::new(0usize));

        let id = {
            let count = Arc::clone(&count);
            processor.subscribe(
                EventKind::MarketData,
                handler_fn(move |_| {
                    *count.lock() += 1;
                    Ok(())
                }),
            )
        };

        processor.start();
        processor.publish(market_event("BTCUSDT", 1)).unwrap();
        wait_for(|| *count.lock() == 1).await;

        processor.unsubscribe(EventKind::MarketData, id);
        // Unknown id is a no-op.
        processor.unsubscribe(EventKind::MarketData, HandlerId(9999));

        processor.publish(market_event("BTCUSDT", 2)).unwrap();
        wait_for(|| processor.is_empty()).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*count.lock(), 1);
        processor.stop().await;
    }

    #[tokio::test]
    async fn test_queue_full_fail_fast() {
        struct Blocking {
            release: Arc<Notify>,
            entered: Arc<Notify>,
            blocked_once: std::sync::atomic::AtomicBool,
        }

        #[async_trait]
        impl EventHandler for Blocking {
            async fn handle(&self, _event: &Event) -> Result<(), EventError> {
                // Park on the first event only, so shutdown can drain the
                // rest.
                if !self
                    .blocked_once
                    .swap(true, std::sync::atomic::Ordering::SeqCst)
                {
                    self.entered.notify_one();
                    self.release.notified().await;
                }
                Ok(())
            }
        }

        let processor = processor(4, PublishPolicy::FailFast);
        let release = Arc::new(Notify::new());
        let entered = Arc::new(Notify::new());
        processor.subscribe(
            EventKind::MarketData,
            Arc::new(Blocking {
                release: Arc::clone(&release),
                entered: Arc::clone(&entered),
                blocked_once: std::sync::atomic::AtomicBool::new(false),
            }),
        );

        processor.start();

        // First event is popped and parks inside the handler.
        processor.publish(market_event("BTCUSDT", 0)).unwrap();
        entered.notified().await;

        // The ring now has capacity() free slots; one more is refused.
        for ts in 1..=3 {
            processor.publish(market_event("BTCUSDT", ts)).unwrap();
        }
        assert!(processor.is_full());
        assert!(matches!(
            processor.publish(market_event("BTCUSDT", 4)),
            Err(EventError::QueueFull)
        ));

        release.notify_one();
        processor.stop().await;
    }

    #[tokio::test]
    async fn test_stop_discards_queued_events() {
        let processor = processor(16, PublishPolicy::FailFast);
        let count = Arc::new(Mutex::new(0usize));

        struct Slow {
            count: Arc<Mutex<usize>>,
        }

        #[async_trait]
        impl EventHandler for Slow {
            async fn handle(&self, _event: &Event) -> Result<(), EventError> {
                tokio::time::sleep(Duration::from_millis(20)).await;
                *self.count.lock() += 1;
                Ok(())
            }
        }

        processor.subscribe(
            EventKind::MarketData,
            Arc::new(Slow {
                count: Arc::clone(&count),
            }),
        );

        processor.start();
        for ts in 0..10 {
            processor.publish(market_event("BTCUSDT", ts)).unwrap();
        }
        // Stop while most events are still queued; the in-flight handler
        // finishes, the rest are dropped.
        processor.stop().await;
        assert!(*count.lock() < 10);
    }
}
