//! Engine counters and derived health.
//!
//! Components record plain monotonic counters; everything derived (rates,
//! ratios, the health verdict) is computed on a [`MetricsSnapshot`] so the
//! hot path is a single relaxed atomic increment. Health reflects what can
//! actually go wrong inside the engine: publishes refused under
//! backpressure and handlers failing during dispatch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// The counters the engine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Counter {
    /// Events accepted onto the channel.
    EventsPublished,
    /// Events refused because the channel was full.
    EventsDropped,
    /// Events fully fanned out to their handlers.
    EventsDispatched,
    /// Handler invocations that returned an error.
    HandlerErrors,
    /// Orders accepted by a venue.
    OrdersSubmitted,
    /// Orders refused by the risk gate.
    OrdersRejected,
    /// Cancel requests sent to a venue.
    OrdersCancelled,
    /// Fills applied to the risk position snapshot.
    FillsApplied,
}

const COUNTER_COUNT: usize = 8;

/// Lock-free counter set for the trading engine.
#[derive(Debug)]
pub struct EngineMetrics {
    started_at: Instant,
    counters: [AtomicU64; COUNTER_COUNT],
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Bump a counter by one.
    pub fn record(&self, counter: Counter) {
        self.counters[counter as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Current value of a counter.
    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Capture every counter at one point in time.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            events_published: self.get(Counter::EventsPublished),
            events_dropped: self.get(Counter::EventsDropped),
            events_dispatched: self.get(Counter::EventsDispatched),
            handler_errors: self.get(Counter::HandlerErrors),
            orders_submitted: self.get(Counter::OrdersSubmitted),
            orders_rejected: self.get(Counter::OrdersRejected),
            orders_cancelled: self.get(Counter::OrdersCancelled),
            fills_applied: self.get(Counter::FillsApplied),
        }
    }
}

/// How the engine is doing, judged from its own failure counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineHealth {
    /// Publishes are being accepted and handlers are clean.
    Ok,
    /// Backpressure is biting: a meaningful share of publishes is being
    /// refused.
    Shedding,
    /// Handlers are erroring on a meaningful share of dispatches; event
    /// flow continues but something downstream is broken.
    Erratic,
}

impl std::fmt::Display for EngineHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineHealth::Ok => write!(f, "OK"),
            EngineHealth::Shedding => write!(f, "SHEDDING"),
            EngineHealth::Erratic => write!(f, "ERRATIC"),
        }
    }
}

/// A point-in-time view of the counters, with the derived figures.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    pub events_published: u64,
    pub events_dropped: u64,
    pub events_dispatched: u64,
    pub handler_errors: u64,
    pub orders_submitted: u64,
    pub orders_rejected: u64,
    pub orders_cancelled: u64,
    pub fills_applied: u64,
}

impl MetricsSnapshot {
    /// Share of publish attempts refused for backpressure above which the
    /// engine counts as shedding.
    const SHED_RATIO: f64 = 0.01;
    /// Share of dispatches with a failing handler above which the engine
    /// counts as erratic.
    const ERROR_RATIO: f64 = 0.05;

    /// Events accepted but not yet fanned out.
    pub fn backlog(&self) -> u64 {
        self.events_published.saturating_sub(self.events_dispatched)
    }

    /// Publishes per second since start.
    pub fn publish_rate(&self) -> f64 {
        if self.uptime_secs > 0.0 {
            self.events_published as f64 / self.uptime_secs
        } else {
            0.0
        }
    }

    /// Fraction of publish attempts refused because the channel was full.
    pub fn drop_ratio(&self) -> f64 {
        let attempts = self.events_published + self.events_dropped;
        if attempts == 0 {
            0.0
        } else {
            self.events_dropped as f64 / attempts as f64
        }
    }

    /// Fraction of dispatched events that had a handler fail.
    pub fn handler_error_ratio(&self) -> f64 {
        if self.events_dispatched == 0 {
            0.0
        } else {
            self.handler_errors as f64 / self.events_dispatched as f64
        }
    }

    /// Fraction of order submissions refused by the risk gate.
    pub fn rejection_ratio(&self) -> f64 {
        let attempts = self.orders_submitted + self.orders_rejected;
        if attempts == 0 {
            0.0
        } else {
            self.orders_rejected as f64 / attempts as f64
        }
    }

    /// Judge health from the failure ratios. Dropped publishes outrank
    /// handler errors: shed events are gone, failed handlers at least saw
    /// theirs.
    pub fn health(&self) -> EngineHealth {
        if self.drop_ratio() > Self::SHED_RATIO {
            EngineHealth::Shedding
        } else if self.handler_error_ratio() > Self::ERROR_RATIO {
            EngineHealth::Erratic
        } else {
            EngineHealth::Ok
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "engine {} after {:.1}s", self.health(), self.uptime_secs)?;
        writeln!(
            f,
            "  events: {} published ({:.1}/s), {} dispatched, {} dropped, {} handler errors",
            self.events_published,
            self.publish_rate(),
            self.events_dispatched,
            self.events_dropped,
            self.handler_errors,
        )?;
        writeln!(
            f,
            "  orders: {} submitted, {} rejected ({:.1}% of attempts), {} cancelled, {} fills",
            self.orders_submitted,
            self.orders_rejected,
            self.rejection_ratio() * 100.0,
            self.orders_cancelled,
            self.fills_applied,
        )
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<EngineMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(EngineMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(f: impl FnOnce(&mut MetricsSnapshot)) -> MetricsSnapshot {
        let mut snapshot = EngineMetrics::new().snapshot();
        f(&mut snapshot);
        snapshot
    }

    #[test]
    fn test_record_and_get() {
        let metrics = EngineMetrics::new();

        metrics.record(Counter::EventsPublished);
        metrics.record(Counter::EventsPublished);
        metrics.record(Counter::OrdersSubmitted);
        metrics.record(Counter::HandlerErrors);

        assert_eq!(metrics.get(Counter::EventsPublished), 2);
        assert_eq!(metrics.get(Counter::OrdersSubmitted), 1);
        assert_eq!(metrics.get(Counter::HandlerErrors), 1);
        assert_eq!(metrics.get(Counter::EventsDropped), 0);
    }

    #[test]
    fn test_snapshot_captures_counters() {
        let metrics = EngineMetrics::new();
        metrics.record(Counter::EventsPublished);
        metrics.record(Counter::EventsDispatched);
        metrics.record(Counter::FillsApplied);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_published, 1);
        assert_eq!(snapshot.events_dispatched, 1);
        assert_eq!(snapshot.fills_applied, 1);
        assert!(snapshot.uptime_secs >= 0.0);
        assert_eq!(snapshot.backlog(), 0);
    }

    #[test]
    fn test_backlog_counts_undispatched() {
        let metrics = EngineMetrics::new();
        for _ in 0..5 {
            metrics.record(Counter::EventsPublished);
        }
        metrics.record(Counter::EventsDispatched);

        assert_eq!(metrics.snapshot().backlog(), 4);
    }

    #[test]
    fn test_ratios_handle_zero_denominators() {
        let snapshot = EngineMetrics::new().snapshot();
        assert_eq!(snapshot.drop_ratio(), 0.0);
        assert_eq!(snapshot.handler_error_ratio(), 0.0);
        assert_eq!(snapshot.rejection_ratio(), 0.0);
        assert_eq!(snapshot.health(), EngineHealth::Ok);
    }

    #[test]
    fn test_health_shedding_on_drops() {
        let snapshot = snapshot_with(|s| {
            s.events_published = 90;
            s.events_dropped = 10;
        });
        assert!(snapshot.drop_ratio() > 0.09);
        assert_eq!(snapshot.health(), EngineHealth::Shedding);

        // A lone drop in a long run is not a health problem.
        let snapshot = snapshot_with(|s| {
            s.events_published = 10_000;
            s.events_dropped = 1;
        });
        assert_eq!(snapshot.health(), EngineHealth::Ok);
    }

    #[test]
    fn test_health_erratic_on_handler_errors() {
        let snapshot = snapshot_with(|s| {
            s.events_published = 100;
            s.events_dispatched = 100;
            s.handler_errors = 20;
        });
        assert_eq!(snapshot.health(), EngineHealth::Erratic);
    }

    #[test]
    fn test_shedding_outranks_erratic() {
        let snapshot = snapshot_with(|s| {
            s.events_published = 50;
            s.events_dropped = 50;
            s.events_dispatched = 50;
            s.handler_errors = 50;
        });
        assert_eq!(snapshot.health(), EngineHealth::Shedding);
    }

    #[test]
    fn test_rejection_ratio() {
        let snapshot = snapshot_with(|s| {
            s.orders_submitted = 3;
            s.orders_rejected = 1;
        });
        assert!((snapshot.rejection_ratio() - 0.25).abs() < 1e-12);
        // Rejections alone never flip health; they are the risk gate
        // doing its job.
        assert_eq!(snapshot.health(), EngineHealth::Ok);
    }
}
