use crate::domain::ports::EventSink;
use crate::domain::signal::SignalEvent;
use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Fan-out publication over a bounded channel. Slow subscribers are dropped from, not allowed to stall,
/// the publisher — mirrors the teacher's `broadcast::channel` usage in
/// its websocket order-update stream.
pub struct BroadcastSink {
    tx: broadcast::Sender<SignalEvent>,
    dropped: Arc<AtomicU64>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SignalEvent> {
        self.tx.subscribe()
    }

    /// Count of publishes that found zero live subscribers.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventSink for BroadcastSink {
    async fn emit(&self, event: SignalEvent) {
        if self.tx.send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// At-least-once durable consumer. In production this would
/// persist to a log/queue; here it logs structurally through `tracing`
/// and deduplicates on [`SignalEvent::idempotency_key`] so a replayed
/// delivery never double-counts.
pub struct LoggingDurableSink {
    seen: DashSet<String>,
    delivered: AtomicU64,
    duplicates: AtomicU64,
}

impl LoggingDurableSink {
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
            delivered: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
        }
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn duplicate_count(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }
}

impl Default for LoggingDurableSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for LoggingDurableSink {
    async fn emit(&self, event: SignalEvent) {
        let key = event.idempotency_key();
        if !self.seen.insert(key) {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %event.signal.symbol, "duplicate signal event suppressed");
            return;
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
        match event.reason {
            Some(reason) => warn!(
                kind = ?event.kind,
                symbol = %event.signal.symbol,
                direction = %event.signal.direction,
                market = %event.signal.market,
                reason = %reason,
                "signal {:?}",
                event.kind
            ),
            None => debug!(
                kind = ?event.kind,
                symbol = %event.signal.symbol,
                direction = %event.signal.direction,
                market = %event.signal.market,
                confidence = event.signal.confidence,
                "signal {:?}",
                event.kind
            ),
        }
    }
}

/// Fans every event out to both the broadcast and durable sinks (spec
/// §4.8: "published to both consumers"). Owned by the scan pipeline as a
/// single `Arc<dyn EventSink>`.
pub struct CompositeSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl CompositeSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl EventSink for CompositeSink {
    async fn emit(&self, event: SignalEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}
