//! Pipeline metrics
//!
//! Relaxed atomic counters shared between the dispatcher and whoever wants a
//! snapshot; cheap enough for the hot path.

use std::sync::atomic::{AtomicU64, Ordering};

/// Dispatcher counters
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Records received from producers
    pub records_received: AtomicU64,
    /// Records delivered to at least one consumer
    pub records_dispatched: AtomicU64,
    /// Records with no mapped or enabled consumer
    pub records_unrouted: AtomicU64,
    /// Per-consumer enqueues that succeeded
    pub consumer_sends: AtomicU64,
    /// Per-consumer enqueues dropped on a full or closed channel
    pub consumer_drops: AtomicU64,
}

impl PipelineMetrics {
    /// Create zeroed metrics
    pub const fn new() -> Self {
        Self {
            records_received: AtomicU64::new(0),
            records_dispatched: AtomicU64::new(0),
            records_unrouted: AtomicU64::new(0),
            consumer_sends: AtomicU64::new(0),
            consumer_drops: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dispatched(&self) {
        self.records_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unrouted(&self) {
        self.records_unrouted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn consumer_send(&self) {
        self.consumer_sends.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn consumer_drop(&self) {
        self.consumer_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_dispatched: self.records_dispatched.load(Ordering::Relaxed),
            records_unrouted: self.records_unrouted.load(Ordering::Relaxed),
            consumer_sends: self.consumer_sends.load(Ordering::Relaxed),
            consumer_drops: self.consumer_drops.load(Ordering::Relaxed),
        }
    }
}

/// Copy of the counters at one instant
#[derive(Debug, Clone, Copy)]
pub struct PipelineSnapshot {
    pub records_received: u64,
    pub records_dispatched: u64,
    pub records_unrouted: u64,
    pub consumer_sends: u64,
    pub consumer_drops: u64,
}
