//! Global atomic counters for engine observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when a session is closed).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters. No allocations, no locking.
pub struct Metrics {
    events_applied: AtomicU64,
    events_rejected: AtomicU64,
    duplicates_ignored: AtomicU64,
    summaries_created: AtomicU64,
    invariant_violations: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            events_applied: AtomicU64::new(0),
            events_rejected: AtomicU64::new(0),
            duplicates_ignored: AtomicU64::new(0),
            summaries_created: AtomicU64::new(0),
            invariant_violations: AtomicU64::new(0),
        }
    }

    pub fn inc_events_applied(&self) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_applied", "counter incremented");
    }

    pub fn inc_events_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_rejected", "counter incremented");
    }

    pub fn inc_duplicates_ignored(&self) {
        self.duplicates_ignored.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "duplicates_ignored", "counter incremented");
    }

    pub fn inc_summaries_created(&self) {
        self.summaries_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "summaries_created", "counter incremented");
    }

    pub fn inc_invariant_violations(&self) {
        self.invariant_violations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "invariant_violations", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            events_applied = self.events_applied(),
            events_rejected = self.events_rejected(),
            duplicates_ignored = self.duplicates_ignored(),
            summaries_created = self.summaries_created(),
            invariant_violations = self.invariant_violations(),
        );
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Relaxed)
    }

    pub fn events_rejected(&self) -> u64 {
        self.events_rejected.load(Ordering::Relaxed)
    }

    pub fn duplicates_ignored(&self) -> u64 {
        self.duplicates_ignored.load(Ordering::Relaxed)
    }

    pub fn summaries_created(&self) -> u64 {
        self.summaries_created.load(Ordering::Relaxed)
    }

    pub fn invariant_violations(&self) -> u64 {
        self.invariant_violations.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.events_applied.store(0, Ordering::Relaxed);
        self.events_rejected.store(0, Ordering::Relaxed);
        self.duplicates_ignored.store(0, Ordering::Relaxed);
        self.summaries_created.store(0, Ordering::Relaxed);
        self.invariant_violations.store(0, Ordering::Relaxed);
    }
}
