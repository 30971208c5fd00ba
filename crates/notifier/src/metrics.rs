//! Notifier counters for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by a notifier and its background units
#[derive(Debug, Default)]
pub struct NotifierMetrics {
    /// Total `notify` calls
    notifications: AtomicU64,
    /// Background units scheduled
    scheduled_units: AtomicU64,
    /// Handler invocations (after filtering)
    handler_invocations: AtomicU64,
    /// Handler invocations that failed
    handler_failures: AtomicU64,
    /// Error consumer invocations that failed
    consumer_failures: AtomicU64,
    /// Background units that completed
    completed_units: AtomicU64,
    /// Background units that faulted
    faulted_units: AtomicU64,
    /// Background units cancelled before start
    cancelled_units: AtomicU64,
    /// Faulted units with nowhere to report to
    unobserved_failures: AtomicU64,
}

impl NotifierMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    pub fn inc_notifications(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn scheduled_units(&self) -> u64 {
        self.scheduled_units.load(Ordering::Relaxed)
    }

    pub fn inc_scheduled_units(&self) {
        self.scheduled_units.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_invocations(&self) -> u64 {
        self.handler_invocations.load(Ordering::Relaxed)
    }

    pub fn add_handler_invocations(&self, count: u64) {
        self.handler_invocations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn handler_failures(&self) -> u64 {
        self.handler_failures.load(Ordering::Relaxed)
    }

    pub fn add_handler_failures(&self, count: u64) {
        self.handler_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn consumer_failures(&self) -> u64 {
        self.consumer_failures.load(Ordering::Relaxed)
    }

    pub fn add_consumer_failures(&self, count: u64) {
        self.consumer_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn completed_units(&self) -> u64 {
        self.completed_units.load(Ordering::Relaxed)
    }

    pub fn inc_completed_units(&self) {
        self.completed_units.fetch_add(1, Ordering::Relaxed);
    }

    pub fn faulted_units(&self) -> u64 {
        self.faulted_units.load(Ordering::Relaxed)
    }

    pub fn inc_faulted_units(&self) {
        self.faulted_units.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cancelled_units(&self) -> u64 {
        self.cancelled_units.load(Ordering::Relaxed)
    }

    pub fn inc_cancelled_units(&self) {
        self.cancelled_units.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unobserved_failures(&self) -> u64 {
        self.unobserved_failures.load(Ordering::Relaxed)
    }

    pub fn inc_unobserved_failures(&self) {
        self.unobserved_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            notifications: self.notifications(),
            scheduled_units: self.scheduled_units(),
            handler_invocations: self.handler_invocations(),
            handler_failures: self.handler_failures(),
            consumer_failures: self.consumer_failures(),
            completed_units: self.completed_units(),
            faulted_units: self.faulted_units(),
            cancelled_units: self.cancelled_units(),
            unobserved_failures: self.unobserved_failures(),
        }
    }
}

/// Snapshot of notifier counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub notifications: u64,
    pub scheduled_units: u64,
    pub handler_invocations: u64,
    pub handler_failures: u64,
    pub consumer_failures: u64,
    pub completed_units: u64,
    pub faulted_units: u64,
    pub cancelled_units: u64,
    pub unobserved_failures: u64,
}

impl MetricsSnapshot {
    /// Background units that reached a final state
    pub fn finished_units(&self) -> u64 {
        self.completed_units + self.faulted_units + self.cancelled_units
    }
}
