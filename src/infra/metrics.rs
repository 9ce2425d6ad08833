//! Lock-free polling counters and per-cycle reporting
//!
//! Counters are statistical only; all atomics use Relaxed ordering.

use crate::domain::types::Occupancy;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Default)]
pub struct Metrics {
    cycles_total: AtomicU64,
    cycles_skipped: AtomicU64,
    cycles_aborted: AtomicU64,
    requests_total: AtomicU64,
    request_failures: AtomicU64,
    timeouts_total: AtomicU64,
    free_total: AtomicU64,
    occupied_total: AtomicU64,
    disconnected_total: AtomicU64,
    malformed_total: AtomicU64,
    events_dispatched: AtomicU64,
    events_dropped: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSummary {
    pub cycles_total: u64,
    pub cycles_skipped: u64,
    pub cycles_aborted: u64,
    pub requests_total: u64,
    pub request_failures: u64,
    pub timeouts_total: u64,
    pub free_total: u64,
    pub occupied_total: u64,
    pub disconnected_total: u64,
    pub malformed_total: u64,
    pub events_dispatched: u64,
    pub events_dropped: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_cycle(&self) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cycle_skipped(&self) {
        self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cycle_aborted(&self) {
        self.cycles_aborted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_request_failure(&self, timeout: bool) {
        self.request_failures.fetch_add(1, Ordering::Relaxed);
        if timeout {
            self.timeouts_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_classification(&self, kind: Occupancy) {
        let counter = match kind {
            Occupancy::Free => &self.free_total,
            Occupancy::Occupied => &self.occupied_total,
            Occupancy::Disconnected => &self.disconnected_total,
            Occupancy::Malformed => &self.malformed_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dispatched(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSummary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSummary {
            cycles_total: load(&self.cycles_total),
            cycles_skipped: load(&self.cycles_skipped),
            cycles_aborted: load(&self.cycles_aborted),
            requests_total: load(&self.requests_total),
            request_failures: load(&self.request_failures),
            timeouts_total: load(&self.timeouts_total),
            free_total: load(&self.free_total),
            occupied_total: load(&self.occupied_total),
            disconnected_total: load(&self.disconnected_total),
            malformed_total: load(&self.malformed_total),
            events_dispatched: load(&self.events_dispatched),
            events_dropped: load(&self.events_dropped),
        }
    }
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            cycles = self.cycles_total,
            skipped = self.cycles_skipped,
            aborted = self.cycles_aborted,
            requests = self.requests_total,
            failures = self.request_failures,
            timeouts = self.timeouts_total,
            free = self.free_total,
            occupied = self.occupied_total,
            disconnected = self.disconnected_total,
            malformed = self.malformed_total,
            dispatched = self.events_dispatched,
            dropped = self.events_dropped,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.record_cycle();
        metrics.record_request();
        metrics.record_request();
        metrics.record_request_failure(true);
        metrics.record_request_failure(false);
        metrics.record_classification(Occupancy::Free);
        metrics.record_classification(Occupancy::Malformed);
        metrics.record_dispatched();
        metrics.record_dropped();

        let summary = metrics.snapshot();
        assert_eq!(summary.cycles_total, 1);
        assert_eq!(summary.requests_total, 2);
        assert_eq!(summary.request_failures, 2);
        assert_eq!(summary.timeouts_total, 1);
        assert_eq!(summary.free_total, 1);
        assert_eq!(summary.malformed_total, 1);
        assert_eq!(summary.occupied_total, 0);
        assert_eq!(summary.events_dispatched, 1);
        assert_eq!(summary.events_dropped, 1);
    }
}
