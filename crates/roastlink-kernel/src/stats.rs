//! [`BridgeStats`] – lock-free activity counters.
//!
//! The listener and the serial writer bump these counters as they work; the
//! health reporter reads them.  Counters only ever increase, so readers never
//! need to coordinate with writers beyond a relaxed atomic load.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared between the bridge activities.  Wrap in an `Arc` and hand
/// a clone to every activity.
#[derive(Debug, Default)]
pub struct BridgeStats {
    records_decoded: AtomicU64,
    decode_failures: AtomicU64,
    ignored_publishes: AtomicU64,
    broker_errors: AtomicU64,
    lines_written: AtomicU64,
    write_failures: AtomicU64,
    empty_ticks: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub records_decoded: u64,
    pub decode_failures: u64,
    pub ignored_publishes: u64,
    pub broker_errors: u64,
    pub lines_written: u64,
    pub write_failures: u64,
    pub empty_ticks: u64,
}

impl BridgeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decoded(&self) {
        self.records_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A publish arrived on a topic other than the subscribed one.
    pub fn record_ignored_publish(&self) {
        self.ignored_publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broker_error(&self) {
        self.broker_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_line_written(&self) {
        self.lines_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A tick fired while the cache was still empty.
    pub fn record_empty_tick(&self) {
        self.empty_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy every counter.  Individual fields are read independently, so a
    /// snapshot taken under load may mix values from adjacent instants.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_decoded: self.records_decoded.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            ignored_publishes: self.ignored_publishes.load(Ordering::Relaxed),
            broker_errors: self.broker_errors.load(Ordering::Relaxed),
            lines_written: self.lines_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            empty_ticks: self.empty_ticks.load(Ordering::Relaxed),
        }
    }
}
