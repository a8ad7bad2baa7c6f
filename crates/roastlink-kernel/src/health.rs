//! [`HealthReporter`] – periodic liveness report for a running bridge.
//!
//! The reporter never touches the telemetry path.  It samples
//! [`BridgeStats`] once per interval, feeds a [`Watchdog`] with a heartbeat
//! for every component whose counter moved, and logs transitions:
//!
//! | component | heartbeat when |
//! |---|---|
//! | [`TELEMETRY_COMPONENT`] | `records_decoded` advanced |
//! | [`SERIAL_COMPONENT`] | `lines_written` advanced |
//!
//! A stale component is reported once with `warn!` and once more with
//! `info!` when it recovers.  Stale telemetry does not stop the serial
//! writer; the cached value keeps being emitted.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::stats::{BridgeStats, StatsSnapshot};
use crate::watchdog::Watchdog;

pub const TELEMETRY_COMPONENT: &str = "telemetry";
pub const SERIAL_COMPONENT: &str = "serial";

/// Default sampling interval.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);
/// Default silence after which a component is reported stale.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10);

/// Outcome of one sampling step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HealthReport {
    /// Components that became stale in this step.
    pub newly_stale: Vec<String>,
    /// Components that recovered in this step.
    pub recovered: Vec<String>,
}

pub struct HealthReporter {
    stats: Arc<BridgeStats>,
    interval: Duration,
    watchdog: Watchdog,
    last: StatsSnapshot,
    stale: BTreeSet<String>,
}

impl HealthReporter {
    /// Build a reporter over `stats`.  Both components start their deadline
    /// now.
    pub fn new(stats: Arc<BridgeStats>, interval: Duration, stale_after: Duration) -> Self {
        let mut watchdog = Watchdog::new();
        watchdog.register(TELEMETRY_COMPONENT, stale_after);
        watchdog.register(SERIAL_COMPONENT, stale_after);
        let last = stats.snapshot();
        Self {
            stats,
            interval,
            watchdog,
            last,
            stale: BTreeSet::new(),
        }
    }

    /// Sample the counters once and log any health transition.
    pub fn sample(&mut self) -> HealthReport {
        let now = self.stats.snapshot();
        if now.records_decoded > self.last.records_decoded {
            self.watchdog.heartbeat(TELEMETRY_COMPONENT);
        }
        if now.lines_written > self.last.lines_written {
            self.watchdog.heartbeat(SERIAL_COMPONENT);
        }
        self.last = now;

        let stale_now: BTreeSet<String> = self.watchdog.check_all().into_iter().collect();
        let report = HealthReport {
            newly_stale: stale_now.difference(&self.stale).cloned().collect(),
            recovered: self.stale.difference(&stale_now).cloned().collect(),
        };

        for component in &report.newly_stale {
            let silent_for = self.watchdog.silence(component).unwrap_or_default();
            warn!(component = %component, ?silent_for, "bridge component went stale");
        }
        for component in &report.recovered {
            info!(component = %component, "bridge component recovered");
        }
        debug!(
            records_decoded = now.records_decoded,
            decode_failures = now.decode_failures,
            ignored_publishes = now.ignored_publishes,
            broker_errors = now.broker_errors,
            lines_written = now.lines_written,
            write_failures = now.write_failures,
            empty_ticks = now.empty_ticks,
            "bridge stats"
        );

        self.stale = stale_now;
        report
    }

    /// Sample forever at the configured interval.
    pub async fn run(mut self) {
        loop {
            tokio::time::sleep(self.interval).await;
            self.sample();
        }
    }
}
