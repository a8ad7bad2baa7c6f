//! [`Watchdog`] – component liveness monitor.
//!
//! Each bridge activity is registered under a component id with a maximum
//! silence.  [`Watchdog::heartbeat`] resets the deadline; a component whose
//! deadline has passed shows up in [`Watchdog::check_all`].
//!
//! Time is read from [`tokio::time::Instant`] so that a paused test clock
//! drives staleness deterministically.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

struct Deadline {
    last_seen: Instant,
    max_silence: Duration,
}

impl Deadline {
    fn starting_now(max_silence: Duration) -> Self {
        Self {
            last_seen: Instant::now(),
            max_silence,
        }
    }

    fn overdue(&self) -> bool {
        self.last_seen.elapsed() > self.max_silence
    }
}

/// Tracks heartbeats from registered bridge activities.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use roastlink_kernel::watchdog::Watchdog;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut watchdog = Watchdog::default();
/// watchdog.register("telemetry", Duration::from_secs(10));
/// watchdog.heartbeat("telemetry");
/// assert!(watchdog.check_all().is_empty());
/// # }
/// ```
#[derive(Default)]
pub struct Watchdog {
    deadlines: BTreeMap<String, Deadline>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `component`; it is stale once silent for longer than
    /// `max_silence`.  Registering again restarts the deadline.
    pub fn register(&mut self, component: &str, max_silence: Duration) {
        self.deadlines
            .insert(component.to_owned(), Deadline::starting_now(max_silence));
    }

    /// Unregistered components are ignored.
    pub fn heartbeat(&mut self, component: &str) {
        if let Some(deadline) = self.deadlines.get_mut(component) {
            deadline.last_seen = Instant::now();
        }
    }

    /// Time since the last heartbeat of `component`.
    pub fn silence(&self, component: &str) -> Option<Duration> {
        self.deadlines.get(component).map(|d| d.last_seen.elapsed())
    }

    /// Every component past its deadline, in name order.
    pub fn check_all(&self) -> Vec<String> {
        self.deadlines
            .iter()
            .filter_map(|(name, deadline)| deadline.overdue().then(|| name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn fresh_component_is_not_overdue() {
        let mut watchdog = Watchdog::new();
        watchdog.register("telemetry", Duration::from_secs(5));
        assert!(watchdog.check_all().is_empty());
        assert_eq!(watchdog.silence("telemetry"), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_resets_deadline() {
        let mut watchdog = Watchdog::new();
        watchdog.register("serial", Duration::from_secs(2));
        advance(Duration::from_secs(1)).await;
        watchdog.heartbeat("serial");
        advance(Duration::from_secs(2)).await;
        assert!(watchdog.check_all().is_empty());
        assert_eq!(watchdog.silence("serial"), Some(Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_components_are_listed_in_name_order() {
        let mut watchdog = Watchdog::new();
        watchdog.register("telemetry", Duration::from_secs(2));
        watchdog.register("serial", Duration::from_secs(2));
        watchdog.register("slow", Duration::from_secs(60));
        advance(Duration::from_secs(3)).await;
        assert_eq!(watchdog.check_all(), vec!["serial", "telemetry"]);
        assert_eq!(watchdog.silence("telemetry"), Some(Duration::from_secs(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn reregister_restarts_deadline() {
        let mut watchdog = Watchdog::new();
        watchdog.register("serial", Duration::from_secs(2));
        advance(Duration::from_secs(3)).await;
        assert_eq!(watchdog.check_all(), vec!["serial"]);
        watchdog.register("serial", Duration::from_secs(2));
        assert!(watchdog.check_all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_component_is_ignored() {
        let mut watchdog = Watchdog::new();
        watchdog.heartbeat("ghost");
        assert!(watchdog.check_all().is_empty());
        assert_eq!(watchdog.silence("ghost"), None);
    }
}
