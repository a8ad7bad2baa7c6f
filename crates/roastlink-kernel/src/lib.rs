//! `roastlink-kernel` – Health regulation for the bridge
//!
//! It does not move telemetry; it watches the activities that do.
//!
//! # Modules
//!
//! - [`stats`] – [`BridgeStats`][stats::BridgeStats]: lock-free counters the
//!   listener and the serial writer bump as they work.
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]: heartbeat deadlines per
//!   component.
//! - [`health`] – [`HealthReporter`][health::HealthReporter]: samples the
//!   counters at a fixed interval and logs components that went quiet.

pub mod health;
pub mod stats;
pub mod watchdog;

pub use health::{HealthReport, HealthReporter};
pub use stats::{BridgeStats, StatsSnapshot};
pub use watchdog::Watchdog;
