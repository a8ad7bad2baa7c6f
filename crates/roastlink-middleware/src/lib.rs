//! `roastlink-middleware` – moves telemetry from the broker to the serial line.
//!
//! Two independent activities share one [`LatestValueCache`]:
//!
//! - [`listener`] – keeps a subscription to `roaster/<deviceId>/telemetry`
//!   alive across disconnects and writes every decoded record to the cache.
//! - [`serial`] – once per tick, copies the cached record out and writes
//!   `"<beanTemp>,<envTemp>\n"` to the serial port.
//!
//! [`bridge`] wires them together; [`broker`] is the seam between the
//! listener and the MQTT client.

pub mod bridge;
pub mod broker;
pub mod cache;
pub mod listener;
pub mod serial;

#[cfg(test)]
mod testing;

pub use bridge::{Bridge, BridgeConfig};
pub use broker::{BrokerEvent, BrokerSession, MqttSession};
pub use cache::LatestValueCache;
pub use listener::{ListenerState, TelemetryListener};
pub use serial::{SerialWriter, TickOutcome, open_serial_sink};
