//! [`TelemetryListener`] – keeps one live subscription and turns inbound
//! telemetry into cache updates.
//!
//! # State machine
//!
//! ```text
//!            ConnAck + subscribe ok
//!  Connecting ─────────────────────▶ Connected
//!      ▲                                 │
//!      └──── error: log, wait delay ─────┘
//! ```
//!
//! Any error, in either state, is logged and followed by one fixed
//! reconnect delay before the next poll.  Attempts are unbounded.  The
//! subscription is issued again after every `ConnAck`: a clean-session broker
//! forgets it across reconnects.
//!
//! Publishes on the subscribed topic are decoded and written to the
//! [`LatestValueCache`].  A payload that fails to decode is logged and
//! dropped; the cache keeps its previous value.  Publishes on any other topic
//! are ignored.

use std::sync::Arc;
use std::time::Duration;

use roastlink_kernel::BridgeStats;
use roastlink_types::{BridgeError, TelemetryRecord};
use tracing::{debug, error, info};

use crate::broker::{BrokerEvent, BrokerSession};
use crate::cache::LatestValueCache;

/// Fixed wait between a connection error and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Connecting,
    Connected,
}

pub struct TelemetryListener<S> {
    session: S,
    topic: String,
    cache: LatestValueCache,
    stats: Arc<BridgeStats>,
    reconnect_delay: Duration,
    state: ListenerState,
}

impl<S: BrokerSession> TelemetryListener<S> {
    pub fn new(
        session: S,
        topic: impl Into<String>,
        cache: LatestValueCache,
        stats: Arc<BridgeStats>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            session,
            topic: topic.into(),
            cache,
            stats,
            reconnect_delay,
            state: ListenerState::Connecting,
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Process events until the task is dropped.
    pub async fn run(&mut self) {
        loop {
            self.step().await;
        }
    }

    /// Wait for and handle exactly one broker event.
    pub async fn step(&mut self) -> ListenerState {
        match self.session.next_event().await {
            Ok(BrokerEvent::ConnAck) => {
                info!("MQTT connected successfully");
                match self.session.subscribe(&self.topic).await {
                    Ok(()) => {
                        info!(topic = %self.topic, "Subscribed");
                        self.state = ListenerState::Connected;
                    }
                    Err(e) => self.back_off(e).await,
                }
            }
            Ok(BrokerEvent::SubAck) => {
                debug!(topic = %self.topic, "subscription acknowledged");
            }
            Ok(BrokerEvent::Publish { topic, payload }) => {
                self.handle_publish(&topic, &payload);
            }
            Ok(BrokerEvent::Other) => {}
            Err(e) => self.back_off(e).await,
        }
        self.state
    }

    fn handle_publish(&self, topic: &str, payload: &[u8]) {
        debug!(topic = %topic, payload = %String::from_utf8_lossy(payload), "MQTT RX");

        if topic != self.topic {
            self.stats.record_ignored_publish();
            return;
        }

        match decode_telemetry(payload) {
            Ok(record) => {
                let captured_at = record.captured_at().map(|t| t.to_rfc3339());
                info!(
                    captured_at = captured_at.as_deref().unwrap_or("unknown"),
                    "Telemetry: BT={:.1}°C, ET={:.1}°C",
                    record.bean_temp,
                    record.env_temp
                );
                self.cache.set(record);
                self.stats.record_decoded();
            }
            Err(e) => {
                error!(topic = %topic, error = %e, "Failed to parse telemetry");
                self.stats.record_decode_failure();
            }
        }
    }

    // The sleep holds no lock; the serial writer keeps ticking throughout.
    async fn back_off(&mut self, e: BridgeError) {
        error!(error = %e, retry_in = ?self.reconnect_delay, "MQTT error");
        self.stats.record_broker_error();
        self.state = ListenerState::Connecting;
        tokio::time::sleep(self.reconnect_delay).await;
    }
}

fn decode_telemetry(payload: &[u8]) -> Result<TelemetryRecord, BridgeError> {
    Ok(TelemetryRecord::decode(payload)?)
}
