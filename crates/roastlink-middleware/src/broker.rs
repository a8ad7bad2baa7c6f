//! Broker session seam.
//!
//! The listener never talks to `rumqttc` directly.  It drives a
//! [`BrokerSession`], which yields [`BrokerEvent`]s and accepts subscription
//! requests.  [`MqttSession`] is the production implementation; tests swap in
//! a scripted session.

use std::time::Duration;

use async_trait::async_trait;
use roastlink_types::BridgeError;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};

/// Client-side view of one broker event.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    /// The broker accepted the connection.
    ConnAck,
    /// The broker accepted a subscription.
    SubAck,
    /// An application message arrived.
    Publish { topic: String, payload: Vec<u8> },
    /// Any other protocol traffic (pings, outgoing packets, …).
    Other,
}

/// Every broker client the listener can drive must implement this trait.
///
/// # Contract
///
/// * `next_event` – waits for the next event.  An `Err` means the
///   connection is down; the next call after an error starts a fresh
///   connection attempt.
///
/// * `subscribe` – queues an at-most-once subscription to `topic`.
#[async_trait]
pub trait BrokerSession: Send {
    async fn subscribe(&mut self, topic: &str) -> Result<(), BridgeError>;

    async fn next_event(&mut self) -> Result<BrokerEvent, BridgeError>;
}

/// [`BrokerSession`] backed by an MQTT 3.1.1 client.
///
/// Construction does not touch the network: `rumqttc` connects on the first
/// poll of its event loop and reconnects on the first poll after an error.
pub struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl MqttSession {
    /// Build a clean-session client.  `request_capacity` bounds the queue of
    /// outgoing requests (subscribe, ping, …) between the client handle and
    /// the event loop.
    pub fn new(
        client_id: &str,
        host: &str,
        port: u16,
        keep_alive: Duration,
        request_capacity: usize,
    ) -> Self {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(keep_alive);
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, request_capacity);

        Self { client, eventloop }
    }
}

#[async_trait]
impl BrokerSession for MqttSession {
    async fn subscribe(&mut self, topic: &str) -> Result<(), BridgeError> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| BridgeError::Broker(format!("subscribe to {topic}: {e}")))
    }

    async fn next_event(&mut self) -> Result<BrokerEvent, BridgeError> {
        let event = self
            .eventloop
            .poll()
            .await
            .map_err(|e| BridgeError::Broker(e.to_string()))?;

        Ok(match event {
            Event::Incoming(Packet::ConnAck(_)) => BrokerEvent::ConnAck,
            Event::Incoming(Packet::SubAck(_)) => BrokerEvent::SubAck,
            Event::Incoming(Packet::Publish(publish)) => BrokerEvent::Publish {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            },
            _ => BrokerEvent::Other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_is_queued_before_any_connection() {
        let mut session = MqttSession::new(
            "mqtt-bridge-test",
            "broker.invalid",
            1883,
            Duration::from_secs(30),
            10,
        );
        // The request waits in the client queue until the event loop connects.
        session
            .subscribe("roaster/esp32_roaster_01/telemetry")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unreachable_broker_surfaces_as_broker_error() {
        // Port 1 on localhost is never an MQTT broker.
        let mut session = MqttSession::new(
            "mqtt-bridge-test",
            "127.0.0.1",
            1,
            Duration::from_secs(30),
            10,
        );
        let err = session.next_event().await.unwrap_err();
        assert!(matches!(err, BridgeError::Broker(_)), "got {err:?}");
    }
}
