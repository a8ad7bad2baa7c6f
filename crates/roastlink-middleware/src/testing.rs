//! In-process doubles for the broker and the serial port.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use roastlink_types::{BridgeError, TelemetryRecord};
use tokio::io::AsyncWrite;

use crate::broker::{BrokerEvent, BrokerSession};

pub const DEVICE_ID: &str = "esp32_roaster_01";
pub const TOPIC: &str = "roaster/esp32_roaster_01/telemetry";

pub fn record(bean_temp: f64, env_temp: f64) -> TelemetryRecord {
    TelemetryRecord {
        timestamp: 1000,
        bean_temp,
        env_temp,
        rate_of_rise: 0.0,
        heater_pwm: 10,
        fan_pwm: 150,
        setpoint: 200.0,
        control_mode: 1,
        heater_enable: 1,
        uptime: 5,
    }
}

pub fn payload(bean_temp: f64, env_temp: f64) -> Vec<u8> {
    format!(
        r#"{{"timestamp":1000,"beanTemp":{bean_temp},"envTemp":{env_temp},"rateOfRise":0,"heaterPWM":10,"fanPWM":150,"setpoint":200,"controlMode":1,"heaterEnable":1,"uptime":5}}"#
    )
    .into_bytes()
}

pub fn publish(topic: &str, payload: Vec<u8>) -> Result<BrokerEvent, BridgeError> {
    Ok(BrokerEvent::Publish {
        topic: topic.to_string(),
        payload,
    })
}

pub fn disconnect() -> Result<BrokerEvent, BridgeError> {
    Err(BridgeError::Broker("connection reset by peer".to_string()))
}

/// Replays a fixed list of events, then waits forever.
pub struct ScriptedSession {
    events: VecDeque<Result<BrokerEvent, BridgeError>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    fail_subscribe: usize,
}

impl ScriptedSession {
    pub fn new(events: Vec<Result<BrokerEvent, BridgeError>>) -> Self {
        Self {
            events: events.into(),
            subscriptions: Arc::default(),
            fail_subscribe: 0,
        }
    }

    /// Make the first `n` subscribe calls fail.
    pub fn failing_subscribe(mut self, n: usize) -> Self {
        self.fail_subscribe = n;
        self
    }

    /// Topics successfully subscribed so far, shared with the session.
    pub fn subscriptions(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.subscriptions)
    }
}

#[async_trait]
impl BrokerSession for ScriptedSession {
    async fn subscribe(&mut self, topic: &str) -> Result<(), BridgeError> {
        if self.fail_subscribe > 0 {
            self.fail_subscribe -= 1;
            return Err(BridgeError::Broker("subscribe rejected".to_string()));
        }
        self.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    async fn next_event(&mut self) -> Result<BrokerEvent, BridgeError> {
        match self.events.pop_front() {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }
}

/// How a [`RecordingSink`] responds to writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    Accept,
    Fail,
    Stall,
}

/// Serial port double that appends every accepted write to a shared buffer.
#[derive(Clone)]
pub struct RecordingSink {
    written: Arc<Mutex<Vec<u8>>>,
    mode: Arc<Mutex<SinkMode>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            written: Arc::default(),
            mode: Arc::new(Mutex::new(SinkMode::Accept)),
        }
    }

    pub fn set_mode(&self, mode: SinkMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.bytes())
            .unwrap()
            .split_inclusive('\n')
            .map(str::to_string)
            .collect()
    }

    fn mode(&self) -> SinkMode {
        *self.mode.lock().unwrap()
    }
}

impl AsyncWrite for RecordingSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.mode() {
            SinkMode::Accept => {
                self.written.lock().unwrap().extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
            SinkMode::Fail => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device unplugged",
            ))),
            SinkMode::Stall => Poll::Pending,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
