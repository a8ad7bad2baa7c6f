//! [`Bridge`] – the supervisor that owns the cache and both activities.
//!
//! Startup order:
//!
//! 1. Validate the [`BridgeConfig`] and build the broker session
//!    ([`Bridge::new`]).  No network traffic happens yet.
//! 2. Open the serial sink.  Failure here is fatal and returned to the caller;
//!    the bridge never retries it.
//! 3. Spawn the [`SerialWriter`] (and, when configured, the
//!    [`HealthReporter`]) as independent tasks.
//! 4. Run the [`TelemetryListener`] in the foreground for the rest of the
//!    bridge's life.
//!
//! Stopping is a hard stop: dropping the future returned by
//! [`Bridge::start`] drops its [`JoinSet`], which aborts every spawned task.
//! Nothing needs flushing; the cache is volatile.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use roastlink_kernel::BridgeStats;
use roastlink_kernel::HealthReporter;
use roastlink_kernel::health::{DEFAULT_HEALTH_INTERVAL, DEFAULT_STALE_AFTER};
use roastlink_types::{BridgeError, client_id, telemetry_topic};
use tokio::io::AsyncWrite;
use tokio::task::JoinSet;
use tokio_serial::SerialStream;
use tracing::info;

use crate::broker::{BrokerSession, MqttSession};
use crate::cache::LatestValueCache;
use crate::listener::{DEFAULT_RECONNECT_DELAY, TelemetryListener};
use crate::serial::{
    DEFAULT_BAUD_RATE, DEFAULT_TICK_PERIOD, DEFAULT_WRITE_TIMEOUT, SerialWriter, open_serial_sink,
};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the bridge needs to run.  There are no process-wide defaults
/// beyond [`BridgeConfig::default`].
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub broker_host: String,
    pub broker_port: u16,
    /// Used to derive both the topic and the broker client id.
    pub device_id: String,
    pub serial_port: String,
    pub baud_rate: u32,
    pub tick_period: Duration,
    pub reconnect_delay: Duration,
    /// MQTT keep-alive; zero disables it, otherwise at least one second.
    pub keep_alive: Duration,
    pub serial_write_timeout: Duration,
    /// Depth of the MQTT client's outgoing request queue.
    pub request_capacity: usize,
    /// `None` disables the health reporter.
    pub health_interval: Option<Duration>,
    pub stale_after: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            device_id: "esp32_roaster_01".to_string(),
            serial_port: "/tmp/ttyV0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            tick_period: DEFAULT_TICK_PERIOD,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            keep_alive: Duration::from_secs(30),
            serial_write_timeout: DEFAULT_WRITE_TIMEOUT,
            request_capacity: 10,
            health_interval: Some(DEFAULT_HEALTH_INTERVAL),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

impl BridgeConfig {
    /// `roaster/<deviceId>/telemetry`
    pub fn topic(&self) -> String {
        telemetry_topic(&self.device_id)
    }

    /// `mqtt-bridge-<deviceId>`
    pub fn client_id(&self) -> String {
        client_id(&self.device_id)
    }

    /// Reject configurations the bridge cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.broker_host.trim().is_empty() {
            return Err(BridgeError::Config("broker host must not be empty".into()));
        }
        if self.broker_port == 0 {
            return Err(BridgeError::Config("broker port must not be 0".into()));
        }
        if self.device_id.is_empty() {
            return Err(BridgeError::Config("device id must not be empty".into()));
        }
        if self.device_id.contains(['+', '#', '/']) {
            return Err(BridgeError::Config(format!(
                "device id '{}' must not contain '+', '#' or '/'",
                self.device_id
            )));
        }
        if self.serial_port.is_empty() {
            return Err(BridgeError::Config("serial port must not be empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(BridgeError::Config("baud rate must not be 0".into()));
        }
        if self.tick_period.is_zero() {
            return Err(BridgeError::Config("tick period must be positive".into()));
        }
        if self.reconnect_delay.is_zero() {
            return Err(BridgeError::Config("reconnect delay must be positive".into()));
        }
        if self.serial_write_timeout.is_zero() {
            return Err(BridgeError::Config("serial write timeout must be positive".into()));
        }
        if !self.keep_alive.is_zero() && self.keep_alive < Duration::from_secs(1) {
            return Err(BridgeError::Config(
                "keep-alive must be 0 or at least one second".into(),
            ));
        }
        if self.request_capacity == 0 {
            return Err(BridgeError::Config("request capacity must be positive".into()));
        }
        if self.health_interval.is_some_and(|i| i.is_zero()) {
            return Err(BridgeError::Config("health interval must be positive".into()));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Supervisor
// ─────────────────────────────────────────────────────────────────────────────

type SinkOpener<W> = Box<dyn FnOnce(&BridgeConfig) -> Result<W, BridgeError> + Send>;

/// Owns the [`LatestValueCache`] and the lifetimes of the listener and the
/// serial writer.
pub struct Bridge<S, W> {
    config: BridgeConfig,
    session: S,
    open_sink: SinkOpener<W>,
    cache: LatestValueCache,
    stats: Arc<BridgeStats>,
}

impl Bridge<MqttSession, SerialStream> {
    /// Build a bridge that talks MQTT to `config.broker_host` and writes to
    /// the serial device at `config.serial_port`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when `config` does not validate.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let session = MqttSession::new(
            &config.client_id(),
            &config.broker_host,
            config.broker_port,
            config.keep_alive,
            config.request_capacity,
        );
        Ok(Self::assemble(
            config,
            session,
            Box::new(|c: &BridgeConfig| open_serial_sink(&c.serial_port, c.baud_rate)),
        ))
    }
}

impl<S, W> Bridge<S, W>
where
    S: BrokerSession + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Build a bridge from an already constructed session and sink.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when `config` does not validate.
    pub fn with_parts(config: BridgeConfig, session: S, sink: W) -> Result<Self, BridgeError> {
        config.validate()?;
        let open_sink: SinkOpener<W> = Box::new(move |_: &BridgeConfig| Ok(sink));
        Ok(Self::assemble(config, session, open_sink))
    }

    fn assemble(config: BridgeConfig, session: S, open_sink: SinkOpener<W>) -> Self {
        Self {
            config,
            session,
            open_sink,
            cache: LatestValueCache::new(),
            stats: Arc::new(BridgeStats::new()),
        }
    }

    /// Handle to the shared cache.
    pub fn cache(&self) -> LatestValueCache {
        self.cache.clone()
    }

    pub fn stats(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.stats)
    }

    /// Open the sink, start the writer, then listen until the future is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SerialOpen`] when the serial sink cannot be
    /// opened.  Once running, the future never completes on its own.
    pub async fn start(self) -> Result<(), BridgeError> {
        let Self {
            config,
            session,
            open_sink,
            cache,
            stats,
        } = self;

        info!(
            broker = %format!("{}:{}", config.broker_host, config.broker_port),
            device_id = %config.device_id,
            serial_port = %config.serial_port,
            "Starting bridge"
        );

        let sink = open_sink(&config)?;

        // Dropping the set aborts every task in it.
        let mut tasks = JoinSet::new();
        tasks.spawn(
            SerialWriter::new(sink, cache.clone(), Arc::clone(&stats))
                .with_period(config.tick_period)
                .with_write_timeout(config.serial_write_timeout)
                .run(),
        );
        if let Some(interval) = config.health_interval {
            let reporter = HealthReporter::new(Arc::clone(&stats), interval, config.stale_after);
            tasks.spawn(reporter.run());
        }

        info!("Bridge started successfully");

        let mut listener =
            TelemetryListener::new(session, config.topic(), cache, stats, config.reconnect_delay);
        listener.run().await;
        Ok(())
    }

    /// Run until `shutdown` completes, then stop every activity.
    ///
    /// # Errors
    ///
    /// Same as [`Bridge::start`].
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), BridgeError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.start() => result,
            () = shutdown => {
                info!("Shutdown requested, stopping bridge");
                Ok(())
            }
        }
    }
}
