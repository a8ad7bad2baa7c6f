//! Configuration file – reads `~/.roastlink/config.toml`.
//!
//! Every key is optional; missing keys fall back to the bridge defaults.
//!
//! ```toml
//! broker_host = "192.168.1.20"
//! device_id   = "esp32_roaster_02"
//! serial_port = "/dev/ttyUSB0"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use roastlink_middleware::BridgeConfig;
use serde::Deserialize;

/// Persisted settings.  Durations are stored as whole milliseconds or
/// seconds to keep the file hand-editable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default = "default_broker_host")]
    pub broker_host: String,

    #[serde(default = "default_broker_port")]
    pub broker_port: u16,

    /// Roaster identity; selects the topic `roaster/<device_id>/telemetry`.
    #[serde(default = "default_device_id")]
    pub device_id: String,

    #[serde(default = "default_serial_port")]
    pub serial_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,

    /// MQTT keep-alive; `0` disables it.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// `0` disables the periodic health report.
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,

    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn defaults() -> BridgeConfig {
    BridgeConfig::default()
}
fn default_broker_host() -> String {
    defaults().broker_host
}
fn default_broker_port() -> u16 {
    defaults().broker_port
}
fn default_device_id() -> String {
    defaults().device_id
}
fn default_serial_port() -> String {
    defaults().serial_port
}
fn default_baud_rate() -> u32 {
    defaults().baud_rate
}
fn default_tick_ms() -> u64 {
    defaults().tick_period.as_millis() as u64
}
fn default_reconnect_secs() -> u64 {
    defaults().reconnect_delay.as_secs()
}
fn default_keep_alive_secs() -> u64 {
    defaults().keep_alive.as_secs()
}
fn default_write_timeout_ms() -> u64 {
    defaults().serial_write_timeout.as_millis() as u64
}
fn default_health_interval_secs() -> u64 {
    defaults().health_interval.map_or(0, |d| d.as_secs())
}
fn default_stale_after_secs() -> u64 {
    defaults().stale_after.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker_host: default_broker_host(),
            broker_port: default_broker_port(),
            device_id: default_device_id(),
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
            tick_ms: default_tick_ms(),
            reconnect_secs: default_reconnect_secs(),
            keep_alive_secs: default_keep_alive_secs(),
            write_timeout_ms: default_write_timeout_ms(),
            health_interval_secs: default_health_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl Config {
    /// Convert into the value the bridge runs with.  Validation happens in
    /// the bridge.
    pub fn into_bridge_config(self) -> BridgeConfig {
        BridgeConfig {
            broker_host: self.broker_host,
            broker_port: self.broker_port,
            device_id: self.device_id,
            serial_port: self.serial_port,
            baud_rate: self.baud_rate,
            tick_period: Duration::from_millis(self.tick_ms),
            reconnect_delay: Duration::from_secs(self.reconnect_secs),
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            serial_write_timeout: Duration::from_millis(self.write_timeout_ms),
            health_interval: (self.health_interval_secs > 0)
                .then(|| Duration::from_secs(self.health_interval_secs)),
            stale_after: Duration::from_secs(self.stale_after_secs),
            ..BridgeConfig::default()
        }
    }
}

/// Return the path to `~/.roastlink/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".roastlink").join("config.toml")
}

/// Load the config from `path`.  A missing file yields the defaults.
pub fn load_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    toml::from_str(&raw).map_err(|e| format!("Failed to parse config at {}: {}", path.display(), e))
}

/// Apply `ROASTLINK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROASTLINK_BROKER_HOST` | `broker_host` |
/// | `ROASTLINK_BROKER_PORT` | `broker_port` |
/// | `ROASTLINK_DEVICE_ID` | `device_id` |
/// | `ROASTLINK_SERIAL_PORT` | `serial_port` |
/// | `ROASTLINK_BAUD_RATE` | `baud_rate` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides_from<F>(cfg: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("ROASTLINK_BROKER_HOST") {
        cfg.broker_host = v;
    }
    if let Some(v) = lookup("ROASTLINK_BROKER_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.broker_port = port;
    }
    if let Some(v) = lookup("ROASTLINK_DEVICE_ID") {
        cfg.device_id = v;
    }
    if let Some(v) = lookup("ROASTLINK_SERIAL_PORT") {
        cfg.serial_port = v;
    }
    if let Some(v) = lookup("ROASTLINK_BAUD_RATE")
        && let Ok(baud) = v.parse::<u32>()
    {
        cfg.baud_rate = baud;
    }
}
