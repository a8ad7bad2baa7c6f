//! `roastlink` – MQTT to serial telemetry bridge for coffee roasters.
//!
//! Subscribes to `roaster/<deviceId>/telemetry` and writes the freshest bean
//! and environment temperatures to a serial port once per second, as
//! `"<beanTemp>,<envTemp>\n"`, for roasting software that expects a
//! thermocouple logger.
//!
//! Configuration is layered: defaults, then `~/.roastlink/config.toml` (or
//! `--config`), then `ROASTLINK_*` environment variables, then flags.
//!
//! Ctrl-C or SIGTERM stops the bridge and exits with status 0.  A startup
//! failure (bad configuration, unopenable serial port) exits with status 1.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use roastlink_middleware::{Bridge, BridgeConfig};
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "roastlink", version, about = "MQTT to serial telemetry bridge")]
struct Args {
    /// MQTT broker host
    #[arg(short = 'H', long = "mqtt-host")]
    mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(short = 'p', long = "mqtt-port")]
    mqtt_port: Option<u16>,

    /// Roaster device id
    #[arg(short = 'd', long = "device-id")]
    device_id: Option<String>,

    /// Serial port to write to
    #[arg(short = 's', long = "serial-port")]
    serial_port: Option<String>,

    /// Serial baud rate
    #[arg(short = 'b', long = "baud-rate")]
    baud_rate: Option<u32>,

    /// Milliseconds between serial writes
    #[arg(long = "tick-ms")]
    tick_ms: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    debug: bool,

    /// Config file (default: ~/.roastlink/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn apply(&self, cfg: &mut config::Config) {
        if let Some(host) = &self.mqtt_host {
            cfg.broker_host.clone_from(host);
        }
        if let Some(port) = self.mqtt_port {
            cfg.broker_port = port;
        }
        if let Some(id) = &self.device_id {
            cfg.device_id.clone_from(id);
        }
        if let Some(path) = &self.serial_port {
            cfg.serial_port.clone_from(path);
        }
        if let Some(baud) = self.baud_rate {
            cfg.baud_rate = baud;
        }
        if let Some(ms) = self.tick_ms {
            cfg.tick_ms = ms;
        }
    }
}

fn resolve_config(args: &Args) -> Result<BridgeConfig, String> {
    let path = args.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = config::load_from(&path)?;
    config::apply_env_overrides(&mut cfg);
    args.apply(&mut cfg);
    Ok(cfg.into_bridge_config())
}

fn init_logging(debug: bool) {
    // RUST_LOG wins; --debug only changes the fallback.
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if std::env::var("ROASTLINK_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);
    print_banner();

    let cfg = match resolve_config(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        broker = %format!("{}:{}", cfg.broker_host, cfg.broker_port),
        device_id = %cfg.device_id,
        serial_port = %cfg.serial_port,
        "MQTT to serial bridge"
    );

    let bridge = match Bridge::new(cfg) {
        Ok(bridge) => bridge,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    // ── Ctrl-C / SIGTERM ──────────────────────────────────────────────────
    // notify_one stores a permit, so a signal that lands before the bridge
    // starts waiting is not lost.
    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Signal received – stopping bridge …".yellow().bold());
        signal.notify_one();
    }) {
        warn!(
            error = %e,
            "Failed to install signal handler; stop the bridge by killing the process"
        );
    }

    match bridge.run_until(async move { shutdown.notified().await }).await {
        Ok(()) => {
            println!("{}", "  ✓ Bridge stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Bridge failed to start");
            ExitCode::FAILURE
        }
    }
}

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "roastlink".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  MQTT → serial telemetry bridge");
    println!();
}
