//! Serial sink and the periodic [`SerialWriter`] task.
//!
//! Every tick the writer copies the freshest record out of the
//! [`LatestValueCache`], releases the lock, then writes
//! `"<beanTemp>,<envTemp>\n"` to the sink.  The same record is written again
//! on every tick until a newer one arrives.  An empty cache means no write.
//!
//! The cadence is a plain sleep between ticks, so the spacing between two
//! writes is the tick period plus the time the previous write took.
//!
//! A failed or timed-out write is logged and the tick is skipped; the next
//! tick tries again with the same sink.

use std::sync::Arc;
use std::time::Duration;

use roastlink_kernel::BridgeStats;
use roastlink_types::BridgeError;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialStream, StopBits};
use tracing::{debug, error, info};

use crate::cache::LatestValueCache;

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1000);
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Open `path` as an 8N1 serial stream with no flow control.
///
/// # Errors
///
/// Returns [`BridgeError::SerialOpen`] when the device cannot be opened.
pub fn open_serial_sink(path: &str, baud_rate: u32) -> Result<SerialStream, BridgeError> {
    let builder = tokio_serial::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(DEFAULT_WRITE_TIMEOUT);

    let stream = SerialStream::open(&builder).map_err(|e| BridgeError::SerialOpen {
        path: path.to_string(),
        details: e.to_string(),
    })?;

    info!(path = %path, baud_rate, "Serial port opened");
    Ok(stream)
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The cache was empty; nothing was written.
    Empty,
    /// This line was written and flushed.
    Written(String),
    /// The write failed; the error was logged.
    Failed,
}

/// Drains the cache to a byte sink once per tick.
pub struct SerialWriter<W> {
    sink: W,
    cache: LatestValueCache,
    stats: Arc<BridgeStats>,
    period: Duration,
    write_timeout: Duration,
}

impl<W> SerialWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(sink: W, cache: LatestValueCache, stats: Arc<BridgeStats>) -> Self {
        Self {
            sink,
            cache,
            stats,
            period: DEFAULT_TICK_PERIOD,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Override the tick period (builder-style).
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Override the per-write deadline (builder-style).
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Tick forever.  There is no exit condition; the owner aborts the task.
    pub async fn run(mut self) {
        loop {
            tokio::time::sleep(self.period).await;
            self.tick().await;
        }
    }

    /// Run one tick immediately.
    pub async fn tick(&mut self) -> TickOutcome {
        let Some(record) = self.cache.get() else {
            self.stats.record_empty_tick();
            return TickOutcome::Empty;
        };

        let line = record.format_for_serial();
        match self.write_line(&line).await {
            Ok(()) => {
                debug!(line = %line.trim_end(), "Sent to serial");
                self.stats.record_line_written();
                TickOutcome::Written(line)
            }
            Err(e) => {
                error!(error = %e, "Serial write error");
                self.stats.record_write_failure();
                TickOutcome::Failed
            }
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), BridgeError> {
        let deadline = self.write_timeout;
        let sink = &mut self.sink;
        let write = async {
            sink.write_all(line.as_bytes()).await?;
            sink.flush().await
        };
        tokio::time::timeout(deadline, write)
            .await
            .map_err(|_| BridgeError::SerialTimeout(deadline))?
            .map_err(|e| BridgeError::SerialWrite(e.to_string()))
    }
}
