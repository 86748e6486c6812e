//! Periodic hddtemp polling.
//!
//! Every cycle dials the daemon, reads one complete report under a deadline,
//! closes the connection and publishes each well-formed record. Failures
//! skip the cycle and leave the previously published values in place.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::parser::parse_response;
use super::transport::{Dialer, Exchange, TcpDialer};
use super::HddTempError;
use crate::poller_stats::{CycleSummary, PollerStats};
use crate::sink::{MetricFamily, MetricSink};
use crate::POLL_INTERVAL;

/// Default deadline for connecting to and reading from the daemon.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Polls one hddtemp daemon and republishes its readings.
pub struct HddTempPoller<D: Dialer = TcpDialer> {
    dialer: D,
    address: String,
    timeout: Duration,
    sink: Arc<dyn MetricSink>,
    stats: Arc<PollerStats>,
}

impl<D: Dialer> HddTempPoller<D> {
    pub fn new(
        dialer: D,
        address: impl Into<String>,
        sink: Arc<dyn MetricSink>,
        stats: Arc<PollerStats>,
    ) -> Self {
        Self {
            dialer,
            address: address.into(),
            timeout: DEFAULT_TIMEOUT,
            sink,
            stats,
        }
    }

    /// Overrides the connect and read deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Runs one exchange with the daemon and publishes the result.
    ///
    /// Connection, read and envelope errors abort the cycle. Bad records are
    /// logged and counted as skipped while their siblings are published.
    #[instrument(skip(self), fields(address = %self.address))]
    pub async fn poll_once(&self) -> Result<CycleSummary, HddTempError> {
        let raw = self.fetch().await?;
        let parsed = parse_response(&raw)?;

        let mut summary = CycleSummary {
            skipped: parsed.errors.len(),
            ..CycleSummary::default()
        };
        for error in &parsed.errors {
            warn!("Skipping hddtemp record: {}", error);
        }

        for record in &parsed.records {
            let labels = [record.device.as_str(), record.id.as_str()];
            match self
                .sink
                .set(MetricFamily::DiskTemperature, &labels, record.temperature)
            {
                Ok(()) => summary.published += 1,
                Err(e) => {
                    warn!("Failed to publish hddtemp reading for {}: {}", record.device, e);
                    summary.skipped += 1;
                }
            }
        }

        debug!(
            "hddtemp cycle published {} readings, skipped {}",
            summary.published, summary.skipped
        );
        Ok(summary)
    }

    /// Dials, drains and closes one connection.
    async fn fetch(&self) -> Result<String, HddTempError> {
        let mut conn = match timeout(self.timeout, self.dialer.connect(&self.address)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(source)) => {
                return Err(HddTempError::Connection {
                    address: self.address.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(HddTempError::Connection {
                    address: self.address.clone(),
                    source: timed_out("connect", self.timeout),
                })
            }
        };

        let raw = match timeout(self.timeout, conn.read_all()).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                self.discard(conn.as_mut()).await;
                return Err(HddTempError::Io(e));
            }
            Err(_) => {
                self.discard(conn.as_mut()).await;
                return Err(HddTempError::Io(timed_out("read", self.timeout)));
            }
        };

        match timeout(self.timeout, conn.close()).await {
            Ok(result) => result.map_err(HddTempError::Io)?,
            Err(_) => return Err(HddTempError::Io(timed_out("close", self.timeout))),
        }
        Ok(raw)
    }

    /// Best-effort close after a failed read; the read error is what gets
    /// reported.
    async fn discard(&self, conn: &mut dyn Exchange) {
        if let Ok(Err(e)) = timeout(self.timeout, conn.close()).await {
            debug!("Ignoring close error after failed read: {}", e);
        }
    }

    /// Runs one cycle and records its outcome.
    pub async fn cycle(&self) {
        let start = Instant::now();
        match self.poll_once().await {
            Ok(summary) => self.stats.record_success(start.elapsed(), &summary),
            Err(e) => {
                warn!("hddtemp poll failed: {}", e);
                self.stats.record_failure(start.elapsed(), &e);
            }
        }
    }

    /// Polls forever at the fixed interval. Cycles never overlap: a slow
    /// exchange delays the next tick instead of stacking up.
    pub async fn run(self) {
        info!(
            "Starting hddtemp poller for {} (interval {:?}, timeout {:?})",
            self.address, POLL_INTERVAL, self.timeout
        );
        let mut ticker = interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.cycle().await;
        }
    }
}

fn timed_out(stage: &str, limit: Duration) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("hddtemp {} did not complete within {:?}", stage, limit),
    )
}
