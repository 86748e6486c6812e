//! Periodic lm-sensors polling.
//!
//! Sysfs reads block, so each cycle runs on tokio's blocking pool while the
//! loop itself lives on the async runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::classifier::classify;
use super::{FatalError, SensorBackend, SensorSession};
use crate::poller_stats::{CycleSummary, PollerStats};
use crate::sink::MetricSink;
use crate::POLL_INTERVAL;

/// Publishes every classified feature of every detected chip.
pub struct LmSensorsPoller<B: SensorBackend> {
    session: SensorSession<B>,
    sink: Arc<dyn MetricSink>,
    stats: Arc<PollerStats>,
}

impl<B: SensorBackend> LmSensorsPoller<B> {
    /// Initializes the backend. An error here means the poller cannot run at
    /// all and should not be retried.
    pub fn start(
        backend: B,
        sink: Arc<dyn MetricSink>,
        stats: Arc<PollerStats>,
    ) -> Result<Self, FatalError> {
        let session = SensorSession::open(backend)?;
        Ok(Self {
            session,
            sink,
            stats,
        })
    }

    /// Walks all chips once. A feature that cannot be read is logged and
    /// skipped; the rest of the cycle continues.
    pub fn poll_once(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        for chip in self.session.chips() {
            for feature in &chip.features {
                let Some(family) = classify(&feature.name) else {
                    summary.ignored += 1;
                    continue;
                };

                let value = match feature.value() {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(
                            chip = %chip.identity,
                            feature = %feature.name,
                            "Skipping unreadable feature: {}", e
                        );
                        summary.skipped += 1;
                        continue;
                    }
                };

                let labels = [
                    feature.label.as_str(),
                    chip.identity.as_str(),
                    chip.adapter.as_str(),
                ];
                match self.sink.set(family, &labels, value) {
                    Ok(()) => summary.published += 1,
                    Err(e) => {
                        warn!("Failed to publish {} of {}: {}", feature.name, chip.identity, e);
                        summary.skipped += 1;
                    }
                }
            }
        }

        debug!(
            "lm-sensors cycle published {} readings, skipped {}, ignored {}",
            summary.published, summary.skipped, summary.ignored
        );
        summary
    }

    /// Runs one cycle and records its outcome.
    pub fn cycle(&self) {
        let start = Instant::now();
        if let Err(e) = self.session.check_source() {
            warn!("lm-sensors source is unreadable: {}", e);
            self.stats.record_failure(start.elapsed(), &e);
            return;
        }
        let summary = self.poll_once();
        self.stats.record_success(start.elapsed(), &summary);
    }
}

impl<B: SensorBackend + 'static> LmSensorsPoller<B> {
    /// Polls forever at the fixed interval, one cycle at a time.
    pub async fn run(self) {
        info!("Starting lm-sensors poller (interval {:?})", POLL_INTERVAL);
        let poller = Arc::new(self);
        let mut ticker = interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let worker = Arc::clone(&poller);
            if let Err(e) = tokio::task::spawn_blocking(move || worker.cycle()).await {
                error!("lm-sensors poll cycle aborted: {}", e);
                poller.stats.record_failure(Duration::ZERO, &e);
            }
        }
    }
}
