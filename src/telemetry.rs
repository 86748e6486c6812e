//! The exporter's own `sensor_exporter_*` metrics.
//!
//! Values are copied from each poller's [`PollerStats`] when `/metrics` is
//! served, so they always match what `/health` reports.

use prometheus::{CounterVec, Gauge, GaugeVec, Opts, Registry};
use sensor_exporter::{PollerState, PollerStats};

/// Self-metrics registered next to the sensor families.
#[derive(Clone)]
pub struct ExporterMetrics {
    pub poll_cycles_total: CounterVec,   // labels: poller
    pub poll_failures_total: CounterVec, // labels: poller
    pub poll_duration_seconds: GaugeVec, // labels: poller
    pub poll_up: GaugeVec,               // labels: poller
    pub scrape_duration_seconds: Gauge,
}

impl ExporterMetrics {
    /// Creates and registers all self-metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        let poll_cycles_total = CounterVec::new(
            Opts::new(
                "sensor_exporter_poll_cycles_total",
                "Poll cycles run, successful or not",
            ),
            &["poller"],
        )?;
        let poll_failures_total = CounterVec::new(
            Opts::new(
                "sensor_exporter_poll_failures_total",
                "Poll cycles that published nothing",
            ),
            &["poller"],
        )?;
        let poll_duration_seconds = GaugeVec::new(
            Opts::new(
                "sensor_exporter_poll_duration_seconds",
                "Duration of the last poll cycle",
            ),
            &["poller"],
        )?;
        let poll_up = GaugeVec::new(
            Opts::new(
                "sensor_exporter_poll_up",
                "1 if the last poll cycle succeeded",
            ),
            &["poller"],
        )?;
        let scrape_duration_seconds = Gauge::new(
            "sensor_exporter_scrape_duration_seconds",
            "Time spent rendering the last scrape",
        )?;

        registry.register(Box::new(poll_cycles_total.clone()))?;
        registry.register(Box::new(poll_failures_total.clone()))?;
        registry.register(Box::new(poll_duration_seconds.clone()))?;
        registry.register(Box::new(poll_up.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;

        Ok(Self {
            poll_cycles_total,
            poll_failures_total,
            poll_duration_seconds,
            poll_up,
            scrape_duration_seconds,
        })
    }

    /// Copies the current poller statistics into the metrics.
    pub fn observe(&self, pollers: &[std::sync::Arc<PollerStats>]) {
        for stats in pollers {
            let snap = stats.snapshot();
            let labels = [stats.name()];

            // Counters carry absolute values: reset, then add the total.
            let cycles = self.poll_cycles_total.with_label_values(&labels);
            cycles.reset();
            cycles.inc_by(snap.cycles as f64);

            let failures = self.poll_failures_total.with_label_values(&labels);
            failures.reset();
            failures.inc_by(snap.failures as f64);

            self.poll_duration_seconds
                .with_label_values(&labels)
                .set(snap.duration_last_seconds);

            let up = if snap.state == PollerState::Up { 1.0 } else { 0.0 };
            self.poll_up.with_label_values(&labels).set(up);
        }
    }
}
