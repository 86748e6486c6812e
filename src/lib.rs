//! Sensor Exporter Library
//!
//! Polls hardware sensors and publishes their readings as Prometheus gauges.
//!
//! # Sources
//!
//! - **lm-sensors**: fan, voltage, power and temperature features of every
//!   detected chip, read through a [`lmsensors::SensorBackend`]
//!   ([`collectors::HwmonBackend`] on Linux).
//! - **hddtemp**: disk temperatures reported by an hddtemp daemon over TCP.
//!
//! Both pollers write into a [`MetricSink`]. [`SensorStore`] is the sink used
//! by the exporter; it is also a Prometheus collector, so registering it once
//! exposes every published reading.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use prometheus::Registry;
//! use sensor_exporter::{HddTempPoller, PollerStats, SensorStore, TcpDialer};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::new();
//! let store = SensorStore::new()?;
//! store.register(&registry)?;
//!
//! let stats = Arc::new(PollerStats::new("hddtemp"));
//! let poller = HddTempPoller::new(
//!     TcpDialer::default(),
//!     "localhost:7634",
//!     Arc::new(store.clone()),
//!     stats,
//! );
//! tokio::spawn(poller.run());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

pub mod collectors;
pub mod hddtemp;
pub mod lmsensors;
pub mod poller_stats;
pub mod sink;

/// Time between the starts of two consecutive poll cycles.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub use collectors::HwmonBackend;
pub use hddtemp::{HddTempError, HddTempPoller, HddTempRecord, TcpDialer};
pub use lmsensors::{FatalError, LmSensorsPoller, SensorBackend};
pub use poller_stats::{CycleSummary, PollerState, PollerStats};
pub use sink::{MetricFamily, MetricSink, SensorStore};
