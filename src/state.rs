//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers. The pollers hold their own handles to the store and to
//! their statistics.

use prometheus::Registry;
use sensor_exporter::{PollerStats, SensorStore};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::telemetry::ExporterMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub store: SensorStore,
    pub telemetry: ExporterMetrics,
    /// Statistics of every enabled poller, in start order.
    pub pollers: Vec<Arc<PollerStats>>,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
