//! Health check endpoint handler.
//!
//! Reports every enabled poller as a plain-text table. The response is 503
//! when any poller is dead or its last cycle failed.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use sensor_exporter::poller_stats::{render_table, PollerSnapshot};
use sensor_exporter::PollerState;
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "sensor-exporter - Support: exporter@herakles.now";

/// Overall status derived from the poller snapshots.
pub fn overall_status(snapshots: &[PollerSnapshot]) -> (StatusCode, String) {
    let unhealthy: Vec<&str> = snapshots
        .iter()
        .filter(|s| matches!(s.state, PollerState::Dead | PollerState::Failing))
        .map(|s| s.name.as_str())
        .collect();

    if unhealthy.is_empty() {
        (StatusCode::OK, "OK".to_string())
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Unhealthy pollers: {}", unhealthy.join(", ")),
        )
    }
}

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let snapshots: Vec<PollerSnapshot> = state.pollers.iter().map(|p| p.snapshot()).collect();
    let (status, message) = overall_status(&snapshots);

    // Calculate uptime
    let uptime_hours = state.start_time.elapsed().as_secs_f64() / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let table = render_table(&snapshots);

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nUptime: {uptime_str}\nSeries held: {}\n\n{table}\n{FOOTER_TEXT}",
            state.store.len()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_exporter::{CycleSummary, PollerStats};
    use std::time::Duration;

    #[test]
    fn test_footer_carries_only_contact() {
        assert!(!FOOTER_TEXT.contains("://"));
        assert!(FOOTER_TEXT.contains("exporter@herakles.now"));
    }

    #[test]
    fn test_starting_pollers_are_healthy() {
        let stats = PollerStats::new("hddtemp");
        let (status, _) = overall_status(&[stats.snapshot()]);
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_failing_poller_is_unavailable() {
        let up = PollerStats::new("lm_sensors");
        up.record_success(Duration::from_millis(1), &CycleSummary::default());
        let down = PollerStats::new("hddtemp");
        down.record_failure(Duration::from_millis(1), &"connection refused");

        let (status, message) = overall_status(&[up.snapshot(), down.snapshot()]);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(message, "Unhealthy pollers: hddtemp");
    }

    #[test]
    fn test_dead_poller_is_unavailable() {
        let dead = PollerStats::new("lm_sensors");
        dead.mark_fatal(&"no hwmon");
        let (status, _) = overall_status(&[dead.snapshot()]);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
