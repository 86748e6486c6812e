//! Root endpoint handler for the landing page.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let metrics_path = state.config.metrics_path();
    let health_item = if state.config.enable_health.unwrap_or(true) {
        r#"<li><a href="/health">/health</a> - poller status (text)</li>"#
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Sensor Exporter</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }}
        .footer {{ margin-top: 40px; color: #666; font-size: 0.9em; }}
    </style>
</head>
<body>
    <h1>Sensor Exporter</h1>
    <p>Version {version}, up {uptime}</p>
    <ul>
        <li><a href="{metrics_path}">Metrics</a></li>
        {health_item}
    </ul>
    <div class="footer">{footer}</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        metrics_path = metrics_path,
        health_item = health_item,
        footer = FOOTER_TEXT
    );

    Html(html)
}
