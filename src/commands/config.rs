//! Config command implementation.
//!
//! Generates configuration files in various formats.

use anyhow::Context;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> anyhow::Result<()> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("sensor-exporter.yaml"));

    let mut content = render_config(&config, format)
        .map_err(|e| anyhow::anyhow!("failed to render configuration: {e}"))?;
    if commented && matches!(format, ConfigFormat::Yaml | ConfigFormat::Toml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)
            .with_context(|| format!("cannot write {}", output.display()))?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Prepends a commented reference of every option. YAML and TOML share the
/// `#` comment syntax.
fn add_config_comments(body: String) -> String {
    let comments = r#"# Sensor Exporter Configuration
# =============================
#
# Server Configuration
# --------------------
# listen_address: ":9255"      # host:port, ":port" = all interfaces
# metrics_path: "/metrics"     # Path under which metrics are served
#
# hddtemp
# -------
# enable_hddtemp: true         # Poll the hddtemp daemon
# hddtemp_address: "localhost:7634"
# hddtemp_timeout_ms: 2000     # Deadline for connect and read
#
# lm-sensors
# ----------
# enable_lm_sensors: true      # Read hardware monitoring chips
# hwmon_path: "/sys/class/hwmon"
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{body}")
}
