//! Configuration management for sensor-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use sensor_exporter::collectors::DEFAULT_HWMON_PATH;
use sensor_exporter::hddtemp::DEFAULT_HDDTEMP_ADDRESS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_LISTEN_ADDRESS: &str = ":9255";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_HDDTEMP_TIMEOUT_MS: u64 = 2000;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Exporter configuration. Unset fields fall back to [`Config::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    #[serde(alias = "listen-address")]
    pub listen_address: Option<String>,
    #[serde(alias = "metrics-path")]
    pub metrics_path: Option<String>,

    // hddtemp
    #[serde(alias = "enable-hddtemp")]
    pub enable_hddtemp: Option<bool>,
    #[serde(alias = "hddtemp-address")]
    pub hddtemp_address: Option<String>,
    #[serde(alias = "hddtemp-timeout-ms")]
    pub hddtemp_timeout_ms: Option<u64>,

    // lm-sensors
    #[serde(alias = "enable-lm-sensors")]
    pub enable_lm_sensors: Option<bool>,
    #[serde(alias = "hwmon-path")]
    pub hwmon_path: Option<PathBuf>,

    // Feature flags
    pub enable_health: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: Some(DEFAULT_LISTEN_ADDRESS.to_string()),
            metrics_path: Some(DEFAULT_METRICS_PATH.to_string()),
            enable_hddtemp: Some(true),
            hddtemp_address: Some(DEFAULT_HDDTEMP_ADDRESS.to_string()),
            hddtemp_timeout_ms: Some(DEFAULT_HDDTEMP_TIMEOUT_MS),
            enable_lm_sensors: Some(true),
            hwmon_path: Some(PathBuf::from(DEFAULT_HWMON_PATH)),
            enable_health: Some(true),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn metrics_path(&self) -> &str {
        self.metrics_path.as_deref().unwrap_or(DEFAULT_METRICS_PATH)
    }

    pub fn hddtemp_address(&self) -> &str {
        self.hddtemp_address
            .as_deref()
            .unwrap_or(DEFAULT_HDDTEMP_ADDRESS)
    }

    pub fn hddtemp_timeout(&self) -> Duration {
        Duration::from_millis(
            self.hddtemp_timeout_ms
                .unwrap_or(DEFAULT_HDDTEMP_TIMEOUT_MS),
        )
    }

    pub fn hwmon_path(&self) -> PathBuf {
        self.hwmon_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HWMON_PATH))
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        parse_listen_address(
            self.listen_address
                .as_deref()
                .unwrap_or(DEFAULT_LISTEN_ADDRESS),
        )
    }
}

/// Parses a listen address. `:port` binds all interfaces; host names are
/// resolved and the first address wins.
pub fn parse_listen_address(addr: &str) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    if let Some(port) = addr.strip_prefix(':') {
        let port: u16 = port
            .parse()
            .map_err(|_| format!("Invalid port in listen address '{}'", addr))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    if let Ok(sock) = addr.parse::<SocketAddr>() {
        return Ok(sock);
    }
    addr.to_socket_addrs()
        .map_err(|e| format!("Invalid listen address '{}': {}", addr, e))?
        .next()
        .ok_or_else(|| format!("Listen address '{}' resolved to nothing", addr).into())
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    cfg.listen_addr()?;

    let path = cfg.metrics_path();
    if !path.starts_with('/') {
        return Err(format!("metrics_path '{}' must start with '/'", path).into());
    }
    if path == "/" {
        return Err("metrics_path must not be '/', the landing page lives there".into());
    }

    let enable_hddtemp = cfg.enable_hddtemp.unwrap_or(true);
    let enable_lm_sensors = cfg.enable_lm_sensors.unwrap_or(true);
    if !(enable_hddtemp || enable_lm_sensors) {
        return Err("At least one of enable_hddtemp/enable_lm_sensors must be true".into());
    }

    if enable_hddtemp {
        if cfg.hddtemp_address().trim().is_empty() {
            return Err("hddtemp_address must not be empty".into());
        }
        if cfg.hddtemp_timeout_ms == Some(0) {
            return Err("hddtemp_timeout_ms must be greater than zero".into());
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level) {
            return Err(format!(
                "Invalid log_level '{}', expected one of {}",
                level,
                LOG_LEVELS.join("/")
            )
            .into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    let file = Path::new(path);
    if !file.exists() {
        return Err(format!("TLS {} file not found: {}", what, path).into());
    }
    match fs::metadata(file) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into()),
        Ok(_) => Ok(()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(addr) = &args.listen_address {
        config.listen_address = Some(addr.clone());
    }
    if let Some(path) = &args.telemetry_path {
        config.metrics_path = Some(path.clone());
    }
    if let Some(addr) = &args.hddtemp_address {
        config.hddtemp_address = Some(addr.clone());
    }
    if let Some(ms) = args.hddtemp_timeout_ms {
        config.hddtemp_timeout_ms = Some(ms);
    }
    if let Some(path) = &args.hwmon_path {
        config.hwmon_path = Some(path.clone());
    }

    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    // Feature flags
    if args.disable_hddtemp {
        config.enable_hddtemp = Some(false);
    }
    if args.disable_lm_sensors {
        config.enable_lm_sensors = Some(false);
    }
    if args.disable_health {
        config.enable_health = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads a config file, or the first default location that exists.
/// Missing files yield the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/sensor-exporter/sensor-exporter.yaml",
                "/etc/sensor-exporter/sensor-exporter.yml",
                "/etc/sensor-exporter/sensor-exporter.json",
                "./sensor-exporter.yaml",
                "./sensor-exporter.yml",
                "./sensor-exporter.json",
            ];
            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(found) => PathBuf::from(found),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders a config in the requested format.
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
