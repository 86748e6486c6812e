//! CLI arguments and subcommands for sensor-exporter.
//!
//! Flag names of the form `--web.listen-address` are kept so existing service
//! units keep working.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "sensor-exporter",
    about = "Prometheus exporter for lm-sensors and hddtemp readings",
    long_about = "Prometheus exporter for lm-sensors and hddtemp readings.\n\n\
                  Publishes fan speeds, voltages, power draw and temperatures of every \
                  detected hardware monitoring chip, plus disk temperatures reported by \
                  an hddtemp daemon.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Address on which to expose metrics and web interface
    #[arg(long = "web.listen-address")]
    pub listen_address: Option<String>,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path")]
    pub telemetry_path: Option<String>,

    /// Address to fetch hddtemp metrics from
    #[arg(long = "hddtemp-address")]
    pub hddtemp_address: Option<String>,

    /// Deadline for one hddtemp exchange in milliseconds
    #[arg(long)]
    pub hddtemp_timeout_ms: Option<u64>,

    /// Do not poll the hddtemp daemon
    #[arg(long)]
    pub disable_hddtemp: bool,

    /// Do not read hardware monitoring chips
    #[arg(long)]
    pub disable_lm_sensors: bool,

    /// Root of the hwmon sysfs tree
    #[arg(long)]
    pub hwmon_path: Option<PathBuf>,

    /// Log level (default: info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run poll cycles once and print the readings
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,
    },
}
