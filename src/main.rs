//! sensor-exporter - version 0.1.0
//!
//! Prometheus exporter for lm-sensors and hddtemp readings.
//! This is the main entry point that starts the pollers, serves HTTP and
//! handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod state;
mod telemetry;

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use prometheus::Registry;
use sensor_exporter::{
    HddTempPoller, HwmonBackend, LmSensorsPoller, MetricSink, PollerStats, SensorStore, TcpDialer,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::{net::TcpListener, signal};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};

use cli::{Args, Commands};
use commands::{command_config, command_test};
use config::{resolve_config, show_config, validate_effective_config, Config};
use handlers::{health_handler, metrics_handler, root_handler};
use state::AppState;
use telemetry::ExporterMetrics;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let level = config.log_level.as_deref().unwrap_or("info");
    let filter = match level {
        "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Starts every enabled poller and returns their statistics.
///
/// A backend that fails to initialize is reported as dead; everything else
/// keeps running.
fn start_pollers(config: &Config, store: &SensorStore) -> Vec<Arc<PollerStats>> {
    let sink: Arc<dyn MetricSink> = Arc::new(store.clone());
    let mut pollers = Vec::new();

    if config.enable_lm_sensors.unwrap_or(true) {
        let stats = Arc::new(PollerStats::new("lm_sensors"));
        pollers.push(stats.clone());
        let backend = HwmonBackend::new(config.hwmon_path());
        match LmSensorsPoller::start(backend, sink.clone(), stats.clone()) {
            Ok(poller) => {
                tokio::spawn(poller.run());
            }
            Err(e) => {
                error!("lm-sensors poller disabled: {}", e);
                stats.mark_fatal(&e);
            }
        }
    } else {
        debug!("lm-sensors poller disabled in configuration");
    }

    if config.enable_hddtemp.unwrap_or(true) {
        let stats = Arc::new(PollerStats::new("hddtemp"));
        pollers.push(stats.clone());
        let poller = HddTempPoller::new(
            TcpDialer::default(),
            config.hddtemp_address(),
            sink.clone(),
            stats,
        )
        .with_timeout(config.hddtemp_timeout());
        tokio::spawn(poller.run());
    } else {
        debug!("hddtemp poller disabled in configuration");
    }

    pollers
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => Ok(command_config(output.clone(), *format, *commented)?),

            Commands::Test { iterations } => {
                let config = load_validated_config(&args)?;
                setup_logging(&config);
                Ok(command_test(*iterations, &config).await?)
            }
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&config);

    info!("Starting sensor-exporter");

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let store = SensorStore::new()?;
    store.register(&registry)?;
    let telemetry = ExporterMetrics::new(&registry)?;
    debug!("All metrics registered successfully");

    let pollers = start_pollers(&config, &store);
    info!("Started {} poller(s)", pollers.len());

    let addr = config.listen_addr()?;
    let metrics_path = config.metrics_path().to_string();

    let state = Arc::new(AppState {
        registry,
        store,
        telemetry,
        pollers,
        config: Arc::new(config.clone()),
        start_time: Instant::now(),
    });

    // Configure HTTP server routes
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route(&metrics_path, get(metrics_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state);

    if config.enable_tls.unwrap_or(false) {
        // Presence was checked by validate_effective_config().
        let cert_path = config
            .tls_cert_path
            .as_deref()
            .ok_or("tls_cert_path is required when enable_tls is true")?;
        let key_path = config
            .tls_key_path
            .as_deref()
            .ok_or("tls_key_path is required when enable_tls is true")?;

        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "sensor-exporter listening on https://{}{}",
            addr, metrics_path
        );

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "sensor-exporter listening on http://{}{}",
            addr, metrics_path
        );

        let server = axum::serve(listener, app);

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
            }
        }
    }

    info!("sensor-exporter stopped gracefully");
    Ok(())
}
