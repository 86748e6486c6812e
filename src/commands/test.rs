//! Test command implementation.
//!
//! Runs poll cycles against a private store and prints what was read.

use std::sync::Arc;
use std::time::Instant;

use sensor_exporter::{
    HddTempPoller, HwmonBackend, LmSensorsPoller, PollerStats, SensorStore, TcpDialer,
};

use crate::config::Config;

/// Polls every enabled source `iterations` times.
pub async fn command_test(iterations: usize, config: &Config) -> anyhow::Result<()> {
    println!("🧪 Sensor Exporter - Test Mode");
    println!("==============================");

    let store = SensorStore::new()?;
    let sink = Arc::new(store.clone());

    let lm = if config.enable_lm_sensors.unwrap_or(true) {
        let stats = Arc::new(PollerStats::new("lm_sensors"));
        match LmSensorsPoller::start(HwmonBackend::new(config.hwmon_path()), sink.clone(), stats) {
            Ok(poller) => Some(poller),
            Err(e) => {
                println!("   ❌ lm-sensors unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let hddtemp = config.enable_hddtemp.unwrap_or(true).then(|| {
        HddTempPoller::new(
            TcpDialer::default(),
            config.hddtemp_address(),
            sink.clone(),
            Arc::new(PollerStats::new("hddtemp")),
        )
        .with_timeout(config.hddtemp_timeout())
    });

    for iteration in 1..=iterations {
        println!("\n🔄 Iteration {}/{}:", iteration, iterations);

        if let Some(poller) = &lm {
            let start = Instant::now();
            let summary = poller.poll_once();
            println!(
                "   🌡️  lm-sensors: {} published, {} skipped, {} ignored ({:.2}ms)",
                summary.published,
                summary.skipped,
                summary.ignored,
                start.elapsed().as_secs_f64() * 1000.0
            );
        }

        if let Some(poller) = &hddtemp {
            let start = Instant::now();
            match poller.poll_once().await {
                Ok(summary) => println!(
                    "   💽 hddtemp {}: {} published, {} skipped ({:.2}ms)",
                    poller.address(),
                    summary.published,
                    summary.skipped,
                    start.elapsed().as_secs_f64() * 1000.0
                ),
                Err(e) => println!("   ❌ hddtemp {}: {}", poller.address(), e),
            }
        }
    }

    println!("\n📈 Readings:");
    for sample in store.snapshot() {
        println!(
            "   {}{{{}}} {}",
            sample.family.name(),
            sample.labels.join(","),
            sample.value
        );
    }

    println!("\n✅ Test completed");
    Ok(())
}
