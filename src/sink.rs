//! Last-value store for sensor readings.
//!
//! Both pollers publish into a [`SensorStore`] through the [`MetricSink`]
//! trait. The store keeps the most recent value for every
//! `(family, label set)` pair and is registered with a prometheus `Registry`
//! as a custom collector, so every scrape renders whatever is currently known.
//! Entries never expire: a sensor that disappears keeps its last reading.

use dashmap::DashMap;
use prometheus::core::{Collector, Desc};
use prometheus::{proto, GaugeVec, Opts, Registry};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Metric families exported by the sensor pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricFamily {
    FanSpeed,
    Voltage,
    Power,
    Temperature,
    /// Disk temperature reported by hddtemp. Kept apart from the hwmon
    /// temperature family, the label schemas differ.
    DiskTemperature,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 5] = [
        MetricFamily::FanSpeed,
        MetricFamily::Voltage,
        MetricFamily::Power,
        MetricFamily::Temperature,
        MetricFamily::DiskTemperature,
    ];

    /// Exposition name of the family.
    pub fn name(self) -> &'static str {
        match self {
            MetricFamily::FanSpeed => "sensor_lm_fan_speed_rpm",
            MetricFamily::Voltage => "sensor_lm_voltage_volts",
            MetricFamily::Power => "sensor_lm_power_watts",
            MetricFamily::Temperature => "sensor_lm_temperature_celsius",
            MetricFamily::DiskTemperature => "sensor_hddsmart_temperature_celsius",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            MetricFamily::FanSpeed => "fan speed (rotations per minute).",
            MetricFamily::Voltage => "voltage in volts",
            MetricFamily::Power => "power in watts",
            MetricFamily::Temperature | MetricFamily::DiskTemperature => {
                "temperature in celsius"
            }
        }
    }

    /// Label names in the order label values are passed to [`MetricSink::set`].
    pub fn label_names(self) -> &'static [&'static str] {
        match self {
            MetricFamily::FanSpeed => &["fantype", "chip", "adaptor"],
            MetricFamily::Voltage => &["intype", "chip", "adaptor"],
            MetricFamily::Power => &["powertype", "chip", "adaptor"],
            MetricFamily::Temperature => &["temptype", "chip", "adaptor"],
            MetricFamily::DiskTemperature => &["device", "id"],
        }
    }

    fn gauge_vec(self) -> Result<GaugeVec, prometheus::Error> {
        GaugeVec::new(Opts::new(self.name(), self.help()), self.label_names())
    }
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised when a reading does not fit its family.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SinkError {
    #[error("{family} expects {expected} label values, got {actual}")]
    LabelArity {
        family: MetricFamily,
        expected: usize,
        actual: usize,
    },
}

/// Destination for sensor readings.
///
/// `set` is an idempotent upsert: the last write for a given family and
/// label set wins. Implementations must accept concurrent callers.
pub trait MetricSink: Send + Sync {
    fn set(&self, family: MetricFamily, labels: &[&str], value: f64) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    family: MetricFamily,
    labels: Vec<String>,
}

/// One stored reading, as returned by [`SensorStore::snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub family: MetricFamily,
    pub labels: Vec<String>,
    pub value: f64,
}

/// Concurrent last-value store shared by the pollers and the HTTP layer.
///
/// Cloning is cheap; all clones share the same values.
#[derive(Clone)]
pub struct SensorStore {
    values: Arc<DashMap<SeriesKey, f64>>,
    // Gauge vectors used only to describe the families to the registry.
    templates: Arc<Vec<GaugeVec>>,
}

impl SensorStore {
    pub fn new() -> Result<Self, prometheus::Error> {
        let templates = MetricFamily::ALL
            .iter()
            .map(|family| family.gauge_vec())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            values: Arc::new(DashMap::new()),
            templates: Arc::new(templates),
        })
    }

    /// Registers the store as a collector so scrapes include every family.
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.clone()))
    }

    /// Current value for one series, if it was ever published.
    pub fn value(&self, family: MetricFamily, labels: &[&str]) -> Option<f64> {
        let key = SeriesKey {
            family,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        };
        self.values.get(&key).map(|v| *v)
    }

    /// Number of distinct series held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copies every stored reading, ordered by family then labels.
    ///
    /// Each value is read consistently; values of different series may come
    /// from different poll cycles.
    pub fn snapshot(&self) -> Vec<Sample> {
        let mut samples: Vec<Sample> = self
            .values
            .iter()
            .map(|entry| Sample {
                family: entry.key().family,
                labels: entry.key().labels.clone(),
                value: *entry.value(),
            })
            .collect();
        samples.sort_by(|a, b| (a.family, &a.labels).cmp(&(b.family, &b.labels)));
        samples
    }
}

impl MetricSink for SensorStore {
    fn set(&self, family: MetricFamily, labels: &[&str], value: f64) -> Result<(), SinkError> {
        let expected = family.label_names().len();
        if labels.len() != expected {
            return Err(SinkError::LabelArity {
                family,
                expected,
                actual: labels.len(),
            });
        }
        let key = SeriesKey {
            family,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        };
        self.values.insert(key, value);
        Ok(())
    }
}

impl Collector for SensorStore {
    fn desc(&self) -> Vec<&Desc> {
        self.templates.iter().flat_map(|t| t.desc()).collect()
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let mut by_family: BTreeMap<MetricFamily, Vec<(Vec<String>, f64)>> = BTreeMap::new();
        for entry in self.values.iter() {
            by_family
                .entry(entry.key().family)
                .or_default()
                .push((entry.key().labels.clone(), *entry.value()));
        }

        let mut families = Vec::with_capacity(by_family.len());
        for (family, series) in by_family {
            // A fresh vector per scrape keeps concurrent scrapes independent.
            let vec = match family.gauge_vec() {
                Ok(vec) => vec,
                Err(e) => {
                    warn!("Failed to build gauge vector for {}: {}", family, e);
                    continue;
                }
            };
            for (labels, value) in series {
                let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
                match vec.get_metric_with_label_values(&refs) {
                    Ok(gauge) => gauge.set(value),
                    Err(e) => warn!("Dropping {} series {:?}: {}", family, labels, e),
                }
            }
            families.extend(vec.collect());
        }
        families
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn render(registry: &Registry) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_rejects_partial_label_set() {
        let store = SensorStore::new().unwrap();
        let err = store
            .set(MetricFamily::FanSpeed, &["fan1", "nct6775-isa-0290"], 1200.0)
            .unwrap_err();
        assert_eq!(
            err,
            SinkError::LabelArity {
                family: MetricFamily::FanSpeed,
                expected: 3,
                actual: 2
            }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_label_values_are_accepted() {
        let store = SensorStore::new().unwrap();
        store
            .set(MetricFamily::DiskTemperature, &["/dev/sda", ""], 38.0)
            .unwrap();
        assert_eq!(
            store.value(MetricFamily::DiskTemperature, &["/dev/sda", ""]),
            Some(38.0)
        );
    }

    #[test]
    fn test_temperature_families_do_not_collide() {
        let store = SensorStore::new().unwrap();
        store
            .set(MetricFamily::Temperature, &["temp1", "coretemp-isa-0000", "ISA adapter"], 51.0)
            .unwrap();
        store
            .set(MetricFamily::DiskTemperature, &["/dev/sda", "WDC WD10EZEX"], 34.0)
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_exposition_uses_family_names_and_labels() {
        let registry = Registry::new();
        let store = SensorStore::new().unwrap();
        store.register(&registry).unwrap();

        store
            .set(MetricFamily::Voltage, &["Vcore", "nct6775-isa-0290", "ISA adapter"], 1.2)
            .unwrap();
        store
            .set(MetricFamily::DiskTemperature, &["/dev/sda", "-"], -1.0)
            .unwrap();

        let text = render(&registry);
        assert!(text.contains("# HELP sensor_lm_voltage_volts voltage in volts"));
        assert!(text.contains(
            r#"sensor_lm_voltage_volts{adaptor="ISA adapter",chip="nct6775-isa-0290",intype="Vcore"} 1.2"#
        ));
        assert!(text.contains(r#"sensor_hddsmart_temperature_celsius{device="/dev/sda",id="-"} -1"#));
        assert!(!text.contains("sensor_lm_fan_speed_rpm{"));
    }
}
