//! Maps feature names to metric families.
//!
//! The family is chosen by the feature's type prefix (`fan1` → fan speed).
//! Anything not in the table, such as `curr1` or `humidity1`, is not
//! exported.

use crate::sink::MetricFamily;

const PREFIXES: [(&str, MetricFamily); 4] = [
    ("fan", MetricFamily::FanSpeed),
    ("temp", MetricFamily::Temperature),
    ("in", MetricFamily::Voltage),
    ("power", MetricFamily::Power),
];

/// Returns the family a feature belongs to, or `None` for unexported types.
///
/// The prefix has to be followed by the channel number, so `intrusion0` is
/// not mistaken for a voltage input.
pub fn classify(feature_name: &str) -> Option<MetricFamily> {
    PREFIXES.iter().find_map(|&(prefix, family)| {
        feature_name
            .strip_prefix(prefix)
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            .map(|_| family)
    })
}
