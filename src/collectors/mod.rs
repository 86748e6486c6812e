//! Sensor backends.
//!
//! Backends turn a platform interface into the chip/feature model of
//! [`crate::lmsensors`]. Only the Linux hwmon sysfs tree is supported.

pub mod hwmon;

pub use hwmon::{HwmonBackend, DEFAULT_HWMON_PATH};
