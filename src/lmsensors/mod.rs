//! Hardware monitoring chips in the style of lm-sensors.
//!
//! A [`SensorBackend`] enumerates detected chips and their features; the
//! [`LmSensorsPoller`] classifies the features and publishes their values.
//! The backend is held through a [`SensorSession`], which initializes it on
//! open and tears it down on drop.

pub mod classifier;
pub mod poller;

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

pub use classifier::classify;
pub use poller::LmSensorsPoller;

/// The sensor source could not be set up; the lm-sensors poller cannot run.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("sensor source {} is not available: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("sensor backend initialization failed: {0}")]
    Init(String),
}

/// A single feature's value could not be resolved.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("feature {feature} has no sub-measurements")]
    NoSubFeatures { feature: String },

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid value {raw:?} in {}", .path.display())]
    InvalidValue { path: PathBuf, raw: String },
}

/// Where a sub-measurement's value comes from.
pub trait ValueSource: Send + Sync + fmt::Debug {
    fn read(&self) -> Result<f64, FeatureError>;
}

/// One raw measurement of a feature, e.g. `temp1_input` or `temp1_max`.
#[derive(Debug, Clone)]
pub struct SubFeature {
    pub name: String,
    source: Arc<dyn ValueSource>,
}

impl SubFeature {
    pub fn new(name: impl Into<String>, source: impl ValueSource + 'static) -> Self {
        Self {
            name: name.into(),
            source: Arc::new(source),
        }
    }

    pub fn value(&self) -> Result<f64, FeatureError> {
        self.source.read()
    }
}

/// A measurement channel on a chip, e.g. `fan1` or `in0`.
#[derive(Debug, Clone)]
pub struct Feature {
    pub name: String,
    /// Configured label, or the feature name when the chip has none.
    pub label: String,
    pub subfeatures: Vec<SubFeature>,
}

impl Feature {
    /// Value of the first sub-measurement.
    pub fn value(&self) -> Result<f64, FeatureError> {
        self.subfeatures
            .first()
            .ok_or_else(|| FeatureError::NoSubFeatures {
                feature: self.name.clone(),
            })?
            .value()
    }
}

/// A detected sensor chip.
#[derive(Debug, Clone)]
pub struct Chip {
    /// libsensors-style chip name, e.g. `nct6775-isa-0290`.
    pub identity: String,
    pub adapter: String,
    pub features: Vec<Feature>,
}

/// Sensor-detection capability.
pub trait SensorBackend: Send + Sync {
    /// One-time setup. Failure means the backend can never produce readings.
    fn initialize(&mut self) -> Result<(), FatalError>;

    /// Chips detected right now. Rebuilt on every call.
    fn list_chips(&self) -> Vec<Chip>;

    /// Checked before every cycle. An error fails the cycle instead of
    /// reporting an empty chip list as healthy.
    fn check_source(&self) -> io::Result<()> {
        Ok(())
    }

    /// Releases whatever `initialize` acquired.
    fn teardown(&mut self) {}
}

/// An initialized backend, torn down when dropped.
pub struct SensorSession<B: SensorBackend> {
    backend: B,
}

impl<B: SensorBackend> SensorSession<B> {
    pub fn open(mut backend: B) -> Result<Self, FatalError> {
        backend.initialize()?;
        Ok(Self { backend })
    }

    pub fn chips(&self) -> Vec<Chip> {
        self.backend.list_chips()
    }

    pub fn check_source(&self) -> io::Result<()> {
        self.backend.check_source()
    }
}

impl<B: SensorBackend> Drop for SensorSession<B> {
    fn drop(&mut self) {
        self.backend.teardown();
    }
}
