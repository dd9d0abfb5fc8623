//! Sensor peripheral traits and metadata.
//!
//! Every physical sensor on the station sits behind one of these traits. Reads
//! are bounded by a caller-supplied timeout so an unplugged peripheral shows
//! up as [`SensorError::Timeout`] instead of a hang.

use std::time::Duration;

use crate::error::SensorError;
use crate::reading::{BloodPressureReading, PpgSample};

/// Physical measurement a sensor contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Red/IR photoplethysmography (heart rate and SpO2).
    PulseOximeter,
    /// Load-cell strain gauge (weight).
    StrainGauge,
    /// Inflatable cuff (blood pressure).
    BloodPressureCuff,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PulseOximeter => write!(f, "pulse_oximeter"),
            Self::StrainGauge => write!(f, "strain_gauge"),
            Self::BloodPressureCuff => write!(f, "bp_cuff"),
        }
    }
}

/// Metadata about a sensor implementation.
#[derive(Debug, Clone)]
pub struct SensorInfo {
    /// Unique identifier (e.g. `"max30102"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    pub kind: SensorKind,
    /// Whether values come from real hardware or are generated.
    pub simulated: bool,
}

/// Source of red/IR intensity samples.
pub trait PpgSource {
    fn info(&self) -> &SensorInfo;

    /// Block until the next sample is available or `timeout` elapses.
    fn read_sample(&mut self, timeout: Duration) -> Result<PpgSample, SensorError>;

    fn name(&self) -> &'static str {
        self.info().name
    }
}

/// Source of raw strain-gauge counts.
pub trait StrainGaugeSource {
    fn info(&self) -> &SensorInfo;

    /// Block until the next conversion is ready or `timeout` elapses.
    fn read_raw(&mut self, timeout: Duration) -> Result<i32, SensorError>;

    fn name(&self) -> &'static str {
        self.info().name
    }
}

/// Anything that can produce one blood-pressure measurement.
pub trait BloodPressureProvider {
    fn info(&self) -> &SensorInfo;

    fn measure(&mut self) -> Result<BloodPressureReading, SensorError>;
}

/// Digital lines and result register of an external BP cuff module.
pub trait CuffPeripheral {
    /// Drive the trigger output.
    fn set_trigger(&mut self, high: bool);

    /// Read the result of the last completed measurement window.
    fn read_result(&mut self) -> Result<BloodPressureReading, SensorError>;
}

/// Per-block output of a PPG estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpgEstimate {
    pub heart_rate: i32,
    pub spo2: i32,
    pub hr_valid: bool,
    pub spo2_valid: bool,
}

impl PpgEstimate {
    /// Whether this block may contribute to the running average.
    pub fn accepted(&self) -> bool {
        self.hr_valid
            && self.spo2_valid
            && crate::reading::VitalsReading::in_range(self.heart_rate, self.spo2)
    }
}

/// Converts one block of red/IR intensities into heart rate and SpO2.
pub trait PpgEstimator {
    fn estimate(&mut self, ir: &[u32], red: &[u32]) -> PpgEstimate;
}
