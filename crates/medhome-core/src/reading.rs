//! Measurement data model: samples, readings, and the transmitted record.
//!
//! A [`TelemetryRecord`] is the unit of transmission. Its fields are private
//! and only readable through accessors, so a record cannot change between
//! delivery attempts.

use uuid::Uuid;

/// Raw samples per aggregation block.
pub const SAMPLE_BLOCK: usize = 100;
/// Raw samples collected per vitals measurement.
pub const TOTAL_SAMPLES: usize = 500;
/// Blocks per vitals measurement.
pub const VITALS_BLOCKS: usize = TOTAL_SAMPLES / SAMPLE_BLOCK;
/// Strain-gauge reads per weight measurement.
pub const WEIGHT_SAMPLES: usize = TOTAL_SAMPLES / 2 + 1;

/// Heart-rate and SpO2 value reported when no block passed validation.
pub const VITALS_SENTINEL: i32 = -1;
/// Weight value reported when the scale could not be read.
pub const WEIGHT_SENTINEL: f64 = -1.0;

// ---------------------------------------------------------------------------
// Raw samples
// ---------------------------------------------------------------------------

/// One photoplethysmography sample: red and infrared LED intensities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PpgSample {
    pub red: u32,
    pub ir: u32,
}

/// Caller-owned block buffers, reused for every block of a measurement.
#[derive(Debug, Clone)]
pub struct BlockBuffers {
    pub red: [u32; SAMPLE_BLOCK],
    pub ir: [u32; SAMPLE_BLOCK],
}

impl BlockBuffers {
    pub fn new() -> Self {
        Self {
            red: [0; SAMPLE_BLOCK],
            ir: [0; SAMPLE_BLOCK],
        }
    }

    /// Store sample `i` of the current block.
    pub fn put(&mut self, i: usize, sample: PpgSample) {
        self.red[i] = sample.red;
        self.ir[i] = sample.ir;
    }
}

impl Default for BlockBuffers {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Averaged heart rate and blood-oxygen saturation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VitalsReading {
    pub heart_rate_bpm: i32,
    pub spo2_percent: i32,
    pub valid: bool,
}

impl VitalsReading {
    /// The "no reliable reading obtained" result.
    pub fn sentinel() -> Self {
        Self {
            heart_rate_bpm: VITALS_SENTINEL,
            spo2_percent: VITALS_SENTINEL,
            valid: false,
        }
    }

    /// Whether `heart_rate` and `spo2` fall inside the physiological window.
    pub fn in_range(heart_rate: i32, spo2: i32) -> bool {
        heart_rate > 30 && heart_rate < 180 && spo2 > 80 && spo2 <= 100
    }
}

/// Calibrated body weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightReading {
    pub weight: f64,
}

impl WeightReading {
    pub fn sentinel() -> Self {
        Self {
            weight: WEIGHT_SENTINEL,
        }
    }
}

/// Cuff blood pressure in mmHg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloodPressureReading {
    pub systolic: i32,
    pub diastolic: i32,
}

impl BloodPressureReading {
    pub fn sentinel() -> Self {
        Self {
            systolic: VITALS_SENTINEL,
            diastolic: VITALS_SENTINEL,
        }
    }
}

impl std::fmt::Display for BloodPressureReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.systolic, self.diastolic)
    }
}

// ---------------------------------------------------------------------------
// Telemetry record
// ---------------------------------------------------------------------------

/// One complete measurement, frozen at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    id: Uuid,
    device_serial: String,
    vitals: VitalsReading,
    weight: WeightReading,
    blood_pressure: BloodPressureReading,
}

impl TelemetryRecord {
    pub fn new(
        device_serial: impl Into<String>,
        vitals: VitalsReading,
        weight: WeightReading,
        blood_pressure: BloodPressureReading,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_serial: device_serial.into(),
            vitals,
            weight,
            blood_pressure,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device_serial(&self) -> &str {
        &self.device_serial
    }

    pub fn heart_rate(&self) -> i32 {
        self.vitals.heart_rate_bpm
    }

    pub fn spo2(&self) -> i32 {
        self.vitals.spo2_percent
    }

    pub fn vitals_valid(&self) -> bool {
        self.vitals.valid
    }

    pub fn weight(&self) -> f64 {
        self.weight.weight
    }

    pub fn systolic(&self) -> i32 {
        self.blood_pressure.systolic
    }

    pub fn diastolic(&self) -> i32 {
        self.blood_pressure.diastolic
    }
}

// ---------------------------------------------------------------------------
// Delivery attempts
// ---------------------------------------------------------------------------

/// Result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Delivered,
    Failed(String),
}

/// One submission of a record. `attempt_number` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    pub record_id: Uuid,
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
}
