//! Simulated peripherals for bench runs and tests.
//!
//! None of these touch hardware. The PPG and scale generators produce
//! signals the real estimator and calibration can recover targets from.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::time::Duration;

use rand::Rng;

use crate::aggregate::Calibration;
use crate::connectivity::{NetworkIdentity, NetworkLink};
use crate::error::SensorError;
use crate::input::StartButton;
use crate::reading::{BloodPressureReading, PpgSample, SAMPLE_BLOCK};
use crate::source::{CuffPeripheral, PpgSource, SensorInfo, SensorKind, StrainGaugeSource};

const IR_DC: f64 = 50_000.0;
const IR_AC: f64 = 1_000.0;
const RED_DC: f64 = 40_000.0;

fn jitter(noise: f64) -> f64 {
    if !noise.is_finite() || noise <= 0.0 {
        return 0.0;
    }
    rand::rng().random_range(-noise..=noise)
}

/// One red/IR sample of a sinusoidal pulse at `hr` BPM whose ratio of ratios
/// maps back to `spo2`. `noise` is the peak amplitude of uniform noise in counts.
pub fn synthetic_ppg_sample(hr: f64, spo2: f64, fs: f64, noise: f64, index: usize) -> PpgSample {
    let r = (110.0 - spo2) / 25.0;
    let red_ac = r * RED_DC * (IR_AC / IR_DC);
    let t = index as f64 / fs;
    let phase = (2.0 * PI * hr / 60.0 * t).sin();

    let ir = IR_DC + IR_AC * phase + jitter(noise);
    let red = RED_DC + red_ac * phase + jitter(noise);
    PpgSample {
        red: red.round().max(0.0) as u32,
        ir: ir.round().max(0.0) as u32,
    }
}

/// One block of [`SAMPLE_BLOCK`] samples starting at `start`. Returns `(red, ir)`.
pub fn synthetic_ppg_block(
    hr: f64,
    spo2: f64,
    fs: f64,
    noise: f64,
    start: usize,
) -> (Vec<u32>, Vec<u32>) {
    (start..start + SAMPLE_BLOCK)
        .map(|i| synthetic_ppg_sample(hr, spo2, fs, noise, i))
        .map(|s| (s.red, s.ir))
        .unzip()
}

// ---------------------------------------------------------------------------
// Pulse oximeter
// ---------------------------------------------------------------------------

static PPG_INFO: SensorInfo = SensorInfo {
    name: "sim_ppg",
    description: "Synthetic red/IR pulse waveform",
    kind: SensorKind::PulseOximeter,
    simulated: true,
};

/// Synthetic pulse oximeter.
#[derive(Debug, Clone)]
pub struct SimulatedPpg {
    heart_rate: f64,
    spo2: f64,
    sample_rate_hz: f64,
    noise: f64,
    index: usize,
    /// Stop producing samples after this many reads.
    limit: Option<usize>,
}

impl SimulatedPpg {
    pub fn new(heart_rate: f64, spo2: f64, sample_rate_hz: f64) -> Self {
        Self {
            heart_rate,
            spo2,
            sample_rate_hz,
            noise: 0.0,
            index: 0,
            limit: None,
        }
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Time out on every read after `reads` successful ones.
    pub fn disconnect_after(mut self, reads: usize) -> Self {
        self.limit = Some(reads);
        self
    }

    pub fn samples_read(&self) -> usize {
        self.index
    }
}

impl PpgSource for SimulatedPpg {
    fn info(&self) -> &SensorInfo {
        &PPG_INFO
    }

    fn read_sample(&mut self, timeout: Duration) -> Result<PpgSample, SensorError> {
        if self.limit.is_some_and(|limit| self.index >= limit) {
            return Err(SensorError::Timeout {
                sensor: PPG_INFO.name,
                timeout,
            });
        }
        let sample = synthetic_ppg_sample(
            self.heart_rate,
            self.spo2,
            self.sample_rate_hz,
            self.noise,
            self.index,
        );
        self.index += 1;
        Ok(sample)
    }
}

// ---------------------------------------------------------------------------
// Scale
// ---------------------------------------------------------------------------

static SCALE_INFO: SensorInfo = SensorInfo {
    name: "sim_scale",
    description: "Strain-gauge counts around a target weight",
    kind: SensorKind::StrainGauge,
    simulated: true,
};

/// Strain gauge whose counts convert back to `weight` under `calibration`.
#[derive(Debug, Clone)]
pub struct SimulatedScale {
    raw: f64,
    noise: f64,
}

impl SimulatedScale {
    pub fn new(weight: f64, calibration: &Calibration) -> Self {
        Self {
            raw: weight * calibration.scale_ratio + calibration.zero_offset,
            noise: 0.0,
        }
    }

    /// Noise in raw counts; symmetric, so the mean is unaffected on average.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }
}

impl StrainGaugeSource for SimulatedScale {
    fn info(&self) -> &SensorInfo {
        &SCALE_INFO
    }

    fn read_raw(&mut self, _timeout: Duration) -> Result<i32, SensorError> {
        let value = (self.raw + jitter(self.noise)).round();
        if value > f64::from(i32::MAX) || value < f64::from(i32::MIN) {
            return Err(SensorError::Peripheral {
                sensor: SCALE_INFO.name,
                detail: format!("count {value} out of range"),
            });
        }
        Ok(value as i32)
    }
}

// ---------------------------------------------------------------------------
// Cuff
// ---------------------------------------------------------------------------

/// Cuff module that records trigger edges and returns a fixed result.
#[derive(Debug, Clone)]
pub struct SimulatedCuff {
    result: BloodPressureReading,
    triggered: bool,
    pulses: u32,
}

impl SimulatedCuff {
    pub fn new(systolic: i32, diastolic: i32) -> Self {
        Self {
            result: BloodPressureReading {
                systolic,
                diastolic,
            },
            triggered: false,
            pulses: 0,
        }
    }

    /// Number of completed high→low trigger pulses.
    pub fn pulses(&self) -> u32 {
        self.pulses
    }
}

impl CuffPeripheral for SimulatedCuff {
    fn set_trigger(&mut self, high: bool) {
        if self.triggered && !high {
            self.pulses += 1;
        }
        self.triggered = high;
    }

    fn read_result(&mut self) -> Result<BloodPressureReading, SensorError> {
        if self.pulses == 0 {
            return Err(SensorError::Peripheral {
                sensor: "sim_cuff",
                detail: "read before any measurement was triggered".to_string(),
            });
        }
        Ok(self.result)
    }
}

// ---------------------------------------------------------------------------
// Button
// ---------------------------------------------------------------------------

/// Plays back a fixed level sequence, then holds the last level.
#[derive(Debug, Clone, Default)]
pub struct ScriptedButton {
    levels: VecDeque<bool>,
    last: bool,
}

impl ScriptedButton {
    pub fn new(levels: impl IntoIterator<Item = bool>) -> Self {
        Self {
            levels: levels.into_iter().collect(),
            last: false,
        }
    }

    /// `presses` clean presses, each `hold` polls high followed by `gap` polls low.
    pub fn presses(presses: usize, hold: usize, gap: usize) -> Self {
        let mut levels = Vec::with_capacity(presses * (hold + gap) + gap);
        levels.extend(std::iter::repeat_n(false, gap));
        for _ in 0..presses {
            levels.extend(std::iter::repeat_n(true, hold));
            levels.extend(std::iter::repeat_n(false, gap));
        }
        Self::new(levels)
    }

    pub fn remaining(&self) -> usize {
        self.levels.len()
    }
}

impl StartButton for ScriptedButton {
    fn is_pressed(&mut self) -> bool {
        if let Some(level) = self.levels.pop_front() {
            self.last = level;
        }
        self.last
    }
}

// ---------------------------------------------------------------------------
// Network link
// ---------------------------------------------------------------------------

/// Link that associates after a fixed number of `is_connected` polls.
#[derive(Debug, Clone)]
pub struct SimulatedLink {
    polls_needed: Option<u32>,
    polls: u32,
    connect_calls: u32,
    connected: bool,
}

impl SimulatedLink {
    /// `0` associates inside `connect`.
    pub fn new(polls_needed: u32) -> Self {
        Self {
            polls_needed: Some(polls_needed),
            polls: 0,
            connect_calls: 0,
            connected: false,
        }
    }

    /// Never associates.
    pub fn never() -> Self {
        Self {
            polls_needed: None,
            ..Self::new(0)
        }
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls
    }
}

impl NetworkLink for SimulatedLink {
    fn connect(&mut self, _ssid_hint: &str, _psk_hint: &str) -> bool {
        self.connect_calls += 1;
        self.polls = 0;
        self.connected = self.polls_needed == Some(0);
        self.connected
    }

    fn is_connected(&mut self) -> bool {
        if !self.connected {
            self.polls += 1;
            self.connected = self.polls_needed.is_some_and(|n| self.polls >= n);
        }
        self.connected
    }

    fn identity(&self) -> Option<NetworkIdentity> {
        self.connected.then(|| NetworkIdentity {
            ssid: "medhome-sim".to_string(),
            address: "192.168.4.2".to_string(),
        })
    }
}
