//! Sample aggregation: raw sensor sequences into validated readings.
//!
//! # Vitals
//!
//! Five blocks of 100 red/IR samples each go through the [`PpgEstimator`].
//! A block contributes only when both validity flags are set and
//! `30 < hr < 180`, `80 < spo2 <= 100`. The result is the integer floor of
//! the mean over accepted blocks, or `(-1, -1)` when none were accepted.
//!
//! # Weight
//!
//! 251 strain-gauge reads; `weight = (mean(|raw|) - zero_offset) / scale_ratio`.
//! No outlier rejection.

use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::SensorError;
use crate::reading::{
    BlockBuffers, BloodPressureReading, SAMPLE_BLOCK, VITALS_BLOCKS, VitalsReading,
    WEIGHT_SAMPLES, WeightReading,
};
use crate::source::{
    BloodPressureProvider, PpgEstimate, PpgEstimator, PpgSource, StrainGaugeSource,
};

/// Linear-fit constants converting a strain-gauge accumulator to kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub zero_offset: f64,
    pub scale_ratio: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            zero_offset: 197_995.84,
            scale_ratio: 1_365.925_675_68,
        }
    }
}

/// Read timing applied to every acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionTiming {
    /// Upper bound on a single sample read.
    pub sample_timeout: Duration,
    /// Pause between vitals blocks.
    pub block_pause: Duration,
    /// Pause between strain-gauge reads.
    pub weight_pause: Duration,
}

impl Default for AcquisitionTiming {
    fn default() -> Self {
        Self {
            sample_timeout: Duration::from_millis(500),
            block_pause: Duration::from_millis(50),
            weight_pause: Duration::from_millis(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Vitals
// ---------------------------------------------------------------------------

/// Collect all vitals blocks and average the accepted ones.
///
/// Returns an error only if the sensor stops producing samples; a run with
/// no accepted block is `Ok(VitalsReading::sentinel())`.
pub fn read_vitals(
    ppg: &mut dyn PpgSource,
    estimator: &mut dyn PpgEstimator,
    buffers: &mut BlockBuffers,
    timing: &AcquisitionTiming,
    clock: &dyn Clock,
) -> Result<VitalsReading, SensorError> {
    let mut estimates = Vec::with_capacity(VITALS_BLOCKS);

    for block in 0..VITALS_BLOCKS {
        for i in 0..SAMPLE_BLOCK {
            let sample = ppg.read_sample(timing.sample_timeout)?;
            buffers.put(i, sample);
        }

        let est = estimator.estimate(&buffers.ir, &buffers.red);
        debug!(
            "vitals block {}/{}: hr={} ({}) spo2={} ({}) accepted={}",
            block + 1,
            VITALS_BLOCKS,
            est.heart_rate,
            est.hr_valid,
            est.spo2,
            est.spo2_valid,
            est.accepted()
        );
        estimates.push(est);

        if block + 1 < VITALS_BLOCKS && !timing.block_pause.is_zero() {
            clock.sleep(timing.block_pause);
        }
    }

    let reading = average_vitals(&estimates);
    if !reading.valid {
        warn!("no vitals block passed validation; reporting sentinel");
    }
    Ok(reading)
}

/// Floor-average the accepted estimates.
pub fn average_vitals(estimates: &[PpgEstimate]) -> VitalsReading {
    let (mut hr_sum, mut spo2_sum, mut count) = (0i64, 0i64, 0i64);
    for est in estimates.iter().filter(|e| e.accepted()) {
        hr_sum += i64::from(est.heart_rate);
        spo2_sum += i64::from(est.spo2);
        count += 1;
    }

    if count == 0 {
        return VitalsReading::sentinel();
    }

    // Accepted values are all positive, so truncating division is a floor.
    VitalsReading {
        heart_rate_bpm: (hr_sum / count) as i32,
        spo2_percent: (spo2_sum / count) as i32,
        valid: true,
    }
}

// ---------------------------------------------------------------------------
// Weight
// ---------------------------------------------------------------------------

/// Sample the strain gauge [`WEIGHT_SAMPLES`] times and convert to weight.
pub fn read_weight(
    scale: &mut dyn StrainGaugeSource,
    calibration: &Calibration,
    timing: &AcquisitionTiming,
    clock: &dyn Clock,
) -> Result<WeightReading, SensorError> {
    let mut samples = Vec::with_capacity(WEIGHT_SAMPLES);
    for _ in 0..WEIGHT_SAMPLES {
        samples.push(scale.read_raw(timing.sample_timeout)?);
        if !timing.weight_pause.is_zero() {
            clock.sleep(timing.weight_pause);
        }
    }
    let reading = weight_from_samples(&samples, calibration);
    debug!(
        "weight: {} samples -> {:.2}",
        samples.len(),
        reading.weight
    );
    Ok(reading)
}

/// `(mean(|sample|) - zero_offset) / scale_ratio`. Empty input yields the sentinel.
pub fn weight_from_samples(samples: &[i32], calibration: &Calibration) -> WeightReading {
    if samples.is_empty() {
        return WeightReading::sentinel();
    }
    let total: f64 = samples.iter().map(|&s| f64::from(s).abs()).sum();
    let mean = total / samples.len() as f64;
    WeightReading {
        weight: (mean - calibration.zero_offset) / calibration.scale_ratio,
    }
}

// ---------------------------------------------------------------------------
// Blood pressure
// ---------------------------------------------------------------------------

/// Take one blood-pressure measurement from whichever provider is configured.
pub fn read_bp(
    provider: &mut dyn BloodPressureProvider,
) -> Result<BloodPressureReading, SensorError> {
    let reading = provider.measure()?;
    debug!("{}: {}", provider.info().name, reading);
    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::reading::PpgSample;
    use crate::source::{SensorInfo, SensorKind};
    use approx::assert_relative_eq;

    fn est(hr: i32, spo2: i32, valid: bool) -> PpgEstimate {
        PpgEstimate {
            heart_rate: hr,
            spo2,
            hr_valid: valid,
            spo2_valid: valid,
        }
    }

    // -----------------------------------------------------------------------
    // average_vitals
    // -----------------------------------------------------------------------

    #[test]
    fn test_average_three_of_five_valid() {
        let blocks = [
            est(70, 97, true),
            est(190, 97, true),
            est(72, 98, true),
            est(74, 96, true),
            est(75, 99, false),
        ];
        let r = average_vitals(&blocks);
        assert_eq!(r.heart_rate_bpm, 72);
        assert_eq!(r.spo2_percent, 97);
        assert!(r.valid);
    }

    #[test]
    fn test_average_floors() {
        let blocks = [
            est(80, 95, true),
            est(82, 96, true),
            est(81, 94, true),
            est(79, 95, true),
            est(10, 50, true),
        ];
        let r = average_vitals(&blocks);
        assert_eq!(r.heart_rate_bpm, 80);
        assert_eq!(r.spo2_percent, 95);
    }

    #[test]
    fn test_average_none_valid_is_sentinel() {
        let blocks = [est(20, 99, true), est(70, 75, true), est(70, 97, false)];
        assert_eq!(average_vitals(&blocks), VitalsReading::sentinel());
        assert_eq!(average_vitals(&[]), VitalsReading::sentinel());
    }

    // -----------------------------------------------------------------------
    // weight_from_samples
    // -----------------------------------------------------------------------

    #[test]
    fn test_weight_identity_calibration_is_raw_mean() {
        let cal = Calibration {
            zero_offset: 0.0,
            scale_ratio: 1.0,
        };
        let r = weight_from_samples(&[10, 20, 30, 40], &cal);
        assert_eq!(r.weight, 25.0);
    }

    #[test]
    fn test_weight_uses_absolute_values() {
        let cal = Calibration {
            zero_offset: 0.0,
            scale_ratio: 1.0,
        };
        let r = weight_from_samples(&[-10, 10, -30, 30], &cal);
        assert_eq!(r.weight, 20.0);
    }

    #[test]
    fn test_weight_applies_calibration() {
        let cal = Calibration {
            zero_offset: 298.0,
            scale_ratio: 10.0,
        };
        let r = weight_from_samples(&[1000; WEIGHT_SAMPLES], &cal);
        assert_relative_eq!(r.weight, 70.2, epsilon = 1e-9);
    }

    // -----------------------------------------------------------------------
    // read_vitals / read_weight with scripted peripherals
    // -----------------------------------------------------------------------

    static TEST_PPG: SensorInfo = SensorInfo {
        name: "test_ppg",
        description: "counting ppg",
        kind: SensorKind::PulseOximeter,
        simulated: true,
    };

    struct CountingPpg {
        reads: usize,
        fail_at: Option<usize>,
    }

    impl PpgSource for CountingPpg {
        fn info(&self) -> &SensorInfo {
            &TEST_PPG
        }

        fn read_sample(&mut self, timeout: Duration) -> Result<PpgSample, SensorError> {
            if Some(self.reads) == self.fail_at {
                return Err(SensorError::Timeout {
                    sensor: "test_ppg",
                    timeout,
                });
            }
            self.reads += 1;
            Ok(PpgSample {
                red: self.reads as u32,
                ir: self.reads as u32,
            })
        }
    }

    /// Replays one estimate per block and checks the block contents.
    struct ScriptedEstimator {
        script: Vec<PpgEstimate>,
        calls: usize,
    }

    impl PpgEstimator for ScriptedEstimator {
        fn estimate(&mut self, ir: &[u32], red: &[u32]) -> PpgEstimate {
            assert_eq!(ir.len(), SAMPLE_BLOCK);
            assert_eq!(red.len(), SAMPLE_BLOCK);
            // Block k holds samples k*100+1 ..= (k+1)*100.
            assert_eq!(ir[0] as usize, self.calls * SAMPLE_BLOCK + 1);
            let out = self.script[self.calls];
            self.calls += 1;
            out
        }
    }

    #[test]
    fn test_read_vitals_reads_500_samples_in_5_blocks() {
        let mut ppg = CountingPpg {
            reads: 0,
            fail_at: None,
        };
        let mut estimator = ScriptedEstimator {
            script: vec![
                est(70, 97, true),
                est(0, 0, false),
                est(72, 98, true),
                est(300, 97, true),
                est(74, 96, true),
            ],
            calls: 0,
        };
        let clock = ManualClock::new();
        let mut buffers = BlockBuffers::new();
        let r = read_vitals(
            &mut ppg,
            &mut estimator,
            &mut buffers,
            &AcquisitionTiming::default(),
            &clock,
        )
        .unwrap();
        assert_eq!(ppg.reads, 500);
        assert_eq!(estimator.calls, 5);
        assert_eq!((r.heart_rate_bpm, r.spo2_percent), (72, 97));
        // Four pauses between five blocks.
        assert_eq!(clock.total_slept(), Duration::from_millis(200));
    }

    #[test]
    fn test_read_vitals_propagates_timeout() {
        let mut ppg = CountingPpg {
            reads: 0,
            fail_at: Some(150),
        };
        let mut estimator = ScriptedEstimator {
            script: vec![est(70, 97, true); 5],
            calls: 0,
        };
        let err = read_vitals(
            &mut ppg,
            &mut estimator,
            &mut BlockBuffers::new(),
            &AcquisitionTiming::default(),
            &ManualClock::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SensorError::Timeout { .. }));
        assert_eq!(estimator.calls, 1);
    }

    static TEST_SCALE: SensorInfo = SensorInfo {
        name: "test_scale",
        description: "constant scale",
        kind: SensorKind::StrainGauge,
        simulated: true,
    };

    struct ConstantScale {
        value: i32,
        reads: usize,
    }

    impl StrainGaugeSource for ConstantScale {
        fn info(&self) -> &SensorInfo {
            &TEST_SCALE
        }

        fn read_raw(&mut self, _timeout: Duration) -> Result<i32, SensorError> {
            self.reads += 1;
            Ok(self.value)
        }
    }

    #[test]
    fn test_read_weight_takes_251_samples() {
        let mut scale = ConstantScale {
            value: -1000,
            reads: 0,
        };
        let cal = Calibration {
            zero_offset: 298.0,
            scale_ratio: 10.0,
        };
        let r = read_weight(
            &mut scale,
            &cal,
            &AcquisitionTiming::default(),
            &ManualClock::new(),
        )
        .unwrap();
        assert_eq!(scale.reads, WEIGHT_SAMPLES);
        assert_relative_eq!(r.weight, 70.2, epsilon = 1e-9);
    }
}
