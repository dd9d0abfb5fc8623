//! Ratio-of-ratios SpO2 and peak-interval heart-rate estimation.
//!
//! Default [`PpgEstimator`] for the station. Works on a single 100-sample
//! block (4 s at the default 25 Hz), so it favors simplicity over robustness:
//! the aggregator's range check does the rest.
//!
//! ```text
//! R    = (AC_red / DC_red) / (AC_ir / DC_ir)
//! SpO2 = 110 - 25 * R
//! HR   = 60 * fs / mean(peak interval)
//! ```

use crate::source::{PpgEstimate, PpgEstimator};

/// Physiological HR ceiling used for the minimum peak spacing.
const MAX_DETECTABLE_BPM: f64 = 240.0;
/// Peaks must rise this fraction of the way from mean to max.
const PEAK_THRESHOLD_FRACTION: f64 = 0.3;
/// Below this perfusion (AC/DC) the signal is treated as "no finger".
const MIN_PERFUSION: f64 = 1e-4;

/// Stateless estimator parameterized by the sensor sample rate.
#[derive(Debug, Clone, Copy)]
pub struct RatioOfRatiosEstimator {
    sample_rate_hz: f64,
}

impl RatioOfRatiosEstimator {
    pub fn new(sample_rate_hz: f64) -> Self {
        Self { sample_rate_hz }
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }
}

impl Default for RatioOfRatiosEstimator {
    fn default() -> Self {
        Self::new(25.0)
    }
}

impl PpgEstimator for RatioOfRatiosEstimator {
    fn estimate(&mut self, ir: &[u32], red: &[u32]) -> PpgEstimate {
        let ir: Vec<f64> = ir.iter().map(|&v| v as f64).collect();
        let red: Vec<f64> = red.iter().map(|&v| v as f64).collect();

        let (ir_ac, ir_dc) = ac_dc(&ir);
        let (red_ac, red_dc) = ac_dc(&red);

        let spo2 = ratio_of_ratios(red_ac, red_dc, ir_ac, ir_dc).map(r_to_spo2);

        let peaks = detect_peaks(&ir, self.sample_rate_hz);
        let heart_rate = heart_rate_from_peaks(&peaks, self.sample_rate_hz);

        PpgEstimate {
            heart_rate: heart_rate.map_or(-999, |hr| hr.floor() as i32),
            spo2: spo2.map_or(-999, |s| s.floor() as i32),
            hr_valid: heart_rate.is_some(),
            spo2_valid: spo2.is_some(),
        }
    }
}

// ---------------------------------------------------------------------------
// Signal helpers
// ---------------------------------------------------------------------------

/// `(ac_rms, dc_mean)` of a block.
pub fn ac_dc(signal: &[f64]) -> (f64, f64) {
    if signal.is_empty() {
        return (0.0, 0.0);
    }
    let dc = signal.iter().sum::<f64>() / signal.len() as f64;
    let sum_sq: f64 = signal.iter().map(|&x| (x - dc) * (x - dc)).sum();
    ((sum_sq / signal.len() as f64).sqrt(), dc)
}

/// `R` for the two channels, or `None` when either channel has no usable pulse.
pub fn ratio_of_ratios(red_ac: f64, red_dc: f64, ir_ac: f64, ir_dc: f64) -> Option<f64> {
    if red_dc <= 0.0 || ir_dc <= 0.0 {
        return None;
    }
    let red_pi = red_ac / red_dc;
    let ir_pi = ir_ac / ir_dc;
    if red_pi < MIN_PERFUSION || ir_pi < MIN_PERFUSION {
        return None;
    }
    Some(red_pi / ir_pi)
}

/// Linear empirical calibration, clamped to 0..=100.
pub fn r_to_spo2(r: f64) -> f64 {
    (110.0 - 25.0 * r).clamp(0.0, 100.0)
}

/// Local maxima of the mean-removed signal above an adaptive threshold.
pub fn detect_peaks(signal: &[f64], fs: f64) -> Vec<usize> {
    if signal.len() < 3 || fs <= 0.0 {
        return Vec::new();
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    let centered: Vec<f64> = signal.iter().map(|&x| x - mean).collect();
    let max = centered.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let threshold = PEAK_THRESHOLD_FRACTION * max;
    let min_dist = ((fs * 60.0 / MAX_DETECTABLE_BPM) as usize).max(1);

    let mut peaks: Vec<usize> = Vec::new();
    for i in 1..centered.len() - 1 {
        let v = centered[i];
        if v > threshold && v > centered[i - 1] && v >= centered[i + 1] {
            match peaks.last().copied() {
                Some(last) if i - last < min_dist => {
                    if v > centered[last] {
                        peaks.pop();
                        peaks.push(i);
                    }
                }
                _ => peaks.push(i),
            }
        }
    }
    peaks
}

/// Mean peak-to-peak interval converted to BPM. Needs at least two peaks.
pub fn heart_rate_from_peaks(peaks: &[usize], fs: f64) -> Option<f64> {
    if peaks.len() < 2 || fs <= 0.0 {
        return None;
    }
    let span = (peaks[peaks.len() - 1] - peaks[0]) as f64;
    let mean_interval = span / (peaks.len() - 1) as f64;
    if mean_interval <= 0.0 {
        return None;
    }
    Some(60.0 * fs / mean_interval)
}
