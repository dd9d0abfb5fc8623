//! Weekly trend analysis over a device's most recent readings.
//!
//! One reading per day is assumed, so the last [`WINDOW`] readings are one
//! week. Slopes come from an ordinary least-squares line through
//! `(day, value)` with days numbered from 1.

use serde::Serialize;

use crate::StoredReading;

/// Readings per analysis window.
pub const WINDOW: usize = 7;

/// Weight slope (units per day) beyond which a change is steep.
pub const WEIGHT_SLOPE_LIMIT: f64 = 2.0;
/// Heart-rate slope (BPM per day) beyond which a trend is reported.
pub const HR_SLOPE_LIMIT: f64 = 5.0;
/// SpO2 at or below this is a low reading.
pub const SPO2_LOW: i32 = 94;
/// More than this many low SpO2 readings per week is flagged.
pub const SPO2_LOW_DAYS: usize = 4;
/// Systolic and diastolic both above these is an elevated reading.
pub const BP_SYSTOLIC_HIGH: i32 = 130;
pub const BP_DIASTOLIC_HIGH: i32 = 80;
/// This many elevated readings per week is flagged.
pub const BP_HIGH_DAYS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Normal,
    SteepDecrease,
    SteepIncrease,
    /// Heart rate falling: cardiovascular health improving.
    Improving,
    Low,
    Abnormal,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub trend: Trend,
    pub message: &'static str,
    /// Fitted slope per day, where a slope was computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slope: Option<f64>,
}

impl Finding {
    fn new(trend: Trend, message: &'static str) -> Self {
        Self {
            trend,
            message,
            slope: None,
        }
    }

    fn with_slope(mut self, slope: f64) -> Self {
        self.slope = Some(slope);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyAnalysis {
    pub readings: usize,
    pub weight: Finding,
    pub heart_rate: Finding,
    pub spo2: Finding,
    pub blood_pressure: Finding,
}

impl WeeklyAnalysis {
    pub fn flagged(&self) -> bool {
        [&self.weight, &self.heart_rate, &self.spo2, &self.blood_pressure]
            .iter()
            .any(|f| {
                matches!(
                    f.trend,
                    Trend::SteepDecrease | Trend::SteepIncrease | Trend::Low | Trend::Abnormal
                )
            })
    }
}

/// Slope of the least-squares line through `(1, y0), (2, y1), ...`.
pub fn linear_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let n_f = n as f64;
    let mean_x = (n_f + 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n_f;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        let dx = (i + 1) as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }
    Some(sxy / sxx)
}

/// Analyze the last [`WINDOW`] readings (oldest first).
///
/// Readings without valid vitals are left out of the heart-rate and SpO2
/// checks; sentinel weights are left out of the weight trend.
pub fn analyze(history: &[StoredReading]) -> WeeklyAnalysis {
    let week = &history[history.len().saturating_sub(WINDOW)..];
    if week.len() < WINDOW {
        let insufficient = || Finding::new(Trend::InsufficientData, "Not enough readings yet.");
        return WeeklyAnalysis {
            readings: week.len(),
            weight: insufficient(),
            heart_rate: insufficient(),
            spo2: insufficient(),
            blood_pressure: insufficient(),
        };
    }

    let weights: Vec<f64> = week
        .iter()
        .filter(|r| r.weight >= 0.0)
        .map(|r| r.weight)
        .collect();
    let heart_rates: Vec<f64> = week
        .iter()
        .filter(|r| r.vitals_valid)
        .map(|r| f64::from(r.heart_rate))
        .collect();

    WeeklyAnalysis {
        readings: week.len(),
        weight: weight_trend(&weights),
        heart_rate: heart_rate_trend(&heart_rates),
        spo2: spo2_level(week),
        blood_pressure: blood_pressure_level(week),
    }
}

fn weight_trend(weights: &[f64]) -> Finding {
    let Some(m) = linear_slope(weights) else {
        return Finding::new(Trend::InsufficientData, "Not enough weight readings.");
    };
    let finding = if m < -WEIGHT_SLOPE_LIMIT {
        Finding::new(
            Trend::SteepDecrease,
            "Weight loss in the past week is too steep. Please refer to a doctor.",
        )
    } else if m > WEIGHT_SLOPE_LIMIT {
        Finding::new(
            Trend::SteepIncrease,
            "Weight gain in the past week is too steep. Please refer to a doctor.",
        )
    } else {
        Finding::new(Trend::Normal, "Weight trends are normal.")
    };
    finding.with_slope(m)
}

fn heart_rate_trend(heart_rates: &[f64]) -> Finding {
    let Some(m) = linear_slope(heart_rates) else {
        return Finding::new(Trend::InsufficientData, "Not enough heart rate readings.");
    };
    let finding = if m < -HR_SLOPE_LIMIT {
        Finding::new(
            Trend::Improving,
            "Heart rate decreased overall in the past week. Cardiovascular health is getting better.",
        )
    } else if m > HR_SLOPE_LIMIT {
        Finding::new(
            Trend::SteepIncrease,
            "Heart rate increase in the past week is too steep. Please refer to a doctor.",
        )
    } else {
        Finding::new(Trend::Normal, "Heart rate trends are normal.")
    };
    finding.with_slope(m)
}

fn spo2_level(week: &[StoredReading]) -> Finding {
    let low = week
        .iter()
        .filter(|r| r.vitals_valid && r.spo2 <= SPO2_LOW)
        .count();
    if low > SPO2_LOW_DAYS {
        Finding::new(
            Trend::Low,
            "Oxygen levels are too low in the past week. Please refer to a doctor.",
        )
    } else {
        Finding::new(Trend::Normal, "Oxygen levels are normal.")
    }
}

fn blood_pressure_level(week: &[StoredReading]) -> Finding {
    let high = week
        .iter()
        .filter(|r| r.systolic > BP_SYSTOLIC_HIGH && r.diastolic > BP_DIASTOLIC_HIGH)
        .count();
    if high >= BP_HIGH_DAYS {
        Finding::new(
            Trend::Abnormal,
            "Blood pressure levels are abnormal in the past week. Please refer to a doctor.",
        )
    } else {
        Finding::new(Trend::Normal, "Blood pressure levels are normal.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reading(hr: i32, spo2: i32, weight: f64, sys: i32, dia: i32) -> StoredReading {
        StoredReading {
            device_serial: "1".to_string(),
            schema_version: 1,
            heart_rate: hr,
            spo2,
            weight,
            systolic: sys,
            diastolic: dia,
            vitals_valid: true,
        }
    }

    fn steady_week() -> Vec<StoredReading> {
        (0..7).map(|_| reading(72, 97, 70.0, 120, 80)).collect()
    }

    #[test]
    fn test_slope_of_line() {
        assert_relative_eq!(linear_slope(&[1.0, 3.0, 5.0, 7.0]).unwrap(), 2.0);
        assert_relative_eq!(linear_slope(&[4.0; 7]).unwrap(), 0.0);
        assert!(linear_slope(&[1.0]).is_none());
    }

    #[test]
    fn test_short_history_is_insufficient() {
        let a = analyze(&steady_week()[..6]);
        assert_eq!(a.readings, 6);
        assert_eq!(a.weight.trend, Trend::InsufficientData);
        assert!(!a.flagged());
    }

    #[test]
    fn test_steady_week_is_normal() {
        let a = analyze(&steady_week());
        assert_eq!(a.weight.trend, Trend::Normal);
        assert_eq!(a.heart_rate.trend, Trend::Normal);
        assert_eq!(a.spo2.trend, Trend::Normal);
        assert_eq!(a.blood_pressure.trend, Trend::Normal);
        assert!(!a.flagged());
    }

    #[test]
    fn test_weight_gain_is_steep() {
        let week: Vec<_> = (0..7)
            .map(|d| reading(72, 97, 70.0 + 3.0 * d as f64, 120, 80))
            .collect();
        let a = analyze(&week);
        assert_eq!(a.weight.trend, Trend::SteepIncrease);
        assert_relative_eq!(a.weight.slope.unwrap(), 3.0, epsilon = 1e-9);
        assert!(a.flagged());
    }

    #[test]
    fn test_falling_heart_rate_is_improving() {
        let week: Vec<_> = (0..7)
            .map(|d| reading(110 - 6 * d, 97, 70.0, 120, 80))
            .collect();
        assert_eq!(analyze(&week).heart_rate.trend, Trend::Improving);
    }

    #[test]
    fn test_five_low_spo2_days_flagged() {
        let mut week = steady_week();
        for r in week.iter_mut().take(5) {
            r.spo2 = 94;
        }
        assert_eq!(analyze(&week).spo2.trend, Trend::Low);
        week[0].spo2 = 95;
        assert_eq!(analyze(&week).spo2.trend, Trend::Normal);
    }

    #[test]
    fn test_four_high_bp_days_flagged() {
        let mut week = steady_week();
        for r in week.iter_mut().take(4) {
            r.systolic = 135;
            r.diastolic = 85;
        }
        assert_eq!(analyze(&week).blood_pressure.trend, Trend::Abnormal);
    }

    #[test]
    fn test_only_last_week_counts() {
        let mut history: Vec<_> = (0..7).map(|_| reading(72, 90, 70.0, 120, 80)).collect();
        history.extend(steady_week());
        let a = analyze(&history);
        assert_eq!(a.readings, 7);
        assert_eq!(a.spo2.trend, Trend::Normal);
    }

    #[test]
    fn test_invalid_vitals_skipped() {
        let mut week = steady_week();
        for r in week.iter_mut().take(5) {
            r.heart_rate = -1;
            r.spo2 = -1;
            r.vitals_valid = false;
        }
        let a = analyze(&week);
        assert_eq!(a.spo2.trend, Trend::Normal);
        assert_eq!(a.heart_rate.trend, Trend::Normal);
    }
}
