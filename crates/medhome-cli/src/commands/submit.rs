use std::path::Path;

use medhome_core::{
    BloodPressureReading, TelemetryRecord, TelemetrySink, VitalsReading, WeightReading,
};

use crate::EndpointArgs;

/// Values typed in on the command line.
pub struct ManualReading {
    pub serial: Option<String>,
    pub hr: i32,
    pub spo2: i32,
    pub weight: f64,
    pub systolic: i32,
    pub diastolic: i32,
}

impl ManualReading {
    fn into_record(self, default_serial: &str) -> TelemetryRecord {
        let vitals = VitalsReading {
            heart_rate_bpm: self.hr,
            spo2_percent: self.spo2,
            valid: VitalsReading::in_range(self.hr, self.spo2),
        };
        TelemetryRecord::new(
            self.serial.unwrap_or_else(|| default_serial.to_string()),
            vitals,
            WeightReading {
                weight: self.weight,
            },
            BloodPressureReading {
                systolic: self.systolic,
                diastolic: self.diastolic,
            },
        )
    }
}

pub fn run(config: Option<&Path>, endpoint: &EndpointArgs, reading: ManualReading) {
    let profile = super::load_profile(config, endpoint);
    let record = reading.into_record(&profile.serial);

    if !record.vitals_valid() {
        eprintln!(
            "Warning: HR {} / SpO2 {} is outside the accepted range; sending flagged",
            record.heart_rate(),
            record.spo2()
        );
    }

    let mut sink = super::make_sink(&profile, true);
    println!("POST {}", profile.endpoint.url());
    match sink.submit(&record) {
        Ok(()) => println!("Delivered record {}", record.id()),
        Err(e) => {
            eprintln!("Delivery failed: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_reading_uses_profile_serial() {
        let r = ManualReading {
            serial: None,
            hr: 72,
            spo2: 97,
            weight: 70.0,
            systolic: 120,
            diastolic: 80,
        }
        .into_record("17");
        assert_eq!(r.device_serial(), "17");
        assert!(r.vitals_valid());
    }

    #[test]
    fn test_out_of_range_manual_reading_is_flagged() {
        let r = ManualReading {
            serial: Some("3".to_string()),
            hr: 250,
            spo2: 97,
            weight: 70.0,
            systolic: 120,
            diastolic: 80,
        }
        .into_record("17");
        assert_eq!(r.device_serial(), "3");
        assert!(!r.vitals_valid());
    }
}
