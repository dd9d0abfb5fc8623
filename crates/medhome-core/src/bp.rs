//! Blood-pressure providers: a fixed stub and an external cuff module.

use std::time::Duration;

use log::info;

use crate::clock::Clock;
use crate::error::SensorError;
use crate::reading::BloodPressureReading;
use crate::source::{BloodPressureProvider, CuffPeripheral, SensorInfo, SensorKind};

/// Width of the trigger pulse sent to the cuff module.
pub const DEFAULT_TRIGGER_PULSE: Duration = Duration::from_millis(100);
/// Fixed measurement window of the cuff module.
pub const DEFAULT_MEASUREMENT_WINDOW: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Stub
// ---------------------------------------------------------------------------

/// Returns the same reading every time. Used for integration testing and on
/// stations without a cuff.
#[derive(Debug, Clone, Copy)]
pub struct StubBloodPressure {
    reading: BloodPressureReading,
}

static STUB_INFO: SensorInfo = SensorInfo {
    name: "bp_stub",
    description: "Fixed blood-pressure value",
    kind: SensorKind::BloodPressureCuff,
    simulated: true,
};

impl StubBloodPressure {
    pub fn new(systolic: i32, diastolic: i32) -> Self {
        Self {
            reading: BloodPressureReading {
                systolic,
                diastolic,
            },
        }
    }
}

impl Default for StubBloodPressure {
    fn default() -> Self {
        Self::new(120, 80)
    }
}

impl BloodPressureProvider for StubBloodPressure {
    fn info(&self) -> &SensorInfo {
        &STUB_INFO
    }

    fn measure(&mut self) -> Result<BloodPressureReading, SensorError> {
        Ok(self.reading)
    }
}

// ---------------------------------------------------------------------------
// Cuff
// ---------------------------------------------------------------------------

/// External cuff module started by a digital pulse.
///
/// The module runs a fixed-length measurement with no early completion
/// signal, so `measure` always blocks for the whole window.
pub struct CuffBloodPressure<P, C> {
    peripheral: P,
    clock: C,
    pulse: Duration,
    window: Duration,
}

static CUFF_INFO: SensorInfo = SensorInfo {
    name: "bp_cuff",
    description: "Pulse-triggered oscillometric cuff module",
    kind: SensorKind::BloodPressureCuff,
    simulated: false,
};

impl<P: CuffPeripheral, C: Clock> CuffBloodPressure<P, C> {
    pub fn new(peripheral: P, clock: C) -> Self {
        Self::with_timing(peripheral, clock, DEFAULT_TRIGGER_PULSE, DEFAULT_MEASUREMENT_WINDOW)
    }

    pub fn with_timing(peripheral: P, clock: C, pulse: Duration, window: Duration) -> Self {
        Self {
            peripheral,
            clock,
            pulse,
            window,
        }
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }
}

impl<P: CuffPeripheral, C: Clock> BloodPressureProvider for CuffBloodPressure<P, C> {
    fn info(&self) -> &SensorInfo {
        &CUFF_INFO
    }

    fn measure(&mut self) -> Result<BloodPressureReading, SensorError> {
        self.peripheral.set_trigger(true);
        self.clock.sleep(self.pulse);
        self.peripheral.set_trigger(false);

        info!("bp cuff triggered; waiting {}s", self.window.as_secs());
        self.clock.sleep(self.window);

        self.peripheral.read_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[derive(Default)]
    struct FakeCuff {
        edges: Vec<bool>,
        result: Option<BloodPressureReading>,
    }

    impl CuffPeripheral for FakeCuff {
        fn set_trigger(&mut self, high: bool) {
            self.edges.push(high);
        }

        fn read_result(&mut self) -> Result<BloodPressureReading, SensorError> {
            self.result.ok_or(SensorError::Peripheral {
                sensor: "bp_cuff",
                detail: "no result latched".to_string(),
            })
        }
    }

    #[test]
    fn test_stub_returns_fixed_value() {
        let mut stub = StubBloodPressure::default();
        let r = stub.measure().unwrap();
        assert_eq!((r.systolic, r.diastolic), (120, 80));
        assert_eq!(stub.measure().unwrap(), r);
    }

    #[test]
    fn test_cuff_pulses_then_waits_full_window() {
        let clock = ManualClock::new();
        let cuff = FakeCuff {
            result: Some(BloodPressureReading {
                systolic: 131,
                diastolic: 84,
            }),
            ..Default::default()
        };
        let mut bp = CuffBloodPressure::new(cuff, &clock);
        let r = bp.measure().unwrap();

        assert_eq!(r.systolic, 131);
        assert_eq!(bp.peripheral().edges, vec![true, false]);
        assert_eq!(
            clock.total_slept(),
            DEFAULT_TRIGGER_PULSE + DEFAULT_MEASUREMENT_WINDOW
        );
    }

    #[test]
    fn test_cuff_without_result_is_error() {
        let clock = ManualClock::new();
        let mut bp = CuffBloodPressure::new(FakeCuff::default(), &clock);
        assert!(matches!(
            bp.measure(),
            Err(SensorError::Peripheral { .. })
        ));
    }
}
