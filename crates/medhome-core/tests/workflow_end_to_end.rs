//! Integration tests for medhome-core.
//!
//! A full station cycle driven through the public API:
//! start edge → vitals → weight → blood pressure → report → transmit.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use medhome_core::sim::{ScriptedButton, SimulatedPpg};
use medhome_core::{
    Calibration, CycleOutcome, DeliveryError, DeviceProfile, EventLog, LineDisplay, ManualClock,
    PpgEstimate, PpgEstimator, RetryPolicy, SensorError, SensorInfo, SensorKind, Session,
    StartButton, StatusChannel, StrainGaugeSource, StubBloodPressure, TelemetryRecord,
    TelemetrySink, WorkflowController, WorkflowState,
};

/// Replays one estimate per block.
struct ScriptedEstimator {
    script: Vec<PpgEstimate>,
    next: usize,
}

impl PpgEstimator for ScriptedEstimator {
    fn estimate(&mut self, _ir: &[u32], _red: &[u32]) -> PpgEstimate {
        let out = self.script[self.next % self.script.len()];
        self.next += 1;
        out
    }
}

static FIXED_SCALE: SensorInfo = SensorInfo {
    name: "fixed_scale",
    description: "constant strain-gauge count",
    kind: SensorKind::StrainGauge,
    simulated: true,
};

struct FixedScale(i32);

impl StrainGaugeSource for FixedScale {
    fn info(&self) -> &SensorInfo {
        &FIXED_SCALE
    }

    fn read_raw(&mut self, _timeout: Duration) -> Result<i32, SensorError> {
        Ok(self.0)
    }
}

/// Fails the first `failures` submissions and keeps every record it saw.
struct RecordingSink {
    failures: u32,
    calls: Rc<Cell<u32>>,
    accepted: Rc<RefCell<Vec<TelemetryRecord>>>,
}

impl TelemetrySink for RecordingSink {
    fn submit(&mut self, record: &TelemetryRecord) -> Result<(), DeliveryError> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        if n <= self.failures {
            return Err(DeliveryError::Transport("connection reset".to_string()));
        }
        self.accepted.borrow_mut().push(record.clone());
        Ok(())
    }
}

fn block(hr: i32, spo2: i32, valid: bool) -> PpgEstimate {
    PpgEstimate {
        heart_rate: hr,
        spo2,
        hr_valid: valid,
        spo2_valid: valid,
    }
}

#[test]
fn start_edge_to_done_with_two_failed_sends() {
    let profile = DeviceProfile::from_toml(
        r#"
serial = "1"

[calibration]
zero_offset = 298.0
scale_ratio = 10.0

[retry]
initial_backoff_ms = 0

[timing]
block_pause_ms = 0
weight_pause_ms = 0
stage_pause_ms = 0
confirm_ms = 1000
"#,
    )
    .unwrap();

    let estimator = ScriptedEstimator {
        script: vec![
            block(80, 95, true),
            block(82, 96, true),
            block(0, 0, false),
            block(81, 94, true),
            block(79, 95, true),
        ],
        next: 0,
    };
    let session = Session::new(
        Box::new(estimator),
        profile.calibration,
        profile.timing.acquisition(),
    )
    .with_ppg(Box::new(SimulatedPpg::new(80.0, 95.0, 25.0)))
    .with_scale(Box::new(FixedScale(1000)))
    .with_blood_pressure(Box::new(StubBloodPressure::new(120, 80)));

    let calls = Rc::new(Cell::new(0));
    let accepted = Rc::new(RefCell::new(Vec::new()));
    let sink = RecordingSink {
        failures: 2,
        calls: calls.clone(),
        accepted: accepted.clone(),
    };

    let log = Rc::new(RefCell::new(EventLog::new()));
    let display = Rc::new(RefCell::new(LineDisplay::new(2, Some(16))));
    let status = StatusChannel::new().with(log.clone()).with(display.clone());

    let clock = ManualClock::new();
    let mut station = WorkflowController::new(session, &profile, Box::new(sink), status, &clock);

    let mut button = ScriptedButton::presses(1, 10, 10);
    let mut report = None;
    while button.remaining() > 0 {
        if let Some(r) = station.poll(button.is_pressed()) {
            report = Some(r);
        }
        clock.advance(Duration::from_millis(10));
    }
    let report = report.expect("a debounced press should start a cycle");

    let record = &report.record;
    assert_eq!(record.heart_rate(), 80);
    assert_eq!(record.spo2(), 95);
    assert!(record.vitals_valid());
    assert!((record.weight() - 70.2).abs() < 1e-9);
    assert_eq!((record.systolic(), record.diastolic()), (120, 80));

    assert_eq!(report.outcome, CycleOutcome::Delivered { attempts: 3 });
    assert_eq!(calls.get(), 3);
    assert_eq!(accepted.borrow().len(), 1);
    assert_eq!(accepted.borrow()[0].id(), record.id());
    assert_eq!(station.attempts().len(), 3);

    let log = log.borrow();
    assert_eq!(
        log.messages_in(WorkflowState::Reporting),
        vec![
            "Avg HR: 80",
            "Avg SpO2: 95",
            "Weight: 70.20",
            "Blood Pressure: 120 / 80",
        ]
    );

    let states: Vec<WorkflowState> = log.events().iter().map(|e| e.state).collect();
    let done = states
        .iter()
        .position(|s| *s == WorkflowState::Done)
        .expect("cycle should reach Done");
    assert_eq!(states[done + 1], WorkflowState::Idle);
    assert_eq!(station.state(), WorkflowState::Idle);
    assert!(clock.total_slept() >= Duration::from_secs(1));

    // The narrow display only holds the last two lines, truncated.
    let shown: Vec<String> = display.borrow().lines().map(str::to_string).collect();
    assert_eq!(shown, vec!["Data sent".to_string(), "Ready".to_string()]);
}

#[test]
fn held_button_does_not_retrigger() {
    let profile = DeviceProfile {
        retry: RetryPolicy::immediate(1),
        timing: medhome_core::config::TimingConfig::instant(),
        calibration: Calibration {
            zero_offset: 0.0,
            scale_ratio: 1.0,
        },
        ..DeviceProfile::default()
    };
    let session = Session::new(
        Box::new(ScriptedEstimator {
            script: vec![block(70, 97, true)],
            next: 0,
        }),
        profile.calibration,
        profile.timing.acquisition(),
    )
    .with_ppg(Box::new(SimulatedPpg::new(70.0, 97.0, 25.0)))
    .with_scale(Box::new(FixedScale(65)))
    .with_blood_pressure(Box::new(StubBloodPressure::default()));

    let calls = Rc::new(Cell::new(0));
    let sink = RecordingSink {
        failures: 0,
        calls: calls.clone(),
        accepted: Rc::new(RefCell::new(Vec::new())),
    };
    let clock = ManualClock::new();
    let mut station =
        WorkflowController::new(session, &profile, Box::new(sink), StatusChannel::new(), &clock);

    // Low, then held high for two seconds, then two clean presses.
    let mut levels = vec![false; 5];
    levels.extend(std::iter::repeat_n(true, 200));
    let mut button = ScriptedButton::new(levels);
    for _ in 0..205 {
        station.poll(button.is_pressed());
        clock.advance(Duration::from_millis(10));
    }
    assert_eq!(calls.get(), 1);

    let mut button = ScriptedButton::presses(2, 10, 10);
    while button.remaining() > 0 {
        station.poll(button.is_pressed());
        clock.advance(Duration::from_millis(10));
    }
    assert_eq!(calls.get(), 3);
}

#[test]
fn halted_station_ignores_presses() {
    let profile = DeviceProfile {
        retry: RetryPolicy::immediate(11),
        timing: medhome_core::config::TimingConfig::instant(),
        ..DeviceProfile::default()
    };
    let session = Session::new(
        Box::new(ScriptedEstimator {
            script: vec![block(70, 97, true)],
            next: 0,
        }),
        profile.calibration,
        profile.timing.acquisition(),
    );
    let calls = Rc::new(Cell::new(0));
    let sink = RecordingSink {
        failures: u32::MAX,
        calls: calls.clone(),
        accepted: Rc::new(RefCell::new(Vec::new())),
    };
    let clock = ManualClock::new();
    let mut station =
        WorkflowController::new(session, &profile, Box::new(sink), StatusChannel::new(), &clock);

    let mut button = ScriptedButton::presses(3, 10, 10);
    while button.remaining() > 0 {
        station.poll(button.is_pressed());
        clock.advance(Duration::from_millis(10));
    }
    assert_eq!(station.state(), WorkflowState::Fault);
    assert_eq!(calls.get(), 11);
}
