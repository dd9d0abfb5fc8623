//! Station workflow: acquire, report, transmit with bounded retries.
//!
//! ```text
//! Idle ──edge──▶ AcquiringVitals ─▶ AcquiringWeight ─▶ AcquiringBP ─▶ Reporting
//!                                                                        │
//!   ┌──────────────────────────── Transmitting ◀─────────────────────────┘
//!   │ ok             fail, attempts left │ ▲            fail, exhausted
//!   ▼                                    ▼ │ backoff    ├─ Halt ─▶ Fault (terminal)
//! Done ─confirm─▶ Idle               RetryWait          └─ QueueAndIdle ─▶ Idle
//! ```
//!
//! Acquisition failures are soft: a stage that cannot read its sensor
//! forwards sentinel values and the cycle continues. Every transition
//! publishes one status event; the status channel never influences control
//! flow.

use std::collections::VecDeque;
use std::time::Duration;

use log::{info, warn};

use crate::aggregate::{self, AcquisitionTiming, Calibration};
use crate::clock::Clock;
use crate::config::DeviceProfile;
use crate::delivery::TelemetrySink;
use crate::error::SensorError;
use crate::input::Debouncer;
use crate::reading::{
    AttemptOutcome, BlockBuffers, BloodPressureReading, DeliveryAttempt, TelemetryRecord,
    VitalsReading, WeightReading,
};
use crate::retry::{OnExhaustion, RetryPolicy};
use crate::source::{BloodPressureProvider, PpgEstimator, PpgSource, StrainGaugeSource};
use crate::status::StatusChannel;

/// Workflow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    Idle,
    AcquiringVitals,
    AcquiringWeight,
    AcquiringBP,
    Reporting,
    Transmitting,
    RetryWait,
    /// Delivery exhausted under [`OnExhaustion::Halt`]. Left only by restart.
    Fault,
    Done,
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AcquiringVitals => write!(f, "acquiring_vitals"),
            Self::AcquiringWeight => write!(f, "acquiring_weight"),
            Self::AcquiringBP => write!(f, "acquiring_bp"),
            Self::Reporting => write!(f, "reporting"),
            Self::Transmitting => write!(f, "transmitting"),
            Self::RetryWait => write!(f, "retry_wait"),
            Self::Fault => write!(f, "fault"),
            Self::Done => write!(f, "done"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything one station measures with: sensor handles, the block buffers
/// lent to the aggregator, and the calibration of this unit.
///
/// A missing sensor is reported as [`SensorError::Unavailable`] and handled
/// like any other acquisition failure.
pub struct Session {
    ppg: Option<Box<dyn PpgSource>>,
    scale: Option<Box<dyn StrainGaugeSource>>,
    blood_pressure: Option<Box<dyn BloodPressureProvider>>,
    estimator: Box<dyn PpgEstimator>,
    buffers: BlockBuffers,
    calibration: Calibration,
    timing: AcquisitionTiming,
}

impl Session {
    pub fn new(
        estimator: Box<dyn PpgEstimator>,
        calibration: Calibration,
        timing: AcquisitionTiming,
    ) -> Self {
        Self {
            ppg: None,
            scale: None,
            blood_pressure: None,
            estimator,
            buffers: BlockBuffers::new(),
            calibration,
            timing,
        }
    }

    pub fn with_ppg(mut self, ppg: Box<dyn PpgSource>) -> Self {
        self.ppg = Some(ppg);
        self
    }

    pub fn with_scale(mut self, scale: Box<dyn StrainGaugeSource>) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_blood_pressure(mut self, provider: Box<dyn BloodPressureProvider>) -> Self {
        self.blood_pressure = Some(provider);
        self
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Names of the fitted sensors, for startup logging.
    pub fn sensor_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if let Some(p) = &self.ppg {
            names.push(p.name());
        }
        if let Some(s) = &self.scale {
            names.push(s.name());
        }
        if let Some(b) = &self.blood_pressure {
            names.push(b.info().name);
        }
        names
    }

    pub fn read_vitals(&mut self, clock: &dyn Clock) -> Result<VitalsReading, SensorError> {
        let ppg = self.ppg.as_deref_mut().ok_or(SensorError::Unavailable {
            sensor: "pulse_oximeter",
        })?;
        aggregate::read_vitals(
            ppg,
            self.estimator.as_mut(),
            &mut self.buffers,
            &self.timing,
            clock,
        )
    }

    pub fn read_weight(&mut self, clock: &dyn Clock) -> Result<WeightReading, SensorError> {
        let scale = self
            .scale
            .as_deref_mut()
            .ok_or(SensorError::Unavailable { sensor: "scale" })?;
        aggregate::read_weight(scale, &self.calibration, &self.timing, clock)
    }

    pub fn read_bp(&mut self) -> Result<BloodPressureReading, SensorError> {
        let provider = self
            .blood_pressure
            .as_deref_mut()
            .ok_or(SensorError::Unavailable {
                sensor: "blood_pressure",
            })?;
        aggregate::read_bp(provider)
    }
}

// ---------------------------------------------------------------------------
// Cycle results
// ---------------------------------------------------------------------------

/// How a measurement cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Delivered on this attempt number.
    Delivered { attempts: u32 },
    /// Attempts exhausted; the record waits in the unsent queue.
    Queued,
    /// Attempts exhausted; the station is in `Fault`.
    Halted,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub record: TelemetryRecord,
    pub outcome: CycleOutcome,
    /// Previously queued records delivered after this cycle's success.
    pub flushed: usize,
}

impl CycleReport {
    pub fn delivered(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Delivered { .. })
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Sequential state machine driving one station.
pub struct WorkflowController<C: Clock> {
    session: Session,
    serial: String,
    retry: RetryPolicy,
    stage_pause: Duration,
    confirm: Duration,
    sink: Box<dyn TelemetrySink>,
    status: StatusChannel,
    clock: C,
    state: WorkflowState,
    debouncer: Debouncer,
    attempts: Vec<DeliveryAttempt>,
    unsent: VecDeque<TelemetryRecord>,
}

impl<C: Clock> WorkflowController<C> {
    pub fn new(
        session: Session,
        profile: &DeviceProfile,
        sink: Box<dyn TelemetrySink>,
        status: StatusChannel,
        clock: C,
    ) -> Self {
        Self {
            session,
            serial: profile.serial.clone(),
            retry: profile.retry,
            stage_pause: profile.timing.stage_pause,
            confirm: profile.timing.confirm,
            sink,
            status,
            clock,
            state: WorkflowState::Idle,
            debouncer: Debouncer::new(profile.timing.debounce),
            attempts: Vec::new(),
            unsent: VecDeque::with_capacity(profile.retry.queue_capacity),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Delivery attempts of the most recent cycle, oldest first.
    pub fn attempts(&self) -> &[DeliveryAttempt] {
        &self.attempts
    }

    /// Records whose delivery was exhausted, oldest first.
    pub fn unsent(&self) -> &VecDeque<TelemetryRecord> {
        &self.unsent
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Feed one raw start-button level. Runs a full cycle on a debounced
    /// rising edge. Does nothing once the station is in `Fault`.
    pub fn poll(&mut self, level: bool) -> Option<CycleReport> {
        if self.state != WorkflowState::Idle {
            return None;
        }
        if !self.debouncer.update(level, self.clock.now()) {
            return None;
        }
        let report = self.run_cycle();
        // The button may still be held; require a release before the next press.
        self.debouncer.rearm(level);
        report
    }

    /// Run acquisition, reporting and delivery once, starting from `Idle`.
    /// Returns `None` without doing anything when not idle.
    pub fn run_cycle(&mut self) -> Option<CycleReport> {
        if self.state != WorkflowState::Idle {
            return None;
        }
        self.attempts.clear();

        let vitals = self.acquire_vitals();
        let weight = self.acquire_weight();
        let bp = self.acquire_bp();

        let record = TelemetryRecord::new(self.serial.clone(), vitals, weight, bp);
        self.report(&record);

        let (outcome, flushed) = self.transmit(&record);
        Some(CycleReport {
            record,
            outcome,
            flushed,
        })
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    fn enter(&mut self, state: WorkflowState, message: impl Into<String>) {
        self.state = state;
        self.status.publish(state, message);
    }

    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            self.clock.sleep(duration);
        }
    }

    fn acquire_vitals(&mut self) -> VitalsReading {
        self.enter(WorkflowState::AcquiringVitals, "Reading Heartrate and Oxygen");
        self.pause(self.stage_pause);
        match self.session.read_vitals(&self.clock) {
            Ok(reading) => {
                if !reading.valid {
                    self.status
                        .publish(self.state, "No reliable heart rate/SpO2 reading");
                }
                reading
            }
            Err(e) => {
                warn!("vitals acquisition failed: {e}");
                self.status
                    .publish(self.state, format!("Pulse oximeter error: {e}"));
                VitalsReading::sentinel()
            }
        }
    }

    fn acquire_weight(&mut self) -> WeightReading {
        self.enter(WorkflowState::AcquiringWeight, "Reading Weight");
        self.pause(self.stage_pause);
        self.session.read_weight(&self.clock).unwrap_or_else(|e| {
            warn!("weight acquisition failed: {e}");
            self.status.publish(self.state, format!("Scale error: {e}"));
            WeightReading::sentinel()
        })
    }

    fn acquire_bp(&mut self) -> BloodPressureReading {
        self.enter(WorkflowState::AcquiringBP, "Reading Blood Pressure");
        self.pause(self.stage_pause);
        self.session.read_bp().unwrap_or_else(|e| {
            warn!("blood pressure acquisition failed: {e}");
            self.status
                .publish(self.state, format!("Blood pressure error: {e}"));
            BloodPressureReading::sentinel()
        })
    }

    /// Exactly four summary lines.
    fn report(&mut self, record: &TelemetryRecord) {
        self.enter(
            WorkflowState::Reporting,
            format!("Avg HR: {}", record.heart_rate()),
        );
        self.pause(self.stage_pause);
        self.status
            .publish(self.state, format!("Avg SpO2: {}", record.spo2()));
        self.pause(self.stage_pause);
        self.status
            .publish(self.state, format!("Weight: {:.2}", record.weight()));
        self.pause(self.stage_pause);
        self.status.publish(
            self.state,
            format!(
                "Blood Pressure: {} / {}",
                record.systolic(),
                record.diastolic()
            ),
        );
        self.pause(self.stage_pause);
    }

    fn transmit(&mut self, record: &TelemetryRecord) -> (CycleOutcome, usize) {
        let max = self.retry.max_attempts;
        let mut attempt = 1;
        loop {
            self.enter(
                WorkflowState::Transmitting,
                format!("Sending attempt {attempt}/{max}"),
            );
            let result = self.sink.submit(record);
            self.attempts.push(DeliveryAttempt {
                record_id: record.id(),
                attempt_number: attempt,
                outcome: match &result {
                    Ok(()) => AttemptOutcome::Delivered,
                    Err(e) => AttemptOutcome::Failed(e.to_string()),
                },
            });

            match result {
                Ok(()) => {
                    info!("record {} delivered on attempt {attempt}/{max}", record.id());
                    let flushed = self.flush_unsent();
                    self.finish_delivered();
                    return (CycleOutcome::Delivered { attempts: attempt }, flushed);
                }
                Err(e) if self.retry.can_retry(attempt) => {
                    let delay = self.retry.backoff_after(attempt);
                    let msg = if delay.is_zero() {
                        format!("Attempt {attempt}/{max} failed: {e}; retrying")
                    } else {
                        format!(
                            "Attempt {attempt}/{max} failed: {e}; retrying in {}ms",
                            delay.as_millis()
                        )
                    };
                    self.enter(WorkflowState::RetryWait, msg);
                    self.pause(delay);
                    attempt += 1;
                }
                Err(e) => {
                    warn!("record {} undeliverable: {e}", record.id());
                    return (self.exhausted(record, attempt), 0);
                }
            }
        }
    }

    fn finish_delivered(&mut self) {
        self.enter(WorkflowState::Done, "Data sent");
        self.pause(self.confirm);
        self.enter(WorkflowState::Idle, "Ready");
    }

    fn exhausted(&mut self, record: &TelemetryRecord, attempts: u32) -> CycleOutcome {
        match self.retry.on_exhaustion {
            OnExhaustion::Halt => {
                self.enter(
                    WorkflowState::Fault,
                    format!("Delivery failed after {attempts} attempts; restart required"),
                );
                CycleOutcome::Halted
            }
            OnExhaustion::QueueAndIdle => {
                if self.retry.queue_capacity == 0 {
                    warn!("unsent queue disabled; dropping record {}", record.id());
                } else {
                    if self.unsent.len() >= self.retry.queue_capacity {
                        if let Some(dropped) = self.unsent.pop_front() {
                            warn!("unsent queue full; dropping record {}", dropped.id());
                        }
                    }
                    self.unsent.push_back(record.clone());
                }
                self.enter(
                    WorkflowState::Idle,
                    format!(
                        "Delivery failed after {attempts} attempts; {} unsent",
                        self.unsent.len()
                    ),
                );
                CycleOutcome::Queued
            }
        }
    }

    /// One attempt per queued record, oldest first; stops at the first failure.
    fn flush_unsent(&mut self) -> usize {
        let mut flushed = 0;
        while let Some(queued) = self.unsent.front() {
            self.status.publish(
                WorkflowState::Transmitting,
                format!("Sending queued record ({} left)", self.unsent.len()),
            );
            match self.sink.submit(queued) {
                Ok(()) => {
                    self.unsent.pop_front();
                    flushed += 1;
                }
                Err(e) => {
                    warn!("queued record not delivered: {e}");
                    break;
                }
            }
        }
        flushed
    }
}
