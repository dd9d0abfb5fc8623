//! # medhome-core
//!
//! **A home vitals station: heart rate, SpO2, weight and blood pressure.**
//!
//! `medhome-core` turns noisy sensor sample sequences into validated readings,
//! shows progress on a status channel and delivers each measurement to a
//! collection endpoint with a bounded number of attempts.
//!
//! ## Quick Start
//!
//! ```no_run
//! use medhome_core::{
//!     DeviceProfile, HttpDeliveryClient, LogSink, RatioOfRatiosEstimator, Session,
//!     StatusChannel, StubBloodPressure, SystemClock, WorkflowController,
//! };
//! use medhome_core::sim::{SimulatedPpg, SimulatedScale};
//!
//! let profile = DeviceProfile::default();
//! let session = Session::new(
//!     Box::new(RatioOfRatiosEstimator::new(profile.estimator.sample_rate_hz)),
//!     profile.calibration,
//!     profile.timing.acquisition(),
//! )
//! .with_ppg(Box::new(SimulatedPpg::new(72.0, 97.0, 25.0)))
//! .with_scale(Box::new(SimulatedScale::new(70.0, &profile.calibration)))
//! .with_blood_pressure(Box::new(StubBloodPressure::default()));
//!
//! let sink = HttpDeliveryClient::new(profile.endpoint.clone()).unwrap();
//! let status = StatusChannel::new().with(LogSink);
//! let mut station = WorkflowController::new(session, &profile, Box::new(sink), status, SystemClock);
//! let report = station.run_cycle();
//! ```
//!
//! ## Architecture
//!
//! Sensors → [`aggregate`] → [`TelemetryRecord`] → [`TelemetrySink`]
//!
//! The [`WorkflowController`] drives one cycle at a time on a single thread.
//! Everything that waits goes through a [`Clock`], so whole cycles run
//! instantly under [`ManualClock`] in tests.

pub mod aggregate;
pub mod bp;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod delivery;
pub mod error;
pub mod estimator;
pub mod input;
pub mod reading;
pub mod retry;
pub mod schema;
pub mod sim;
pub mod source;
pub mod status;
pub mod workflow;

pub use aggregate::{AcquisitionTiming, Calibration};
pub use bp::{CuffBloodPressure, StubBloodPressure};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BpMode, DeviceProfile};
pub use connectivity::{ConnectivityConfig, LinkState, NetworkLink, OnConnectTimeout};
pub use delivery::{EndpointConfig, HttpDeliveryClient, OfflineSink, TelemetrySink};
pub use error::{ConfigError, ConnectivityError, DeliveryError, SensorError};
pub use estimator::RatioOfRatiosEstimator;
pub use input::{Debouncer, StartButton};
pub use reading::{
    BloodPressureReading, DeliveryAttempt, TelemetryRecord, VitalsReading, WeightReading,
};
pub use retry::{MAX_ATTEMPTS, OnExhaustion, RetryPolicy};
pub use schema::{LegacyPayload, SchemaVersion, V1Payload};
pub use source::{
    BloodPressureProvider, CuffPeripheral, PpgEstimate, PpgEstimator, PpgSource, SensorInfo,
    SensorKind, StrainGaugeSource,
};
pub use status::{EventLog, LineDisplay, LogSink, StatusChannel, StatusEvent, StatusSink};
pub use workflow::{CycleOutcome, CycleReport, Session, WorkflowController, WorkflowState};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
