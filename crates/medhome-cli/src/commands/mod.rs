pub mod measure;
pub mod profile;
pub mod run;
pub mod serve;
pub mod submit;

use std::path::Path;

use medhome_core::sim::{SimulatedCuff, SimulatedPpg, SimulatedScale};
use medhome_core::{
    BpMode, CuffBloodPressure, DeliveryError, DeviceProfile, HttpDeliveryClient, LineDisplay,
    OfflineSink, RatioOfRatiosEstimator, SchemaVersion, Session, StatusEvent, StatusSink,
    StubBloodPressure, SystemClock, TelemetryRecord, TelemetrySink, WorkflowState,
};

use crate::{EndpointArgs, SimArgs};

/// Load the profile (or defaults) and apply endpoint overrides. Exits on error.
pub fn load_profile(path: Option<&Path>, endpoint: &EndpointArgs) -> DeviceProfile {
    let mut profile = match path {
        Some(p) => match DeviceProfile::load(p) {
            Ok(profile) => profile,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => DeviceProfile::default(),
    };
    if let Err(e) = apply_endpoint_overrides(&mut profile, endpoint) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    profile
}

/// Command-line flags win over the profile file.
pub fn apply_endpoint_overrides(
    profile: &mut DeviceProfile,
    args: &EndpointArgs,
) -> Result<(), String> {
    if let Some(url) = &args.endpoint {
        profile.endpoint.base_url = url.clone();
    }
    if let Some(schema) = &args.schema {
        profile.endpoint.schema = schema.parse::<SchemaVersion>()?;
    }
    profile.validate().map_err(|e| e.to_string())
}

/// Session wired to simulated peripherals for the sensors the profile lists.
pub fn simulated_session(profile: &DeviceProfile, sim: &SimArgs) -> Session {
    let fs = profile.estimator.sample_rate_hz;
    let mut session = Session::new(
        Box::new(RatioOfRatiosEstimator::new(fs)),
        profile.calibration,
        profile.timing.acquisition(),
    );

    if profile.sensors.pulse_oximeter {
        session = session.with_ppg(Box::new(
            SimulatedPpg::new(sim.hr, sim.spo2, fs).with_noise(sim.noise),
        ));
    }
    if profile.sensors.scale {
        session = session.with_scale(Box::new(
            SimulatedScale::new(sim.weight, &profile.calibration).with_noise(sim.noise),
        ));
    }

    let bp = &profile.sensors.blood_pressure;
    match bp.mode {
        BpMode::Stub => {
            session = session.with_blood_pressure(Box::new(StubBloodPressure::new(
                bp.stub_systolic,
                bp.stub_diastolic,
            )));
        }
        BpMode::Cuff => {
            let cuff = SimulatedCuff::new(bp.stub_systolic, bp.stub_diastolic);
            session = session.with_blood_pressure(Box::new(CuffBloodPressure::with_timing(
                cuff,
                SystemClock,
                medhome_core::bp::DEFAULT_TRIGGER_PULSE,
                bp.window,
            )));
        }
        BpMode::Absent => {}
    }
    session
}

/// HTTP client for the profile's endpoint, or an always-failing sink when offline.
pub fn make_sink(profile: &DeviceProfile, online: bool) -> Box<dyn TelemetrySink> {
    if !online {
        return Box::new(OfflineSink);
    }
    match HttpDeliveryClient::new(profile.endpoint.clone()) {
        Ok(client) => Box::new(client),
        Err(e) => {
            eprintln!("Error creating HTTP client: {e}");
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Terminal output
// ---------------------------------------------------------------------------

/// One status event as a terminal line.
pub fn format_event(event: &StatusEvent) -> String {
    let marker = match event.state {
        WorkflowState::Fault => "✗",
        WorkflowState::RetryWait => "!",
        WorkflowState::Done => "✓",
        _ => " ",
    };
    format!("{marker} {:<17} {}", event.state.to_string(), event.message)
}

/// Status sink printing each event to stdout, mirrored onto a line display
/// model so a configured width truncates the same way the panel would.
pub struct TerminalDisplay {
    panel: LineDisplay,
}

impl TerminalDisplay {
    pub fn new(profile: &DeviceProfile) -> Self {
        Self {
            panel: LineDisplay::new(profile.display.rows, profile.display.width),
        }
    }
}

impl StatusSink for TerminalDisplay {
    fn emit(&mut self, event: &StatusEvent) {
        self.panel.emit(event);
        let shown = self.panel.lines().last().unwrap_or_default().to_string();
        println!(
            "{}",
            format_event(&StatusEvent {
                state: event.state,
                message: shown,
            })
        );
    }
}

/// Prints the encoded payload instead of sending it. Always succeeds.
pub struct PrintSink {
    schema: SchemaVersion,
    route: String,
}

impl PrintSink {
    pub fn new(profile: &DeviceProfile) -> Self {
        Self {
            schema: profile.endpoint.schema,
            route: profile.endpoint.url(),
        }
    }
}

impl TelemetrySink for PrintSink {
    fn submit(&mut self, record: &TelemetryRecord) -> Result<(), DeliveryError> {
        let body = self.schema.encode(record)?;
        println!("(dry run) POST {}", self.route);
        println!("{}", serde_json::to_string_pretty(&body)?);
        Ok(())
    }
}
