//! Device profile: every per-station parameter in one TOML document.
//!
//! One profile replaces what used to be separate firmware builds per
//! deployment (different calibration constants, payload keys, presence of
//! the retry loop). Every field has a default, so an empty file is a valid
//! profile for serial `"1"`.
//!
//! ```toml
//! serial = "17"
//!
//! [calibration]
//! zero_offset = 197995.84
//! scale_ratio = 1365.92567568
//!
//! [endpoint]
//! base_url = "https://collector.example"
//! schema = "v1"
//! timeout_ms = 10000
//!
//! [retry]
//! max_attempts = 11
//! on_exhaustion = "queue_and_idle"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregate::{AcquisitionTiming, Calibration};
use crate::connectivity::ConnectivityConfig;
use crate::delivery::EndpointConfig;
use crate::error::ConfigError;
use crate::input::DEFAULT_DEBOUNCE;
use crate::retry::RetryPolicy;

/// Complete station configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// Serial number reported with every record.
    pub serial: String,
    pub sensors: SensorSet,
    pub calibration: Calibration,
    pub endpoint: EndpointConfig,
    pub retry: RetryPolicy,
    pub connectivity: ConnectivityConfig,
    pub timing: TimingConfig,
    pub display: DisplayConfig,
    pub estimator: EstimatorConfig,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            serial: "1".to_string(),
            sensors: SensorSet::default(),
            calibration: Calibration::default(),
            endpoint: EndpointConfig::default(),
            retry: RetryPolicy::default(),
            connectivity: ConnectivityConfig::default(),
            timing: TimingConfig::default(),
            display: DisplayConfig::default(),
            estimator: EstimatorConfig::default(),
        }
    }
}

impl DeviceProfile {
    /// Read, parse, and validate a TOML profile.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let profile: Self = toml::from_str(text)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values that would make the station misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.trim().is_empty() {
            return Err(ConfigError::Invalid("serial must not be empty".into()));
        }
        if self.calibration.scale_ratio == 0.0 || !self.calibration.scale_ratio.is_finite() {
            return Err(ConfigError::Invalid(
                "calibration.scale_ratio must be a non-zero finite number".into(),
            ));
        }
        if !self.calibration.zero_offset.is_finite() {
            return Err(ConfigError::Invalid(
                "calibration.zero_offset must be finite".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be >= 1".into()));
        }
        if self.endpoint.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint.base_url must not be empty".into()));
        }
        if self.estimator.sample_rate_hz <= 0.0 {
            return Err(ConfigError::Invalid(
                "estimator.sample_rate_hz must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Which sensors this station carries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSet {
    pub pulse_oximeter: bool,
    pub scale: bool,
    pub blood_pressure: BpConfig,
}

impl Default for SensorSet {
    fn default() -> Self {
        Self {
            pulse_oximeter: true,
            scale: true,
            blood_pressure: BpConfig::default(),
        }
    }
}

/// Blood-pressure provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BpMode {
    /// Fixed value, for integration testing.
    #[default]
    Stub,
    /// Pulse-triggered cuff module.
    Cuff,
    /// No blood-pressure hardware; sentinel values are reported.
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BpConfig {
    pub mode: BpMode,
    pub stub_systolic: i32,
    pub stub_diastolic: i32,
    #[serde(with = "duration_ms", rename = "window_ms")]
    pub window: Duration,
}

impl Default for BpConfig {
    fn default() -> Self {
        Self {
            mode: BpMode::Stub,
            stub_systolic: 120,
            stub_diastolic: 80,
            window: crate::bp::DEFAULT_MEASUREMENT_WINDOW,
        }
    }
}

/// Waits and bounds used by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    #[serde(with = "duration_ms", rename = "sample_timeout_ms")]
    pub sample_timeout: Duration,
    #[serde(with = "duration_ms", rename = "block_pause_ms")]
    pub block_pause: Duration,
    #[serde(with = "duration_ms", rename = "weight_pause_ms")]
    pub weight_pause: Duration,
    #[serde(with = "duration_ms", rename = "debounce_ms")]
    pub debounce: Duration,
    /// Time each stage banner stays on the display before work starts.
    #[serde(with = "duration_ms", rename = "stage_pause_ms")]
    pub stage_pause: Duration,
    /// Time the success confirmation stays up before re-arming.
    #[serde(with = "duration_ms", rename = "confirm_ms")]
    pub confirm: Duration,
    /// Main-loop poll period while idle.
    #[serde(with = "duration_ms", rename = "poll_ms")]
    pub poll: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let acq = AcquisitionTiming::default();
        Self {
            sample_timeout: acq.sample_timeout,
            block_pause: acq.block_pause,
            weight_pause: acq.weight_pause,
            debounce: DEFAULT_DEBOUNCE,
            stage_pause: Duration::from_secs(1),
            confirm: Duration::from_secs(1),
            poll: Duration::from_millis(10),
        }
    }
}

impl TimingConfig {
    pub fn acquisition(&self) -> AcquisitionTiming {
        AcquisitionTiming {
            sample_timeout: self.sample_timeout,
            block_pause: self.block_pause,
            weight_pause: self.weight_pause,
        }
    }

    /// All waits zeroed; sample timeout kept. Used for simulation and tests.
    pub fn instant() -> Self {
        Self {
            block_pause: Duration::ZERO,
            weight_pause: Duration::ZERO,
            stage_pause: Duration::ZERO,
            confirm: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub rows: usize,
    /// Characters per row; unset means no truncation.
    pub width: Option<usize>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            rows: 2,
            width: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub sample_rate_hz: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 25.0,
        }
    }
}

/// Serialize a `Duration` as integer milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::OnConnectTimeout;
    use crate::retry::OnExhaustion;
    use crate::schema::SchemaVersion;

    #[test]
    fn test_empty_profile_is_default() {
        let p = DeviceProfile::from_toml("").unwrap();
        assert_eq!(p, DeviceProfile::default());
        assert_eq!(p.retry.max_attempts, 11);
        assert_eq!(p.connectivity.timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_partial_profile_overrides() {
        let p = DeviceProfile::from_toml(
            r#"
serial = "42"

[calibration]
zero_offset = 0.0
scale_ratio = 1.0

[endpoint]
schema = "v1"
base_url = "http://localhost:9000"

[retry]
max_attempts = 3
initial_backoff_ms = 0
on_exhaustion = "queue_and_idle"

[connectivity.on_timeout]
mode = "continue_offline"

[sensors.blood_pressure]
mode = "cuff"
"#,
        )
        .unwrap();
        assert_eq!(p.serial, "42");
        assert_eq!(p.calibration.scale_ratio, 1.0);
        assert_eq!(p.endpoint.schema, SchemaVersion::V1);
        assert_eq!(p.endpoint.timeout, Duration::from_secs(10));
        assert_eq!(p.retry.max_attempts, 3);
        assert_eq!(p.retry.on_exhaustion, OnExhaustion::QueueAndIdle);
        assert_eq!(p.connectivity.on_timeout, OnConnectTimeout::ContinueOffline);
        assert_eq!(p.sensors.blood_pressure.mode, BpMode::Cuff);
        assert!(p.sensors.scale);
    }

    #[test]
    fn test_zero_scale_ratio_rejected() {
        let err = DeviceProfile::from_toml("[calibration]\nscale_ratio = 0.0\nzero_offset = 1.0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(DeviceProfile::from_toml("[retry]\nmax_attempts = 0\n").is_err());
    }

    #[test]
    fn test_unknown_schema_is_parse_error() {
        let err = DeviceProfile::from_toml("[endpoint]\nschema = \"v9\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_roundtrip_preserves_profile() {
        let mut p = DeviceProfile::default();
        p.serial = "9".to_string();
        p.display.width = Some(16);
        let text = p.to_toml().unwrap();
        assert_eq!(DeviceProfile::from_toml(&text).unwrap(), p);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.toml");
        std::fs::write(&path, "serial = \"7\"\n[timing]\nconfirm_ms = 250\n").unwrap();
        let p = DeviceProfile::load(&path).unwrap();
        assert_eq!(p.serial, "7");
        assert_eq!(p.timing.confirm, Duration::from_millis(250));
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = DeviceProfile::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_instant_timing_keeps_sample_timeout() {
        let t = TimingConfig::instant();
        assert_eq!(t.stage_pause, Duration::ZERO);
        assert_eq!(t.sample_timeout, TimingConfig::default().sample_timeout);
    }
}
