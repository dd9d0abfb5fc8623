//! Versioned telemetry payloads.
//!
//! Route and field names are chosen by [`SchemaVersion`], never hardcoded per
//! deployment. Both payload types derive `Deserialize` so the collection
//! server parses exactly what stations send.

use serde::{Deserialize, Serialize};

use crate::reading::TelemetryRecord;

/// Wire format of a telemetry submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// Field set of the first deployed stations.
    #[default]
    Legacy,
    /// Self-describing payload with explicit units and a validity flag.
    V1,
}

impl SchemaVersion {
    /// Path appended to the endpoint base URL.
    pub fn route(self) -> &'static str {
        match self {
            Self::Legacy => "/avgHRavgSpO2weightbpSbpD",
            Self::V1 => "/api/v1/telemetry",
        }
    }

    /// Numeric version written into self-describing payloads.
    pub fn number(self) -> u32 {
        match self {
            Self::Legacy => 0,
            Self::V1 => 1,
        }
    }

    /// Encode `record` as a JSON object for this version.
    pub fn encode(self, record: &TelemetryRecord) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Legacy => serde_json::to_value(LegacyPayload::from(record)),
            Self::V1 => serde_json::to_value(V1Payload::from(record)),
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::V1 => write!(f, "v1"),
        }
    }
}

impl std::str::FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" | "v0" | "0" => Ok(Self::Legacy),
            "v1" | "1" => Ok(Self::V1),
            other => Err(format!("unknown schema version '{other}' (expected legacy or v1)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// `{"serial_number", "avgHR", "avgSpO2", "weight", "bpS", "bpD"}`.
///
/// Sentinel vitals are forwarded as `-1` with no flag. Deployed firmware
/// sends the serial as a bare number; see [`serial_number`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPayload {
    #[serde(with = "serial_number")]
    pub serial_number: String,
    #[serde(rename = "avgHR")]
    pub avg_hr: i32,
    #[serde(rename = "avgSpO2")]
    pub avg_spo2: i32,
    pub weight: f64,
    #[serde(rename = "bpS")]
    pub bp_s: i32,
    #[serde(rename = "bpD")]
    pub bp_d: i32,
}

impl From<&TelemetryRecord> for LegacyPayload {
    fn from(r: &TelemetryRecord) -> Self {
        Self {
            serial_number: r.device_serial().to_string(),
            avg_hr: r.heart_rate(),
            avg_spo2: r.spo2(),
            weight: r.weight(),
            bp_s: r.systolic(),
            bp_d: r.diastolic(),
        }
    }
}

/// Legacy serial encoding: a JSON number when the serial is a plain unsigned
/// integer, a string otherwise. Both forms are accepted on input.
pub mod serial_number {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(serde_json::Number),
        Text(String),
    }

    pub fn serialize<S: Serializer>(serial: &str, s: S) -> Result<S::Ok, S::Error> {
        match serial.parse::<u64>() {
            Ok(n) if n.to_string() == serial => s.serialize_u64(n),
            _ => s.serialize_str(serial),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Repr::deserialize(d)? {
            Repr::Number(n) => n.to_string(),
            Repr::Text(t) => t,
        })
    }
}

/// Schema version 1. `vitals_valid = false` marks sentinel heart rate and SpO2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct V1Payload {
    pub device_serial: String,
    pub schema_version: u32,
    pub heart_rate_bpm: i32,
    pub spo2_percent: i32,
    pub weight_kg: f64,
    pub bp_systolic: i32,
    pub bp_diastolic: i32,
    pub vitals_valid: bool,
}

impl From<&TelemetryRecord> for V1Payload {
    fn from(r: &TelemetryRecord) -> Self {
        Self {
            device_serial: r.device_serial().to_string(),
            schema_version: SchemaVersion::V1.number(),
            heart_rate_bpm: r.heart_rate(),
            spo2_percent: r.spo2(),
            weight_kg: r.weight(),
            bp_systolic: r.systolic(),
            bp_diastolic: r.diastolic(),
            vitals_valid: r.vitals_valid(),
        }
    }
}
