//! HTTP collection endpoint for vitals stations.
//!
//! Accepts both payload schemas stations send, keeps an in-memory history
//! per device serial, and serves the history plus a weekly trend analysis.

pub mod analysis;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::Mutex;

use medhome_core::reading::VitalsReading;
use medhome_core::schema::{LegacyPayload, SchemaVersion, V1Payload};

/// One accepted submission, normalized across schemas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredReading {
    pub device_serial: String,
    pub schema_version: u32,
    pub heart_rate: i32,
    pub spo2: i32,
    pub weight: f64,
    pub systolic: i32,
    pub diastolic: i32,
    /// `false` marks a record carrying sentinel vitals.
    pub vitals_valid: bool,
}

impl From<LegacyPayload> for StoredReading {
    fn from(p: LegacyPayload) -> Self {
        Self {
            vitals_valid: VitalsReading::in_range(p.avg_hr, p.avg_spo2),
            device_serial: p.serial_number,
            schema_version: SchemaVersion::Legacy.number(),
            heart_rate: p.avg_hr,
            spo2: p.avg_spo2,
            weight: p.weight,
            systolic: p.bp_s,
            diastolic: p.bp_d,
        }
    }
}

impl From<V1Payload> for StoredReading {
    fn from(p: V1Payload) -> Self {
        Self {
            device_serial: p.device_serial,
            schema_version: p.schema_version,
            heart_rate: p.heart_rate_bpm,
            spo2: p.spo2_percent,
            weight: p.weight_kg,
            systolic: p.bp_systolic,
            diastolic: p.bp_diastolic,
            vitals_valid: p.vitals_valid,
        }
    }
}

/// Readings kept per device; older ones are discarded first.
pub const HISTORY_LIMIT: usize = 1000;

/// Shared server state.
struct AppState {
    readings: Mutex<HashMap<String, Vec<StoredReading>>>,
    history_limit: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_history_limit(HISTORY_LIMIT)
    }
}

impl AppState {
    fn with_history_limit(limit: usize) -> Self {
        Self {
            readings: Mutex::new(HashMap::new()),
            history_limit: limit.max(analysis::WINDOW),
        }
    }

    /// Append to the device history, trimming it to the limit. Returns the
    /// number of readings now held for the device.
    async fn store(&self, reading: StoredReading) -> usize {
        if !reading.vitals_valid {
            warn!(
                "device {}: reading stored with invalid vitals",
                reading.device_serial
            );
        }
        let mut readings = self.readings.lock().await;
        let history = readings.entry(reading.device_serial.clone()).or_default();
        history.push(reading);
        if history.len() > self.history_limit {
            let excess = history.len() - self.history_limit;
            history.drain(..excess);
        }
        history.len()
    }
}

#[derive(Serialize)]
struct AcceptedResponse {
    message: &'static str,
    device_serial: String,
    stored: usize,
    vitals_valid: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    devices: usize,
    readings: usize,
}

#[derive(Serialize)]
struct ReadingsResponse {
    device_serial: String,
    total: usize,
    readings: Vec<StoredReading>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "MedHome Collection Server",
        "version": medhome_core::VERSION,
        "endpoints": {
            "/": "This API index",
            "/hello": "Liveness greeting",
            "/health": "Health check with stored record counts",
            "/api/v1/telemetry": {
                "method": "POST",
                "description": "Submit one reading (schema v1)",
            },
            "/avgHRavgSpO2weightbpSbpD": {
                "method": "POST",
                "description": "Submit one reading (legacy schema)",
            },
            "/devices/{serial}/readings": "Stored readings for a device",
            "/devices/{serial}/analysis": "Weekly trend analysis for a device",
        }
    }))
}

async fn handle_hello() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Hello, World!" }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let readings = state.readings.lock().await;
    Json(HealthResponse {
        status: "healthy",
        devices: readings.len(),
        readings: readings.values().map(Vec::len).sum(),
    })
}

/// Schema v1. Missing or mistyped fields are rejected by the extractor (422).
async fn handle_v1(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<V1Payload>,
) -> Result<Json<AcceptedResponse>, (StatusCode, Json<ErrorResponse>)> {
    if payload.schema_version != SchemaVersion::V1.number() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("unsupported schema_version {}", payload.schema_version),
            }),
        ));
    }
    Ok(Json(accept(&state, payload.into()).await))
}

/// Legacy schema. Answers 400 when any required key is missing.
async fn handle_legacy(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<AcceptedResponse>, (StatusCode, Json<ErrorResponse>)> {
    let payload: LegacyPayload = serde_json::from_value(body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Missing one or more required fields: {e}"),
            }),
        )
    })?;
    Ok(Json(accept(&state, payload.into()).await))
}

async fn accept(state: &AppState, reading: StoredReading) -> AcceptedResponse {
    let device_serial = reading.device_serial.clone();
    let vitals_valid = reading.vitals_valid;
    info!(
        "device {device_serial}: hr={} spo2={} weight={:.2} bp={}/{}",
        reading.heart_rate, reading.spo2, reading.weight, reading.systolic, reading.diastolic
    );
    let stored = state.store(reading).await;
    AcceptedResponse {
        message: "Data received successfully",
        device_serial,
        stored,
        vitals_valid,
    }
}

async fn handle_readings(
    State(state): State<Arc<AppState>>,
    Path(serial): Path<String>,
) -> Result<Json<ReadingsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let readings = state.readings.lock().await;
    let history = readings.get(&serial).ok_or_else(|| unknown_device(&serial))?;
    Ok(Json(ReadingsResponse {
        device_serial: serial.clone(),
        total: history.len(),
        readings: history.clone(),
    }))
}

async fn handle_analysis(
    State(state): State<Arc<AppState>>,
    Path(serial): Path<String>,
) -> Result<Json<analysis::WeeklyAnalysis>, (StatusCode, Json<ErrorResponse>)> {
    let readings = state.readings.lock().await;
    let history = readings.get(&serial).ok_or_else(|| unknown_device(&serial))?;
    Ok(Json(analysis::analyze(history)))
}

fn unknown_device(serial: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Unknown device: {serial}"),
        }),
    )
}

/// Build the axum router with an empty store.
pub fn build_router() -> Router {
    let state = Arc::new(AppState::default());

    Router::new()
        .route("/", get(handle_index))
        .route("/hello", get(handle_hello))
        .route("/health", get(handle_health))
        .route(SchemaVersion::V1.route(), post(handle_v1))
        .route(SchemaVersion::Legacy.route(), post(handle_legacy))
        .route("/devices/{serial}/readings", get(handle_readings))
        .route("/devices/{serial}/analysis", get(handle_analysis))
        .with_state(state)
}

/// Run the collection server until the process exits.
pub async fn run_server(host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router();
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("collection server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}
