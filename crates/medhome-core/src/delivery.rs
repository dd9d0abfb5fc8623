//! Telemetry delivery over HTTPS.
//!
//! [`HttpDeliveryClient::submit`] makes exactly one POST. HTTP 200 is the
//! only success; every other status and every transport failure is a
//! [`DeliveryError`]. Retrying is the workflow's job.

use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;
use crate::reading::TelemetryRecord;
use crate::schema::SchemaVersion;

/// Where and how records are submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Scheme and host, without the schema route (e.g. `https://collector.example`).
    pub base_url: String,
    pub schema: SchemaVersion,
    /// Bound on one complete request/response round trip.
    #[serde(with = "crate::config::duration_ms", rename = "timeout_ms")]
    pub timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "https://medhome.onrender.com".to_string(),
            schema: SchemaVersion::Legacy,
            timeout: Duration::from_secs(10),
        }
    }
}

impl EndpointConfig {
    /// Full submission URL for the configured schema.
    pub fn url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.schema.route()
        )
    }
}

/// Anything that accepts one record per call.
pub trait TelemetrySink {
    fn submit(&mut self, record: &TelemetryRecord) -> Result<(), DeliveryError>;
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Box<S> {
    fn submit(&mut self, record: &TelemetryRecord) -> Result<(), DeliveryError> {
        (**self).submit(record)
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Blocking HTTPS client for one endpoint.
pub struct HttpDeliveryClient {
    client: Client,
    config: EndpointConfig,
}

impl HttpDeliveryClient {
    pub fn new(config: EndpointConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("medhome/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }
}

impl TelemetrySink for HttpDeliveryClient {
    fn submit(&mut self, record: &TelemetryRecord) -> Result<(), DeliveryError> {
        let body = self.config.schema.encode(record)?;
        let body = serde_json::to_vec(&body)?;
        let url = self.config.url();

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        info!("POST {url} -> HTTP {status}");
        match response.text() {
            Ok(text) => debug!("response body: {text}"),
            Err(e) => debug!("response body unreadable: {e}"),
        }

        if status == 200 {
            Ok(())
        } else {
            Err(DeliveryError::Status(status))
        }
    }
}

// ---------------------------------------------------------------------------
// Offline sink
// ---------------------------------------------------------------------------

/// Sink for stations running without a network link. Every submit fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSink;

impl TelemetrySink for OfflineSink {
    fn submit(&mut self, _record: &TelemetryRecord) -> Result<(), DeliveryError> {
        Err(DeliveryError::Transport("station is offline".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{BloodPressureReading, VitalsReading, WeightReading};

    #[test]
    fn test_url_joins_base_and_route() {
        let cfg = EndpointConfig {
            base_url: "http://127.0.0.1:8080/".to_string(),
            schema: SchemaVersion::V1,
            ..Default::default()
        };
        assert_eq!(cfg.url(), "http://127.0.0.1:8080/api/v1/telemetry");
    }

    #[test]
    fn test_default_url_is_legacy_route() {
        assert_eq!(
            EndpointConfig::default().url(),
            "https://medhome.onrender.com/avgHRavgSpO2weightbpSbpD"
        );
    }

    #[test]
    fn test_offline_sink_always_fails() {
        let record = TelemetryRecord::new(
            "1",
            VitalsReading::sentinel(),
            WeightReading::sentinel(),
            BloodPressureReading::sentinel(),
        );
        assert!(matches!(
            OfflineSink.submit(&record),
            Err(DeliveryError::Transport(_))
        ));
    }
}
