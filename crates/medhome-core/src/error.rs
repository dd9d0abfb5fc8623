//! Error taxonomy for acquisition, connectivity, delivery, and configuration.
//!
//! Sensor errors are soft: the workflow forwards sentinel values and keeps
//! going. Delivery errors are retried by the workflow, never by the client.

use std::path::PathBuf;
use std::time::Duration;

/// Failure reading from a sensor peripheral.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// No sample arrived within the bounded read window.
    #[error("{sensor} produced no sample within {timeout:?}")]
    Timeout {
        sensor: &'static str,
        timeout: Duration,
    },
    /// The peripheral is absent or did not initialize.
    #[error("{sensor} is not available")]
    Unavailable { sensor: &'static str },
    /// The peripheral answered with something unusable.
    #[error("{sensor} reported a fault: {detail}")]
    Peripheral {
        sensor: &'static str,
        detail: String,
    },
}

/// Failure establishing the wireless link.
#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    #[error("network not associated after {0:?}")]
    Timeout(Duration),
}

/// Failure delivering one telemetry record.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The endpoint answered with anything other than 200.
    #[error("endpoint answered HTTP {0}")]
    Status(u16),
    /// Connection, TLS, or timeout failure before a status was received.
    #[error("transport error: {0}")]
    Transport(String),
    /// The record could not be encoded for the configured schema.
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure loading or validating a device profile.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read profile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse profile: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot render profile: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("invalid profile: {0}")]
    Invalid(String),
}
