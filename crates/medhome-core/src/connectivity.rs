//! Boot-time wireless association with a bounded, visible wait.
//!
//! The station never blocks indefinitely on the network: after the
//! configured timeout (and any configured re-attempt rounds) it reports the
//! failure and continues in degraded mode, where records are queued or
//! dropped according to the exhaustion policy.

use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::ConnectivityError;
use crate::status::StatusChannel;
use crate::workflow::WorkflowState;

/// Interval between association checks while waiting.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Identity of the associated network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub ssid: String,
    pub address: String,
}

/// Wireless connectivity provider. Provisioning UI, if any, lives behind it.
pub trait NetworkLink {
    /// Begin association. Returns `true` if already associated on return.
    fn connect(&mut self, ssid_hint: &str, psk_hint: &str) -> bool;
    fn is_connected(&mut self) -> bool;
    fn identity(&self) -> Option<NetworkIdentity>;
}

/// What to do when association does not complete in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum OnConnectTimeout {
    /// Give up and run offline.
    ContinueOffline,
    /// Re-issue `connect` up to `rounds` more times, then run offline.
    Retry { rounds: u32 },
}

impl Default for OnConnectTimeout {
    fn default() -> Self {
        Self::Retry { rounds: 2 }
    }
}

/// Association parameters from the device profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub ssid_hint: String,
    pub psk_hint: String,
    #[serde(with = "crate::config::duration_ms", rename = "timeout_ms")]
    pub timeout: Duration,
    pub on_timeout: OnConnectTimeout,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            ssid_hint: "MedHome_WIFI_Setup".to_string(),
            psk_hint: String::new(),
            timeout: Duration::from_secs(20),
            on_timeout: OnConnectTimeout::default(),
        }
    }
}

/// Result of the boot-time association phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Online(Option<NetworkIdentity>),
    Degraded,
}

impl LinkState {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online(_))
    }
}

/// Associate with the network, publishing a countdown while waiting.
pub fn establish(
    link: &mut dyn NetworkLink,
    config: &ConnectivityConfig,
    clock: &dyn Clock,
    status: &mut StatusChannel,
) -> LinkState {
    let rounds = match config.on_timeout {
        OnConnectTimeout::ContinueOffline => 1,
        OnConnectTimeout::Retry { rounds } => rounds.saturating_add(1),
    };

    for round in 1..=rounds {
        match connect_once(link, config, clock, status) {
            Ok(identity) => {
                let msg = match &identity {
                    Some(id) => format!("Connected to {} ({})", id.ssid, id.address),
                    None => "Connected".to_string(),
                };
                status.publish(WorkflowState::Idle, msg);
                return LinkState::Online(identity);
            }
            Err(e) => {
                status.publish(
                    WorkflowState::Idle,
                    format!("WiFi attempt {round}/{rounds} failed: {e}"),
                );
            }
        }
    }

    status.publish(
        WorkflowState::Idle,
        "Failed to connect to WiFi; running offline",
    );
    LinkState::Degraded
}

fn connect_once(
    link: &mut dyn NetworkLink,
    config: &ConnectivityConfig,
    clock: &dyn Clock,
    status: &mut StatusChannel,
) -> Result<Option<NetworkIdentity>, ConnectivityError> {
    info!("associating (hint: {})", config.ssid_hint);
    if link.connect(&config.ssid_hint, &config.psk_hint) {
        return Ok(link.identity());
    }

    let deadline = clock.now() + config.timeout;
    loop {
        let now = clock.now();
        if now >= deadline {
            return Err(ConnectivityError::Timeout(config.timeout));
        }
        let remaining = deadline - now;
        status.publish(
            WorkflowState::Idle,
            format!("Connecting to WiFi... {}s", remaining.as_secs().max(1)),
        );
        clock.sleep(POLL_INTERVAL.min(remaining));
        if link.is_connected() {
            return Ok(link.identity());
        }
    }
}
