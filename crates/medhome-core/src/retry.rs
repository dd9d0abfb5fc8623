//! Bounded delivery retries with exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One initial attempt plus ten retries.
pub const MAX_ATTEMPTS: u32 = 11;

/// What happens once every attempt for a record has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnExhaustion {
    /// Stop in `Fault` until the station is power-cycled.
    #[default]
    Halt,
    /// Keep the record in the in-memory unsent queue and go back to `Idle`.
    QueueAndIdle,
}

/// Attempt budget and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the first retry. Zero disables backoff entirely.
    #[serde(with = "crate::config::duration_ms", rename = "initial_backoff_ms")]
    pub initial_backoff: Duration,
    pub multiplier: f64,
    #[serde(with = "crate::config::duration_ms", rename = "max_backoff_ms")]
    pub max_backoff: Duration,
    pub on_exhaustion: OnExhaustion,
    /// Capacity of the unsent queue under [`OnExhaustion::QueueAndIdle`].
    pub queue_capacity: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
            on_exhaustion: OnExhaustion::Halt,
            queue_capacity: 16,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries immediately.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay after failed attempt number `attempt` (1-based), before the next one.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        if self.initial_backoff.is_zero() || attempt == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.max(1.0).powi(exp);
        let capped = scaled.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Whether another attempt is allowed after `attempt` failed.
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
