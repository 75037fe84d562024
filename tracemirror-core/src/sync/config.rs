use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::LookbackWindow;

use super::recurrence::{InvalidRecurrence, RecurrenceRule};

/// Knobs for the synchronization job.
///
/// Every field has a default so a deployment can set only what it needs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// When false the driver never runs and the process only serves what is
    /// already in the registry.
    pub enabled: bool,
    /// Minute-of-hour step for recurring passes (`0, n, 2n, ...`).
    pub interval_minutes: u32,
    /// Distance between "now" and the youngest edge of the exemplar window.
    #[serde(with = "duration_serde")]
    pub stream_lookback: Duration,
    /// Width of the exemplar window.
    #[serde(with = "duration_serde")]
    pub stream_range: Duration,
    /// Time-series resolution requested from the catalog.
    #[serde(with = "duration_serde")]
    pub stream_resolution: Duration,
    /// Upper bound on concurrent per-stream fetches.
    pub max_concurrent_streams: usize,
    /// Channel topic exemplar span ids are published to.
    pub topic: String,
    /// Rows not seen for this many intervals are marked inactive. `0`
    /// disables the sweep.
    pub stale_after_intervals: u32,
    pub publish_retry: PublishRetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: 20,
            stream_lookback: Duration::from_secs(10 * 60),
            stream_range: Duration::from_secs(2 * 60),
            stream_resolution: Duration::from_secs(60),
            max_concurrent_streams: 8,
            topic: "traces".to_string(),
            stale_after_intervals: 72,
            publish_retry: PublishRetryConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn lookback_window(&self) -> LookbackWindow {
        LookbackWindow::new(
            self.stream_lookback,
            self.stream_range,
            self.stream_resolution,
        )
    }

    pub fn recurrence(&self) -> Result<RecurrenceRule, InvalidRecurrence> {
        RecurrenceRule::every_minutes(self.interval_minutes)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_after_intervals > 0)
            .then(|| self.interval().saturating_mul(self.stale_after_intervals))
    }
}

/// Retry/backoff policy for publishing a single work item.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishRetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u16,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Percentage-based jitter to spread out retries.
    pub jitter_ratio: f32,
}

impl PublishRetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

impl Default for PublishRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 200,
            backoff_max_ms: 5_000,
            jitter_ratio: 0.2,
        }
    }
}

/// Durations in config files are humantime strings (`"10m"`, `"90s"`);
/// bare integers are read as seconds.
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => humantime::parse_duration(text.trim())
                .map_err(|e| de::Error::custom(format!("invalid duration '{text}': {e}"))),
        }
    }
}
