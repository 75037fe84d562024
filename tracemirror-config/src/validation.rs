use std::{fmt, time::Duration};

use thiserror::Error;

use crate::models::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{} ({hint})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint(
        &mut self,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.items.iter().any(|w| w.message.contains(needle))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error(
        "synchronization is enabled but Lightstep credentials are missing: {}",
        .missing.join(", ")
    )]
    MissingCatalogCredentials { missing: Vec<&'static str> },
    #[error("synchronization is enabled but no database URL is configured")]
    MissingDatabase,
    #[error("synchronization is enabled but no Redis URL is configured")]
    MissingRedis,
    #[error("scheduler interval must be between 1 and 60 minutes, got {0}")]
    InvalidInterval(u32),
    #[error("stream concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("publish topic must not be empty")]
    EmptyTopic,
    #[error(
        "stream lookback plus range must not exceed {} hours, got {lookback_secs}s + {range_secs}s",
        MAX_STREAM_WINDOW.as_secs() / 3600
    )]
    StreamWindowTooLarge { lookback_secs: u64, range_secs: u64 },
}

/// Upper bound on `stream_lookback + stream_range`.
pub const MAX_STREAM_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Reject combinations that cannot work and collect warnings for the ones
/// that merely look wrong.
pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let sync = &config.sync;

    if !(1..=60).contains(&sync.interval_minutes) {
        return Err(ConfigGuardRailError::InvalidInterval(
            sync.interval_minutes,
        ));
    }
    if sync.max_concurrent_streams == 0 {
        return Err(ConfigGuardRailError::ZeroConcurrency);
    }
    if sync.topic.trim().is_empty() {
        return Err(ConfigGuardRailError::EmptyTopic);
    }

    if sync.stream_lookback.saturating_add(sync.stream_range) > MAX_STREAM_WINDOW {
        return Err(ConfigGuardRailError::StreamWindowTooLarge {
            lookback_secs: sync.stream_lookback.as_secs(),
            range_secs: sync.stream_range.as_secs(),
        });
    }

    if sync.enabled {
        let missing = config.lightstep.missing_credentials();
        if !missing.is_empty() {
            return Err(ConfigGuardRailError::MissingCatalogCredentials {
                missing,
            });
        }
        if config.database.url.is_none() {
            return Err(ConfigGuardRailError::MissingDatabase);
        }
        if config.redis.is_none() {
            return Err(ConfigGuardRailError::MissingRedis);
        }
    }

    if 60 % sync.interval_minutes != 0 {
        warnings.push_with_hint(
            format!(
                "Scheduler interval of {} minutes does not divide the hour; the last gap before each hour is shorter",
                sync.interval_minutes
            ),
            "Use a divisor of 60 such as 10, 15, 20 or 30",
        );
    }

    if sync.stream_range.is_zero() {
        warnings.push("Stream range is zero; exemplar windows will be empty");
    }

    if sync.stream_lookback < sync.stream_resolution {
        warnings.push(
            "Stream lookback is shorter than one resolution step; recent data may not be aggregated yet",
        );
    }

    if !sync.publish_retry.jitter_ratio.is_finite() {
        warnings.push_with_hint(
            "Publish retry jitter ratio is not a finite number; jitter is disabled",
            "Set sync.publish_retry.jitter_ratio between 0.0 and 1.0",
        );
    }

    if !sync.enabled && config.database.url.is_none() {
        warnings.push_with_hint(
            "No database URL configured; the registry API will be unavailable",
            "Set DATABASE_URL",
        );
    }

    Ok(warnings)
}
