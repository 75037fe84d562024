use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use thiserror::Error;

/// Absolute query window sent to the catalog's time-series endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub oldest: DateTime<Utc>,
    pub youngest: DateTime<Utc>,
    pub resolution: Duration,
}

impl TimeWindow {
    pub fn resolution_ms(&self) -> u128 {
        self.resolution.as_millis()
    }
}

/// The lookback reaches past the earliest representable instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stream window of {age:?} + {width:?} before {now} is out of range")]
pub struct WindowOutOfRange {
    pub age: Duration,
    pub width: Duration,
    pub now: DateTime<Utc>,
}

/// Fixed-duration lookback relative to "now".
///
/// The youngest edge sits `age` in the past and the window spans `width`
/// before it. Both are fixed; nothing adapts to pass duration or lag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub age: Duration,
    pub width: Duration,
    pub resolution: Duration,
}

impl LookbackWindow {
    pub fn new(age: Duration, width: Duration, resolution: Duration) -> Self {
        Self {
            age,
            width,
            resolution,
        }
    }

    pub fn resolve(
        &self,
        now: DateTime<Utc>,
    ) -> Result<TimeWindow, WindowOutOfRange> {
        let out_of_range = || WindowOutOfRange {
            age: self.age,
            width: self.width,
            now,
        };
        let youngest = step_back(now, self.age).ok_or_else(out_of_range)?;
        let oldest = step_back(youngest, self.width).ok_or_else(out_of_range)?;
        Ok(TimeWindow {
            oldest,
            youngest,
            resolution: self.resolution,
        })
    }
}

fn step_back(from: DateTime<Utc>, by: Duration) -> Option<DateTime<Utc>> {
    from.checked_sub_signed(TimeDelta::from_std(by).ok()?)
}
