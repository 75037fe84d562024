use chrono::{DateTime, TimeDelta, Timelike, Utc};
use std::{iter::StepBy, ops::Range, time::Duration};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("recurrence interval must be between 1 and 60 minutes, got {0}")]
pub struct InvalidRecurrence(pub u32);

/// Repeating schedule expressed as allowed minute-of-hour values.
///
/// `every_minutes(n)` allows the minutes `0, n, 2n, ...` up to 59, so a
/// pass fires on the hour and every `n` minutes after it. Steps that do not
/// divide 60 leave a shorter gap before the top of the hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceRule {
    step: u32,
}

impl RecurrenceRule {
    pub fn every_minutes(step: u32) -> Result<Self, InvalidRecurrence> {
        if (1..=60).contains(&step) {
            Ok(Self { step })
        } else {
            Err(InvalidRecurrence(step))
        }
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn allows_minute(&self, minute: u32) -> bool {
        minute < 60 && minute % self.step == 0
    }

    pub fn minutes(&self) -> StepBy<Range<u32>> {
        (0..60).step_by(self.step as usize)
    }

    /// First whole-minute instant strictly after `after` whose minute is
    /// allowed.
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let floor = after
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(after);

        let mut candidate = floor + TimeDelta::minutes(1);
        // At most 60 steps: minute 0 is always allowed.
        while !self.allows_minute(candidate.minute()) {
            candidate += TimeDelta::minutes(1);
        }
        candidate
    }

    /// Next fire time and how long to wait for it from `now`.
    pub fn delay_from(&self, now: DateTime<Utc>) -> (DateTime<Utc>, Duration) {
        let next = self.next_after(now);
        let delay = (next - now).to_std().unwrap_or_default();
        (next, delay)
    }
}
