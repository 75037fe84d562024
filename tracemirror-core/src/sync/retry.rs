use rand::Rng;
use std::{future::Future, time::Duration};
use tracing::debug;

use super::config::PublishRetryConfig;

/// Bounded retry with exponential backoff and proportional jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u16,
    base: Duration,
    max: Duration,
    jitter_ratio: f32,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u16,
        base: Duration,
        max: Duration,
        jitter_ratio: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            max,
            // NaN would survive `clamp` and panic in `mul_f32`.
            jitter_ratio: if jitter_ratio.is_finite() {
                jitter_ratio.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, 0.0)
    }

    pub fn max_attempts(&self) -> u16 {
        self.max_attempts
    }

    /// Delay before attempt `attempt + 1`, given `attempt` failures so far.
    /// Jitter is excluded.
    pub fn backoff(&self, attempt: u16) -> Duration {
        let multiplier = 2_u32.saturating_pow(u32::from(attempt.saturating_sub(1)));
        self.base.saturating_mul(multiplier).min(self.max)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_ratio <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = delay.mul_f32(self.jitter_ratio);
        let extra = rand::rng().random_range(Duration::ZERO..=spread);
        delay + extra
    }

    /// Run `op` until it succeeds or attempts are exhausted, returning the
    /// last error in the latter case.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt: u16 = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => return Err(err),
                Err(err) => {
                    let delay = self.jittered(self.backoff(attempt));
                    debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after failure"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl From<&PublishRetryConfig> for RetryPolicy {
    fn from(config: &PublishRetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.backoff_base(),
            config.backoff_max(),
            config.jitter_ratio,
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PublishRetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn exponential_backoff_caps_at_max() {
        let policy = RetryPolicy::new(
            10,
            Duration::from_millis(100),
            Duration::from_secs(1),
            0.0,
        );

        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(9), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_ratio() {
        let policy = RetryPolicy::new(
            3,
            Duration::from_millis(100),
            Duration::from_secs(1),
            0.5,
        );
        for _ in 0..32 {
            let delay = policy.jittered(Duration::from_millis(100));
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy =
            RetryPolicy::new(3, Duration::ZERO, Duration::ZERO, 0.0);
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("attempt {n}")) } else { Ok(n) }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let policy =
            RetryPolicy::new(2, Duration::ZERO, Duration::ZERO, 0.0);
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("attempt {n}"))
            })
            .await;

        assert_eq!(result, Err("attempt 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn non_finite_jitter_ratio_disables_jitter() {
        for ratio in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let policy = RetryPolicy::new(
                3,
                Duration::from_millis(100),
                Duration::from_secs(1),
                ratio,
            );
            assert_eq!(policy.jitter_ratio, 0.0);
            assert_eq!(
                policy.jittered(policy.backoff(2)),
                Duration::from_millis(200)
            );
        }
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO, 0.0);
        assert_eq!(policy.max_attempts(), 1);
    }
}
