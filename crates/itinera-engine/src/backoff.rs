//! Wait durations for bounded retries.

use itinera_config::Config;
use std::time::Duration;

/// Exponential backoff clamped to `[min, max]`:
/// `delay(n) = clamp(base * multiplier^(n-1), min, max)`.
///
/// The defaults (base 4 s, multiplier 2, floor 4 s, ceiling 20 s, 3 attempts)
/// give 4 s after the first failure and 8 s after the second.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
    multiplier: f64,
    min: Duration,
    max: Duration,
    max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(4),
            multiplier: 2.0,
            min: Duration::from_secs(4),
            max: Duration::from_secs(20),
            max_attempts: 3,
        }
    }
}

impl BackoffPolicy {
    /// A multiplier below 1 is raised to 1; a ceiling below the floor is raised
    /// to the floor.
    #[must_use]
    pub fn new(
        base: Duration,
        multiplier: f64,
        min: Duration,
        max: Duration,
        max_attempts: u32,
    ) -> Self {
        let multiplier = if multiplier.is_finite() && multiplier >= 1.0 {
            multiplier
        } else {
            1.0
        };
        Self {
            base,
            multiplier,
            min,
            max: max.max(min),
            max_attempts,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let (base, min, max) = config.retry_delays();
        Self::new(
            base,
            config.retry.multiplier,
            min,
            max,
            config.retry.max_attempts,
        )
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Total attempts allowed, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after failed attempt number `attempt` (1-based; 0 is treated as 1).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let scaled = self.base.as_secs_f64() * self.multiplier.powi(i32::try_from(exponent).unwrap_or(i32::MAX));
        let raw = if scaled.is_finite() && scaled < self.max.as_secs_f64() {
            Duration::from_secs_f64(scaled)
        } else {
            self.max
        };
        raw.clamp(self.min, self.max)
    }

    /// The waits between consecutive attempts, in order.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(|attempt| self.delay(attempt))
    }

    /// Sum of all waits if every attempt fails, jitter excluded.
    #[must_use]
    pub fn total_wait(&self) -> Duration {
        self.schedule().sum()
    }
}
