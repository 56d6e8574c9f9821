//! Injected waiting.
//!
//! Every component that pauses between remote calls goes through a
//! [`Sleeper`], so tests can record the requested waits instead of sleeping.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Uniform random delay in `[min, max]`, added before dependent calls so
/// concurrent retries do not line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    min: Duration,
    max: Duration,
}

impl Jitter {
    /// Bounds are swapped if given in the wrong order.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No jitter at all.
    #[must_use]
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    }
}

impl Default for Jitter {
    /// 1 to 3 seconds.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(3))
    }
}
