//! Configuration management for itinera
//!
//! Hierarchical configuration with discovery and precedence CLI > file >
//! defaults. The TOML file has `[defaults]`, `[llm]`, `[retry]`, `[images]`,
//! `[search]` and `[refinement]` sections; unknown keys are rejected.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use model::*;

use std::time::Duration;

impl Config {
    /// Backoff floor, ceiling and base as durations: `(base, min, max)`.
    #[must_use]
    pub fn retry_delays(&self) -> (Duration, Duration, Duration) {
        (
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.min_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
        )
    }

    /// Jitter bounds as durations: `(min, max)`.
    #[must_use]
    pub fn jitter_bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.retry.jitter_min_ms),
            Duration::from_millis(self.retry.jitter_max_ms),
        )
    }
}
