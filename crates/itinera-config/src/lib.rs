//! Hierarchical configuration for itinera.
//!
//! Precedence is CLI > config file > built-in defaults, and every effective
//! value records where it came from.

pub mod config;

pub use config::{
    CliArgs, Config, ConfigBuilder, ConfigSource, Defaults, ImageSettings, LlmSettings,
    RefinementSettings, RetrySettings, SearchSettings,
};
pub use itinera_utils::error::ConfigError;
