use itinera_utils::paths;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Provider names accepted in `images.providers`
pub const KNOWN_IMAGE_PROVIDERS: &[&str] = &["pixabay", "unsplash"];

/// Values accepted in `search.provider`; `none` disables web search
pub const KNOWN_SEARCH_PROVIDERS: &[&str] = &["google", "none"];

/// Where an effective configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value loaded from a configuration file.
    ConfigFile(PathBuf),
    /// Value provided programmatically (e.g., `Config::builder()`).
    Programmatic,
    /// Built-in default value (lowest precedence).
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::ConfigFile(path) => write!(f, "config ({})", path.display()),
            Self::Programmatic => write!(f, "programmatic"),
            Self::Defaults => write!(f, "default"),
        }
    }
}

/// Configuration for itinera.
///
/// Sections mirror `.itinera/config.toml`:
///
/// ```toml
/// [defaults]
/// cache_dir = ".itinera/cache"
///
/// [llm]
/// model = "deepseek-ai/DeepSeek-V3"
/// api_key_env = "DEEPSEEK_API_KEY"
///
/// [retry]
/// max_attempts = 3
///
/// [images]
/// providers = ["pixabay", "unsplash"]
///
/// [search]
/// provider = "google"
///
/// [refinement]
/// acceptance_threshold = 6
/// ```
///
/// Use [`Config::discover()`] for CLI semantics or [`Config::builder()`] for
/// deterministic programmatic configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub defaults: Defaults,
    pub llm: LlmSettings,
    pub retry: RetrySettings,
    pub images: ImageSettings,
    pub search: SearchSettings,
    pub refinement: RefinementSettings,
    /// Source attribution for each dotted key (for status display).
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            llm: LlmSettings::default(),
            retry: RetrySettings::default(),
            images: ImageSettings::default(),
            search: SearchSettings::default(),
            refinement: RefinementSettings::default(),
            source_attribution: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    /// Root of the result cache
    pub cache_dir: PathBuf,
    pub verbose: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            cache_dir: paths::cache_dir().into_std_path_buf(),
            verbose: false,
        }
    }
}

/// Chat-completion endpoint settings shared by the generator and evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// Model used for scoring answers; falls back to `model`
    pub evaluator_model: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.siliconflow.cn/v1/chat/completions".to_string(),
            model: "deepseek-ai/DeepSeek-V3".to_string(),
            evaluator_model: None,
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            timeout_secs: 300,
        }
    }
}

impl LlmSettings {
    #[must_use]
    pub fn evaluator_model(&self) -> &str {
        self.evaluator_model.as_deref().unwrap_or(&self.model)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Backoff and attempt ceiling for generation calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 4_000,
            multiplier: 2.0,
            min_delay_ms: 4_000,
            max_delay_ms: 20_000,
            jitter_min_ms: 1_000,
            jitter_max_ms: 3_000,
        }
    }
}

/// Image provider chain and resolver pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSettings {
    /// Provider names in priority order
    pub providers: Vec<String>,
    /// Full passes over the provider list before giving up
    pub attempts: u32,
    pub timeout_secs: u64,
    pub inter_provider_delay_ms: u64,
    /// In-flight resolutions
    pub concurrency: usize,
    pub requests_per_second: u32,
    pub pixabay_key_env: String,
    pub unsplash_key_env: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            providers: KNOWN_IMAGE_PROVIDERS.iter().map(|s| (*s).to_string()).collect(),
            attempts: 3,
            timeout_secs: 10,
            inter_provider_delay_ms: 1_000,
            concurrency: 4,
            requests_per_second: 2,
            pixabay_key_env: "PIXABAY_API_KEY".to_string(),
            unsplash_key_env: "UNSPLASH_ACCESS_KEY".to_string(),
        }
    }
}

impl ImageSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn inter_provider_delay(&self) -> Duration {
        Duration::from_millis(self.inter_provider_delay_ms)
    }
}

/// Web search used to gather destination content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub provider: String,
    pub api_key_env: String,
    /// Environment variable holding the programmable search engine id
    pub engine_id_env: String,
    /// Hits requested per query (1-10)
    pub results_per_query: u32,
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            engine_id_env: "SEARCH_ENGINE_ID".to_string(),
            results_per_query: 10,
            timeout_secs: 10,
        }
    }
}

impl SearchSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.provider != "none"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementSettings {
    pub max_attempts: u32,
    /// Minimum evaluator score (1-10) that accepts an answer
    pub acceptance_threshold: u8,
}

impl Default for RefinementSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            acceptance_threshold: 6,
        }
    }
}
