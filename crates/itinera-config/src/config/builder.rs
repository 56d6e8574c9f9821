use std::path::PathBuf;

use itinera_utils::error::ConfigError;

use super::{Config, ConfigSource, discovery::ALL_KEYS};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when configuration must not depend on the user's environment
    /// or config files, for example in tests or when embedding the engine.
    ///
    /// # Example
    ///
    /// ```rust
    /// use itinera_config::Config;
    ///
    /// let config = Config::builder()
    ///     .cache_dir("/tmp/itinera-cache")
    ///     .retry_max_attempts(2)
    ///     .image_providers(["unsplash"])
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.retry.max_attempts, 2);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration.
///
/// All values set via the builder are attributed to
/// `ConfigSource::Programmatic`; untouched values keep `Defaults`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
    touched: Vec<&'static str>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(mut self, key: &'static str) -> Self {
        self.touched.push(key);
        self
    }

    #[must_use]
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.defaults.cache_dir = path.into();
        self.touch("defaults.cache_dir")
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.defaults.verbose = verbose;
        self.touch("defaults.verbose")
    }

    #[must_use]
    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm.base_url = url.into();
        self.touch("llm.base_url")
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.model = model.into();
        self.touch("llm.model")
    }

    #[must_use]
    pub fn evaluator_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.evaluator_model = Some(model.into());
        self.touch("llm.evaluator_model")
    }

    #[must_use]
    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.config.llm.api_key_env = var.into();
        self.touch("llm.api_key_env")
    }

    #[must_use]
    pub fn llm_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm.timeout_secs = secs;
        self.touch("llm.timeout_secs")
    }

    #[must_use]
    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self.touch("retry.max_attempts")
    }

    /// Set base, floor and ceiling of the generation backoff in milliseconds.
    #[must_use]
    pub fn retry_delays_ms(mut self, base: u64, min: u64, max: u64) -> Self {
        self.config.retry.base_delay_ms = base;
        self.config.retry.min_delay_ms = min;
        self.config.retry.max_delay_ms = max;
        self.touch("retry.base_delay_ms")
            .touch("retry.min_delay_ms")
            .touch("retry.max_delay_ms")
    }

    #[must_use]
    pub fn retry_jitter_ms(mut self, min: u64, max: u64) -> Self {
        self.config.retry.jitter_min_ms = min;
        self.config.retry.jitter_max_ms = max;
        self.touch("retry.jitter_min_ms").touch("retry.jitter_max_ms")
    }

    #[must_use]
    pub fn image_providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.images.providers = providers.into_iter().map(Into::into).collect();
        self.touch("images.providers")
    }

    #[must_use]
    pub fn image_attempts(mut self, attempts: u32) -> Self {
        self.config.images.attempts = attempts;
        self.touch("images.attempts")
    }

    #[must_use]
    pub fn image_pacing(mut self, concurrency: usize, requests_per_second: u32) -> Self {
        self.config.images.concurrency = concurrency;
        self.config.images.requests_per_second = requests_per_second;
        self.touch("images.concurrency")
            .touch("images.requests_per_second")
    }

    #[must_use]
    pub fn inter_provider_delay_ms(mut self, ms: u64) -> Self {
        self.config.images.inter_provider_delay_ms = ms;
        self.touch("images.inter_provider_delay_ms")
    }

    /// Select the web search provider (`google` or `none`).
    #[must_use]
    pub fn search_provider(mut self, provider: impl Into<String>) -> Self {
        self.config.search.provider = provider.into();
        self.touch("search.provider")
    }

    #[must_use]
    pub fn refinement(mut self, max_attempts: u32, acceptance_threshold: u8) -> Self {
        self.config.refinement.max_attempts = max_attempts;
        self.config.refinement.acceptance_threshold = acceptance_threshold;
        self.touch("refinement.max_attempts")
            .touch("refinement.acceptance_threshold")
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = self.config;
        for key in ALL_KEYS {
            config
                .source_attribution
                .insert((*key).to_string(), ConfigSource::Defaults);
        }
        for key in self.touched {
            config
                .source_attribution
                .insert(key.to_string(), ConfigSource::Programmatic);
        }
        config.validate()?;
        Ok(config)
    }
}
