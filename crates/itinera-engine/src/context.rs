//! Process-wide handles built once at start-up and shared by reference.

use std::sync::Arc;

use camino::Utf8PathBuf;
use itinera_config::Config;
use itinera_llm::{HttpClient, LlmBackend, backends_from_config};
use itinera_utils::error::{ConfigError, ItineraError};
use itinera_utils::ResultCache;
use tracing::debug;

use crate::answerer::ConversationalAnswerer;
use crate::backoff::BackoffPolicy;
use crate::gather::ContentGatherer;
use crate::intent::IntentExtractor;
use crate::pacing::{Jitter, Sleeper, TokioSleeper};
use crate::providers::{ImageProvider, ProviderChain, providers_from_config};
use crate::refinement::{RefinementLoop, RefinementPolicy};
use crate::resilient::ResilientCaller;
use crate::resolver::AssetResolver;
use crate::search::{SearchProvider, search_from_config};

/// Everything a request handler needs: backends, cache, provider chain, web
/// search and the retry, pacing and refinement policies.
pub struct PlannerContext {
    config: Config,
    cache: ResultCache,
    generator: Arc<dyn LlmBackend>,
    evaluator: Arc<dyn LlmBackend>,
    providers: Vec<Arc<dyn ImageProvider>>,
    chain: Arc<ProviderChain>,
    search: Option<Arc<dyn SearchProvider>>,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for PlannerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerContext")
            .field("cache_dir", &self.cache.cache_dir())
            .field("generator", &self.generator.name())
            .field("evaluator", &self.evaluator.name())
            .field("chain", &self.chain)
            .field("search", &self.search.as_ref().map(|s| s.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl PlannerContext {
    /// Wire explicit backends and providers.
    #[must_use]
    pub fn new(
        config: Config,
        cache: ResultCache,
        generator: Arc<dyn LlmBackend>,
        evaluator: Arc<dyn LlmBackend>,
        providers: Vec<Arc<dyn ImageProvider>>,
    ) -> Self {
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
        let chain = Arc::new(
            ProviderChain::from_config(&config, providers.clone()).with_sleeper(sleeper.clone()),
        );
        Self {
            config,
            cache,
            generator,
            evaluator,
            providers,
            chain,
            search: None,
            sleeper,
        }
    }

    /// Build the production context: OpenAI-compatible backends, the image
    /// providers named in `images.providers`, the web search named in
    /// `search.provider` and the cache at `defaults.cache_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory is not UTF-8 or the LLM API key
    /// is missing.
    pub fn from_config(config: Config) -> Result<Self, ItineraError> {
        let cache_dir = Utf8PathBuf::from_path_buf(config.defaults.cache_dir.clone()).map_err(
            |path| ConfigError::InvalidValue {
                key: "defaults.cache_dir".to_string(),
                value: format!("{} (not UTF-8)", path.display()),
            },
        )?;

        let http = Arc::new(HttpClient::with_max_timeout(
            config
                .llm
                .timeout()
                .max(config.images.timeout())
                .max(config.search.timeout()),
        )?);
        let (generator, evaluator) = backends_from_config(&config, http.clone())?;
        let providers = providers_from_config(&config, &http);
        let search = search_from_config(&config, &http);
        debug!(
            cache_dir = %cache_dir,
            providers = providers.len(),
            search = search.as_ref().map_or("none", |s| s.name()),
            "Planner context initialised"
        );

        let ctx = Self::new(
            config,
            ResultCache::new(cache_dir),
            generator,
            evaluator,
            providers,
        );
        Ok(match search {
            Some(search) => ctx.with_search(search),
            None => ctx,
        })
    }

    /// Web search used when gathering destination content.
    #[must_use]
    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    /// Replace the sleeper used for every wait.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.chain = Arc::new(
            ProviderChain::from_config(&self.config, self.providers.clone())
                .with_sleeper(sleeper.clone()),
        );
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    #[must_use]
    pub fn provider_chain(&self) -> &Arc<ProviderChain> {
        &self.chain
    }

    #[must_use]
    pub fn jitter(&self) -> Jitter {
        let (min, max) = self.config.jitter_bounds();
        Jitter::new(min, max)
    }

    /// Retrying wrapper around the generation backend.
    #[must_use]
    pub fn caller(&self) -> ResilientCaller {
        ResilientCaller::new(
            self.generator.clone(),
            BackoffPolicy::from_config(&self.config),
        )
        .with_jitter(self.jitter())
        .with_sleeper(self.sleeper.clone())
    }

    #[must_use]
    pub fn resolver(&self) -> AssetResolver {
        AssetResolver::new(self.chain.clone(), self.config.images.concurrency)
    }

    #[must_use]
    pub fn refinement(&self) -> RefinementLoop {
        RefinementLoop::new(
            self.generator.clone(),
            self.evaluator.clone(),
            RefinementPolicy::from_config(&self.config),
        )
    }

    #[must_use]
    pub fn intent_extractor(&self) -> IntentExtractor {
        IntentExtractor::new(self.caller())
    }

    #[must_use]
    pub fn gatherer(&self) -> ContentGatherer {
        ContentGatherer::new(self.caller(), self.search.clone())
    }

    #[must_use]
    pub fn answerer(&self) -> ConversationalAnswerer {
        ConversationalAnswerer::new(self.refinement())
    }
}
