use std::collections::BTreeMap;

use super::{Config, ConfigSource, discovery::ALL_KEYS};

impl Config {
    /// Effective configuration as `key -> (value, source)` pairs.
    ///
    /// API keys are never part of the configuration, only the names of the
    /// environment variables holding them, so the map is safe to print.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut out = BTreeMap::new();
        for key in ALL_KEYS {
            if let Some(value) = self.value_of(key) {
                let source = self
                    .source_attribution
                    .get(*key)
                    .unwrap_or(&ConfigSource::Defaults)
                    .to_string();
                out.insert((*key).to_string(), (value, source));
            }
        }
        out
    }

    fn value_of(&self, key: &str) -> Option<String> {
        let value = match key {
            "defaults.cache_dir" => self.defaults.cache_dir.display().to_string(),
            "defaults.verbose" => self.defaults.verbose.to_string(),
            "llm.base_url" => self.llm.base_url.clone(),
            "llm.model" => self.llm.model.clone(),
            "llm.evaluator_model" => self.llm.evaluator_model().to_string(),
            "llm.api_key_env" => self.llm.api_key_env.clone(),
            "llm.max_tokens" => self.llm.max_tokens.to_string(),
            "llm.temperature" => self.llm.temperature.to_string(),
            "llm.timeout_secs" => self.llm.timeout_secs.to_string(),
            "retry.max_attempts" => self.retry.max_attempts.to_string(),
            "retry.base_delay_ms" => self.retry.base_delay_ms.to_string(),
            "retry.multiplier" => self.retry.multiplier.to_string(),
            "retry.min_delay_ms" => self.retry.min_delay_ms.to_string(),
            "retry.max_delay_ms" => self.retry.max_delay_ms.to_string(),
            "retry.jitter_min_ms" => self.retry.jitter_min_ms.to_string(),
            "retry.jitter_max_ms" => self.retry.jitter_max_ms.to_string(),
            "images.providers" => self.images.providers.join(", "),
            "images.attempts" => self.images.attempts.to_string(),
            "images.timeout_secs" => self.images.timeout_secs.to_string(),
            "images.inter_provider_delay_ms" => self.images.inter_provider_delay_ms.to_string(),
            "images.concurrency" => self.images.concurrency.to_string(),
            "images.requests_per_second" => self.images.requests_per_second.to_string(),
            "images.pixabay_key_env" => self.images.pixabay_key_env.clone(),
            "images.unsplash_key_env" => self.images.unsplash_key_env.clone(),
            "search.provider" => self.search.provider.clone(),
            "search.api_key_env" => self.search.api_key_env.clone(),
            "search.engine_id_env" => self.search.engine_id_env.clone(),
            "search.results_per_query" => self.search.results_per_query.to_string(),
            "search.timeout_secs" => self.search.timeout_secs.to_string(),
            "refinement.max_attempts" => self.refinement.max_attempts.to_string(),
            "refinement.acceptance_threshold" => self.refinement.acceptance_threshold.to_string(),
            _ => return None,
        };
        Some(value)
    }
}
