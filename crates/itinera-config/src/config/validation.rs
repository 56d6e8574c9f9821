use itinera_utils::error::ConfigError;

use super::{Config, model::{KNOWN_IMAGE_PROVIDERS, KNOWN_SEARCH_PROVIDERS}};

impl Config {
    /// Validate configuration values.
    ///
    /// A single problem is reported as `InvalidValue`; several are collected
    /// into `ValidationFailed`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems: Vec<(String, String)> = Vec::new();
        let mut reject = |key: &str, why: String| problems.push((key.to_string(), why));

        if self.llm.base_url.trim().is_empty() {
            reject("llm.base_url", "must not be empty".to_string());
        }
        if self.llm.model.trim().is_empty() {
            reject("llm.model", "must not be empty".to_string());
        }
        if self.llm.timeout_secs == 0 {
            reject("llm.timeout_secs", "must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            reject(
                "llm.temperature",
                format!("{} is outside 0.0..=2.0", self.llm.temperature),
            );
        }

        let retry = &self.retry;
        if retry.max_attempts == 0 {
            reject("retry.max_attempts", "must be greater than 0".to_string());
        }
        if retry.multiplier < 1.0 || !retry.multiplier.is_finite() {
            reject(
                "retry.multiplier",
                format!("{} must be a finite value >= 1.0", retry.multiplier),
            );
        }
        if retry.min_delay_ms > retry.max_delay_ms {
            reject(
                "retry.min_delay_ms",
                format!(
                    "{} exceeds retry.max_delay_ms ({})",
                    retry.min_delay_ms, retry.max_delay_ms
                ),
            );
        }
        if retry.jitter_min_ms > retry.jitter_max_ms {
            reject(
                "retry.jitter_min_ms",
                format!(
                    "{} exceeds retry.jitter_max_ms ({})",
                    retry.jitter_min_ms, retry.jitter_max_ms
                ),
            );
        }

        let images = &self.images;
        if images.providers.is_empty() {
            reject("images.providers", "must list at least one provider".to_string());
        }
        for name in &images.providers {
            if !KNOWN_IMAGE_PROVIDERS.contains(&name.as_str()) {
                reject("images.providers", format!("unknown provider '{name}'"));
            }
        }
        if images.attempts == 0 {
            reject("images.attempts", "must be greater than 0".to_string());
        }
        if images.timeout_secs == 0 {
            reject("images.timeout_secs", "must be greater than 0".to_string());
        }
        if images.concurrency == 0 {
            reject("images.concurrency", "must be greater than 0".to_string());
        }
        if images.requests_per_second == 0 {
            reject("images.requests_per_second", "must be greater than 0".to_string());
        }

        let search = &self.search;
        if !KNOWN_SEARCH_PROVIDERS.contains(&search.provider.as_str()) {
            reject(
                "search.provider",
                format!("unknown provider '{}'", search.provider),
            );
        }
        if !(1..=10).contains(&search.results_per_query) {
            reject(
                "search.results_per_query",
                format!("{} is outside 1..=10", search.results_per_query),
            );
        }
        if search.timeout_secs == 0 {
            reject("search.timeout_secs", "must be greater than 0".to_string());
        }

        if self.refinement.max_attempts == 0 {
            reject("refinement.max_attempts", "must be greater than 0".to_string());
        }
        if !(1..=10).contains(&self.refinement.acceptance_threshold) {
            reject(
                "refinement.acceptance_threshold",
                format!("{} is outside 1..=10", self.refinement.acceptance_threshold),
            );
        }

        match problems.len() {
            0 => Ok(()),
            1 => {
                let (key, value) = problems.remove(0);
                Err(ConfigError::InvalidValue { key, value })
            }
            n => Err(ConfigError::ValidationFailed {
                errors: problems
                    .into_iter()
                    .map(|(key, why)| format!("{key}: {why}"))
                    .collect(),
                error_count: n,
            }),
        }
    }
}
