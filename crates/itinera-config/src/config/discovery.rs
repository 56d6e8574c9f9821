use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use itinera_utils::error::ConfigError;
use itinera_utils::paths::{self, HOME_ENV};

use super::{
    CliArgs, Config, ConfigSource, Defaults, ImageSettings, LlmSettings, RefinementSettings,
    RetrySettings, SearchSettings,
};

/// Every attributable key, in display order.
pub(crate) const ALL_KEYS: &[&str] = &[
    "defaults.cache_dir",
    "defaults.verbose",
    "llm.base_url",
    "llm.model",
    "llm.evaluator_model",
    "llm.api_key_env",
    "llm.max_tokens",
    "llm.temperature",
    "llm.timeout_secs",
    "retry.max_attempts",
    "retry.base_delay_ms",
    "retry.multiplier",
    "retry.min_delay_ms",
    "retry.max_delay_ms",
    "retry.jitter_min_ms",
    "retry.jitter_max_ms",
    "images.providers",
    "images.attempts",
    "images.timeout_secs",
    "images.inter_provider_delay_ms",
    "images.concurrency",
    "images.requests_per_second",
    "images.pixabay_key_env",
    "images.unsplash_key_env",
    "search.provider",
    "search.api_key_env",
    "search.engine_id_env",
    "search.results_per_query",
    "search.timeout_secs",
    "refinement.max_attempts",
    "refinement.acceptance_threshold",
];

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<TomlDefaults>,
    llm: Option<TomlLlm>,
    retry: Option<TomlRetry>,
    images: Option<TomlImages>,
    search: Option<TomlSearch>,
    refinement: Option<TomlRefinement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlDefaults {
    cache_dir: Option<PathBuf>,
    verbose: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlLlm {
    base_url: Option<String>,
    model: Option<String>,
    evaluator_model: Option<String>,
    api_key_env: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlRetry {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    multiplier: Option<f64>,
    min_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    jitter_min_ms: Option<u64>,
    jitter_max_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlImages {
    providers: Option<Vec<String>>,
    attempts: Option<u32>,
    timeout_secs: Option<u64>,
    inter_provider_delay_ms: Option<u64>,
    concurrency: Option<usize>,
    requests_per_second: Option<u32>,
    pixabay_key_env: Option<String>,
    unsplash_key_env: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlSearch {
    provider: Option<String>,
    api_key_env: Option<String>,
    engine_id_env: Option<String>,
    results_per_query: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlRefinement {
    max_attempts: Option<u32>,
    acceptance_threshold: Option<u8>,
}

/// Records each overridden value together with its source.
struct Layer<'a> {
    source: ConfigSource,
    attribution: &'a mut HashMap<String, ConfigSource>,
}

impl Layer<'_> {
    fn set<T>(&mut self, slot: &mut T, value: Option<T>, key: &str) {
        if let Some(value) = value {
            *slot = value;
            self.attribution.insert(key.to_string(), self.source.clone());
        }
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory as the start of the upward search.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("cannot read current directory: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// File lookup order: `cli_args.config_path` (must exist), then
    /// `$ITINERA_HOME/config.toml`, then `.itinera/config.toml` searched
    /// upward from `start_dir` until a repository root.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        for key in ALL_KEYS {
            config
                .source_attribution
                .insert((*key).to_string(), ConfigSource::Defaults);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) if !explicit.exists() => {
                return Err(ConfigError::NotFound {
                    path: explicit.display().to_string(),
                });
            }
            Some(explicit) => Some(explicit.clone()),
            None => Self::home_config_file().or_else(|| Self::discover_config_file_from(start_dir)),
        };

        if let Some(path) = &config_path {
            tracing::debug!(path = %path.display(), "loading configuration file");
            let file_config = Self::load_config_file(path)?;
            config.apply_file(file_config, path);
        }

        config.apply_cli(cli_args);
        config.validate()?;
        Ok(config)
    }

    /// Search upward for `.itinera/config.toml`, stopping at a repository root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current_dir = start_dir.to_path_buf();

        loop {
            let config_path = current_dir.join(".itinera").join("config.toml");
            if config_path.is_file() {
                return Some(config_path);
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                return None;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => return None,
            }
        }
    }

    fn home_config_file() -> Option<PathBuf> {
        env::var_os(HOME_ENV)?;
        let path = paths::home_config_path().into_std_path_buf();
        path.is_file().then_some(path)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())))
    }

    fn apply_file(&mut self, file: TomlConfig, path: &Path) {
        let mut layer = Layer {
            source: ConfigSource::ConfigFile(path.to_path_buf()),
            attribution: &mut self.source_attribution,
        };

        let d = file.defaults.unwrap_or_default();
        let defaults: &mut Defaults = &mut self.defaults;
        layer.set(&mut defaults.cache_dir, d.cache_dir, "defaults.cache_dir");
        layer.set(&mut defaults.verbose, d.verbose, "defaults.verbose");

        let l = file.llm.unwrap_or_default();
        let llm: &mut LlmSettings = &mut self.llm;
        layer.set(&mut llm.base_url, l.base_url, "llm.base_url");
        layer.set(&mut llm.model, l.model, "llm.model");
        layer.set(
            &mut llm.evaluator_model,
            l.evaluator_model.map(Some),
            "llm.evaluator_model",
        );
        layer.set(&mut llm.api_key_env, l.api_key_env, "llm.api_key_env");
        layer.set(&mut llm.max_tokens, l.max_tokens, "llm.max_tokens");
        layer.set(&mut llm.temperature, l.temperature, "llm.temperature");
        layer.set(&mut llm.timeout_secs, l.timeout_secs, "llm.timeout_secs");

        let r = file.retry.unwrap_or_default();
        let retry: &mut RetrySettings = &mut self.retry;
        layer.set(&mut retry.max_attempts, r.max_attempts, "retry.max_attempts");
        layer.set(&mut retry.base_delay_ms, r.base_delay_ms, "retry.base_delay_ms");
        layer.set(&mut retry.multiplier, r.multiplier, "retry.multiplier");
        layer.set(&mut retry.min_delay_ms, r.min_delay_ms, "retry.min_delay_ms");
        layer.set(&mut retry.max_delay_ms, r.max_delay_ms, "retry.max_delay_ms");
        layer.set(&mut retry.jitter_min_ms, r.jitter_min_ms, "retry.jitter_min_ms");
        layer.set(&mut retry.jitter_max_ms, r.jitter_max_ms, "retry.jitter_max_ms");

        let i = file.images.unwrap_or_default();
        let images: &mut ImageSettings = &mut self.images;
        layer.set(&mut images.providers, i.providers, "images.providers");
        layer.set(&mut images.attempts, i.attempts, "images.attempts");
        layer.set(&mut images.timeout_secs, i.timeout_secs, "images.timeout_secs");
        layer.set(
            &mut images.inter_provider_delay_ms,
            i.inter_provider_delay_ms,
            "images.inter_provider_delay_ms",
        );
        layer.set(&mut images.concurrency, i.concurrency, "images.concurrency");
        layer.set(
            &mut images.requests_per_second,
            i.requests_per_second,
            "images.requests_per_second",
        );
        layer.set(&mut images.pixabay_key_env, i.pixabay_key_env, "images.pixabay_key_env");
        layer.set(
            &mut images.unsplash_key_env,
            i.unsplash_key_env,
            "images.unsplash_key_env",
        );

        let s = file.search.unwrap_or_default();
        let search: &mut SearchSettings = &mut self.search;
        layer.set(&mut search.provider, s.provider, "search.provider");
        layer.set(&mut search.api_key_env, s.api_key_env, "search.api_key_env");
        layer.set(&mut search.engine_id_env, s.engine_id_env, "search.engine_id_env");
        layer.set(
            &mut search.results_per_query,
            s.results_per_query,
            "search.results_per_query",
        );
        layer.set(&mut search.timeout_secs, s.timeout_secs, "search.timeout_secs");

        let f = file.refinement.unwrap_or_default();
        let refinement: &mut RefinementSettings = &mut self.refinement;
        layer.set(&mut refinement.max_attempts, f.max_attempts, "refinement.max_attempts");
        layer.set(
            &mut refinement.acceptance_threshold,
            f.acceptance_threshold,
            "refinement.acceptance_threshold",
        );
    }

    fn apply_cli(&mut self, cli: &CliArgs) {
        let mut layer = Layer {
            source: ConfigSource::Cli,
            attribution: &mut self.source_attribution,
        };
        layer.set(
            &mut self.defaults.cache_dir,
            cli.cache_dir.clone(),
            "defaults.cache_dir",
        );
        layer.set(&mut self.defaults.verbose, cli.verbose, "defaults.verbose");
        layer.set(&mut self.llm.model, cli.model.clone(), "llm.model");
        layer.set(
            &mut self.llm.evaluator_model,
            cli.evaluator_model.clone().map(Some),
            "llm.evaluator_model",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let cfg_dir = dir.join(".itinera");
        fs::create_dir_all(&cfg_dir).unwrap();
        let path = cfg_dir.join("config.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let config = Config::discover_from(dir.path(), &CliArgs::default()).unwrap();

        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.refinement.acceptance_threshold, 6);
        assert_eq!(
            config.source_attribution.get("retry.max_attempts"),
            Some(&ConfigSource::Defaults)
        );
    }

    #[test]
    fn test_file_overrides_defaults_and_is_attributed() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let path = write_config(
            dir.path(),
            r#"
[retry]
max_attempts = 5

[images]
providers = ["unsplash"]
"#,
        );

        let config = Config::discover_from(dir.path(), &CliArgs::default()).unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.images.providers, vec!["unsplash"]);
        assert_eq!(config.retry.max_delay_ms, 20_000);
        assert_eq!(
            config.source_attribution.get("images.providers"),
            Some(&ConfigSource::ConfigFile(path))
        );
    }

    #[test]
    fn test_search_section_is_read() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        write_config(
            dir.path(),
            "[search]\nprovider = \"none\"\nresults_per_query = 5\n",
        );

        let config = Config::discover_from(dir.path(), &CliArgs::default()).unwrap();

        assert!(!config.search.enabled());
        assert_eq!(config.search.results_per_query, 5);
        assert_eq!(config.search.api_key_env, "GOOGLE_API_KEY");
    }

    #[test]
    fn test_upward_discovery_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        write_config(dir.path(), "[llm]\nmodel = \"Qwen/Qwen2.5-72B-Instruct\"\n");
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::discover_from(&nested, &CliArgs::default()).unwrap();

        assert_eq!(config.llm.model, "Qwen/Qwen2.5-72B-Instruct");
    }

    #[test]
    fn test_search_stops_at_repository_root() {
        let outer = TempDir::new().unwrap();
        write_config(outer.path(), "[retry]\nmax_attempts = 9\n");
        let repo = outer.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();

        assert!(Config::discover_config_file_from(&repo).is_none());
    }

    #[test]
    fn test_cli_beats_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        write_config(dir.path(), "[llm]\nmodel = \"from-file\"\n");
        let cli = CliArgs {
            model: Some("from-cli".to_string()),
            verbose: Some(true),
            ..CliArgs::default()
        };

        let config = Config::discover_from(dir.path(), &cli).unwrap();

        assert_eq!(config.llm.model, "from-cli");
        assert!(config.defaults.verbose);
        assert_eq!(
            config.source_attribution.get("llm.model"),
            Some(&ConfigSource::Cli)
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        write_config(dir.path(), "[retry]\nmax_retries = 3\n");

        let err = Config::discover_from(dir.path(), &CliArgs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile(_)));
    }

    #[test]
    fn test_missing_explicit_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let cli = CliArgs {
            config_path: Some(dir.path().join("nope.toml")),
            ..CliArgs::default()
        };

        let err = Config::discover_from(dir.path(), &cli).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        write_config(dir.path(), "[refinement]\nacceptance_threshold = 11\n");

        let err = Config::discover_from(dir.path(), &CliArgs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "refinement.acceptance_threshold"));
    }
}
