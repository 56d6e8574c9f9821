//! Web search used to gather destination content.

mod google;

pub use google::GoogleSearchProvider;

use std::sync::Arc;

use async_trait::async_trait;
use itinera_config::Config;
use itinera_llm::HttpClient;
use itinera_utils::error::ProviderError;
use serde::{Deserialize, Serialize};

use crate::providers::key_from_env;

/// One web search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "snippet")]
    pub description: String,
    #[serde(default, alias = "link")]
    pub url: String,
}

impl SearchHit {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            url: url.into(),
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Results for `query`, in the engine's ranking order.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` for missing credentials, HTTP failures and
    /// undecodable bodies.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError>;
}

/// The provider selected by `search.provider`, or `None` when set to `none`.
#[must_use]
pub fn search_from_config(
    config: &Config,
    http: &Arc<HttpClient>,
) -> Option<Arc<dyn SearchProvider>> {
    let settings = &config.search;
    match settings.provider.as_str() {
        "google" => Some(Arc::new(GoogleSearchProvider::new(
            http.clone(),
            key_from_env(&settings.api_key_env),
            key_from_env(&settings.engine_id_env),
            settings,
        ))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_search_builds_nothing() {
        let http = Arc::new(HttpClient::new().unwrap());
        let config = Config::builder().search_provider("none").build().unwrap();
        assert!(search_from_config(&config, &http).is_none());

        let config = Config::default();
        let provider = search_from_config(&config, &http).unwrap();
        assert_eq!(provider.name(), "google");
    }

    #[test]
    fn test_hit_accepts_engine_field_names() {
        let hit: SearchHit = serde_json::from_str(
            r#"{"title":"Chengdu in 3 days","snippet":"Pandas and hotpot","link":"https://example.com/cd"}"#,
        )
        .unwrap();
        assert_eq!(
            hit,
            SearchHit::new("Chengdu in 3 days", "Pandas and hotpot", "https://example.com/cd")
        );
    }
}
