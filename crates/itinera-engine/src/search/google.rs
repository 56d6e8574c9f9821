//! Google Programmable Search (`GET https://www.googleapis.com/customsearch/v1`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use itinera_config::SearchSettings;
use itinera_llm::HttpClient;
use itinera_utils::error::ProviderError;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use super::{SearchHit, SearchProvider};
use crate::providers::provider_error;

const ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

pub struct GoogleSearchProvider {
    http: Arc<HttpClient>,
    api_key: Option<String>,
    engine_id: Option<String>,
    key_env: String,
    engine_env: String,
    results: u32,
    timeout: Duration,
}

impl GoogleSearchProvider {
    #[must_use]
    pub fn new(
        http: Arc<HttpClient>,
        api_key: Option<String>,
        engine_id: Option<String>,
        settings: &SearchSettings,
    ) -> Self {
        Self {
            http,
            api_key,
            engine_id,
            key_env: settings.api_key_env.clone(),
            engine_env: settings.engine_id_env.clone(),
            results: settings.results_per_query.clamp(1, 10),
            timeout: settings.timeout(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), ProviderError> {
        let missing = |env_var: &str| ProviderError::MissingCredentials {
            provider: "google".to_string(),
            env_var: env_var.to_string(),
        };
        let key = self.api_key.as_deref().ok_or_else(|| missing(&self.key_env))?;
        let cx = self.engine_id.as_deref().ok_or_else(|| missing(&self.engine_env))?;
        Ok((key, cx))
    }

    fn search_url(
        api_key: &str,
        engine_id: &str,
        query: &str,
        results: u32,
    ) -> Result<Url, ProviderError> {
        let num = results.to_string();
        Url::parse_with_params(
            ENDPOINT,
            &[
                ("key", api_key),
                ("cx", engine_id),
                ("q", query),
                ("num", num.as_str()),
            ],
        )
        .map_err(|e| ProviderError::Http(format!("invalid search URL: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchHit>,
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let (api_key, engine_id) = self.credentials()?;
        let url = Self::search_url(api_key, engine_id, query, self.results)?;
        let response = self
            .http
            .execute(self.http.get(url), self.timeout, "google")
            .await
            .map_err(provider_error)?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("search response: {e}")))?;

        debug!(provider = "google", query, hits = body.items.len(), "Web search finished");
        Ok(body.items)
    }
}
