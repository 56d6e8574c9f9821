//! Pixabay image search (`GET https://pixabay.com/api/`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use itinera_llm::HttpClient;
use itinera_utils::error::ProviderError;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use super::{ImageProvider, provider_error};

const ENDPOINT: &str = "https://pixabay.com/api/";

pub struct PixabayProvider {
    http: Arc<HttpClient>,
    api_key: Option<String>,
    key_env: String,
    timeout: Duration,
}

impl PixabayProvider {
    #[must_use]
    pub fn new(
        http: Arc<HttpClient>,
        api_key: Option<String>,
        key_env: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            api_key,
            key_env: key_env.into(),
            timeout,
        }
    }

    /// Popular horizontal travel photos, three per page. The key travels as a
    /// query parameter.
    fn search_url(api_key: &str, query: &str) -> Result<Url, ProviderError> {
        Url::parse_with_params(
            ENDPOINT,
            &[
                ("key", api_key),
                ("q", query),
                ("image_type", "photo"),
                ("orientation", "horizontal"),
                ("category", "places,food,travel"),
                ("min_width", "640"),
                ("min_height", "480"),
                ("safesearch", "true"),
                ("per_page", "3"),
                ("order", "popular"),
            ],
        )
        .map_err(|e| ProviderError::Http(format!("invalid Pixabay URL: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "webformatURL")]
    webformat_url: Option<String>,
    #[serde(rename = "largeImageURL")]
    large_image_url: Option<String>,
}

/// Medium size first, large as a fallback.
fn image_urls(body: SearchResponse) -> Vec<String> {
    body.hits
        .into_iter()
        .filter_map(|hit| hit.webformat_url.or(hit.large_image_url))
        .filter(|url| !url.is_empty())
        .collect()
}

#[async_trait]
impl ImageProvider for PixabayProvider {
    fn name(&self) -> &str {
        "pixabay"
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCredentials {
                provider: "pixabay".to_string(),
                env_var: self.key_env.clone(),
            })?;

        let url = Self::search_url(api_key, query)?;
        let response = self
            .http
            .execute(self.http.get(url), self.timeout, "pixabay")
            .await
            .map_err(provider_error)?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("Pixabay response: {e}")))?;

        let urls = image_urls(body);
        debug!(provider = "pixabay", query, matches = urls.len(), "Image search finished");
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_parameters() {
        let url = PixabayProvider::search_url("k123", "Chengdu hotpot food").unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["key"], "k123");
        assert_eq!(pairs["q"], "Chengdu hotpot food");
        assert_eq!(pairs["order"], "popular");
        assert_eq!(pairs["per_page"], "3");
        assert_eq!(pairs["category"], "places,food,travel");
        assert_eq!(url.host_str(), Some("pixabay.com"));
    }

    #[test]
    fn test_image_urls_prefers_webformat() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"total":2,"hits":[
                {"webformatURL":"https://pixabay.com/a_640.jpg","largeImageURL":"https://pixabay.com/a_1280.jpg"},
                {"largeImageURL":"https://pixabay.com/b_1280.jpg"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            image_urls(body),
            vec!["https://pixabay.com/a_640.jpg", "https://pixabay.com/b_1280.jpg"]
        );
    }

    #[test]
    fn test_image_urls_empty_hits() {
        let body: SearchResponse = serde_json::from_str(r#"{"total":0,"hits":[]}"#).unwrap();
        assert!(image_urls(body).is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_provider_error() {
        let provider = PixabayProvider::new(
            Arc::new(HttpClient::new().unwrap()),
            None,
            "PIXABAY_API_KEY",
            Duration::from_secs(1),
        );
        let err = provider.search("Chengdu").await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::MissingCredentials { ref env_var, .. } if env_var == "PIXABAY_API_KEY"
        ));
    }
}
