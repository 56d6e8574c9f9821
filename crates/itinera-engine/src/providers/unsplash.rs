//! Unsplash image search (`GET https://api.unsplash.com/search/photos`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use itinera_llm::HttpClient;
use itinera_utils::error::ProviderError;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use super::{ImageProvider, provider_error};

const ENDPOINT: &str = "https://api.unsplash.com/search/photos";

pub struct UnsplashProvider {
    http: Arc<HttpClient>,
    access_key: Option<String>,
    key_env: String,
    timeout: Duration,
}

impl UnsplashProvider {
    #[must_use]
    pub fn new(
        http: Arc<HttpClient>,
        access_key: Option<String>,
        key_env: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            access_key,
            key_env: key_env.into(),
            timeout,
        }
    }

    fn search_url(query: &str) -> Result<Url, ProviderError> {
        Url::parse_with_params(
            ENDPOINT,
            &[
                ("query", query),
                ("page", "1"),
                ("per_page", "3"),
                ("orientation", "landscape"),
                ("order_by", "relevant"),
            ],
        )
        .map_err(|e| ProviderError::Http(format!("invalid Unsplash URL: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    urls: PhotoUrls,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: Option<String>,
    small: Option<String>,
}

fn image_urls(body: SearchResponse) -> Vec<String> {
    body.results
        .into_iter()
        .filter_map(|photo| photo.urls.regular.or(photo.urls.small))
        .filter(|url| !url.is_empty())
        .collect()
}

#[async_trait]
impl ImageProvider for UnsplashProvider {
    fn name(&self) -> &str {
        "unsplash"
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        let access_key =
            self.access_key
                .as_deref()
                .ok_or_else(|| ProviderError::MissingCredentials {
                    provider: "unsplash".to_string(),
                    env_var: self.key_env.clone(),
                })?;

        let request = self
            .http
            .get(Self::search_url(query)?)
            .header("Authorization", format!("Client-ID {access_key}"));
        let response = self
            .http
            .execute(request, self.timeout, "unsplash")
            .await
            .map_err(provider_error)?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("Unsplash response: {e}")))?;

        let urls = image_urls(body);
        debug!(provider = "unsplash", query, matches = urls.len(), "Image search finished");
        Ok(urls)
    }
}
