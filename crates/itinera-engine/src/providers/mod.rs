//! Image search providers and the ordered chain that consults them.

mod chain;
mod pixabay;
mod unsplash;

pub use chain::ProviderChain;
pub use pixabay::PixabayProvider;
pub use unsplash::UnsplashProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use itinera_config::Config;
use itinera_llm::{HttpClient, HttpFailure};
use itinera_utils::error::ProviderError;
use serde::Serialize;

/// An image search backend.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Image URLs matching `query`, best first. An empty list means no match.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` for missing credentials, HTTP failures and
    /// response bodies that cannot be decoded.
    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError>;
}

/// Result of resolving one query.
///
/// When the whole chain comes back empty `found` is false and `resource_ref`
/// holds the category placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderResult {
    pub found: bool,
    pub resource_ref: Option<String>,
    /// Provider that supplied the match
    pub provider: Option<String>,
}

impl ProviderResult {
    #[must_use]
    pub fn found(provider: &str, resource_ref: String) -> Self {
        Self {
            found: true,
            resource_ref: Some(resource_ref),
            provider: Some(provider.to_string()),
        }
    }

    #[must_use]
    pub fn placeholder(resource_ref: &str) -> Self {
        Self {
            found: false,
            resource_ref: Some(resource_ref.to_string()),
            provider: None,
        }
    }

    /// The reference to embed, whether found or placeholder.
    #[must_use]
    pub fn asset_ref(&self) -> &str {
        self.resource_ref.as_deref().unwrap_or_default()
    }
}

pub(crate) fn provider_error(failure: HttpFailure) -> ProviderError {
    match failure {
        HttpFailure::Status { status, body } => ProviderError::Status {
            status: status.as_u16(),
            message: body,
        },
        HttpFailure::Timeout(duration) => ProviderError::Timeout { duration },
        HttpFailure::Network(msg) | HttpFailure::Build(msg) => ProviderError::Http(msg),
    }
}

/// Read an API key from `env_var`, treating empty values as unset.
pub(crate) fn key_from_env(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Build the providers named in `images.providers`, in order.
///
/// Unknown names are skipped; validation rejects them earlier.
#[must_use]
pub fn providers_from_config(
    config: &Config,
    http: &Arc<HttpClient>,
) -> Vec<Arc<dyn ImageProvider>> {
    let timeout: Duration = config.images.timeout();
    config
        .images
        .providers
        .iter()
        .filter_map(|name| -> Option<Arc<dyn ImageProvider>> {
            match name.as_str() {
                "pixabay" => Some(Arc::new(PixabayProvider::new(
                    http.clone(),
                    key_from_env(&config.images.pixabay_key_env),
                    config.images.pixabay_key_env.clone(),
                    timeout,
                ))),
                "unsplash" => Some(Arc::new(UnsplashProvider::new(
                    http.clone(),
                    key_from_env(&config.images.unsplash_key_env),
                    config.images.unsplash_key_env.clone(),
                    timeout,
                ))),
                other => {
                    tracing::warn!(provider = other, "Skipping unknown image provider");
                    None
                }
            }
        })
        .collect()
}
