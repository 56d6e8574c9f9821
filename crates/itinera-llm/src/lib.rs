//! Chat-completion backends for itinera
//!
//! Provides the [`LlmBackend`] capability, the OpenAI-compatible HTTP
//! implementation and the shared [`HttpClient`] also used by the image
//! providers.

mod http_client;
mod openai_backend;
mod types;

use std::sync::Arc;

pub use http_client::{HttpClient, HttpFailure};
pub use itinera_utils::error::LlmError;
pub use openai_backend::{BackendRole, HttpParams, OpenAiCompatibleBackend};
pub use types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

use itinera_config::Config;

/// Build the generator and evaluator backends from configuration.
///
/// Both share one HTTP client.
///
/// # Errors
///
/// Returns `LlmError::Misconfiguration` if the API key is missing or the
/// HTTP client cannot be constructed.
pub fn backends_from_config(
    config: &Config,
    client: Arc<HttpClient>,
) -> Result<(Arc<dyn LlmBackend>, Arc<dyn LlmBackend>), LlmError> {
    let generator =
        OpenAiCompatibleBackend::from_config(config, BackendRole::Generator, client.clone())?;
    let evaluator = OpenAiCompatibleBackend::from_config(config, BackendRole::Evaluator, client)?;
    Ok((Arc::new(generator), Arc::new(evaluator)))
}
