//! Shared HTTP client for chat-completion and image-search providers
//!
//! One `reqwest::Client` is built per process and reused for connection
//! pooling. Each call is a single attempt with a per-request timeout; the
//! outcome is classified into [`HttpFailure`] so that callers can map it onto
//! their own error taxonomy. Retry policy lives in the orchestration layer.

use itinera_utils::error::LlmError;
use itinera_utils::redaction::redact_error_message;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default maximum HTTP timeout (5 minutes)
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Default connect timeout (30 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body excerpt kept in an error
const BODY_EXCERPT_CHARS: usize = 200;

/// Why a single HTTP attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// The server answered with a non-2xx status
    Status { status: StatusCode, body: String },
    /// No response within the effective timeout
    Timeout(Duration),
    /// Connection, TLS or body transfer failure
    Network(String),
    /// The request could not be built (bad URL, header)
    Build(String),
}

impl HttpFailure {
    /// Map onto the chat-completion error taxonomy.
    ///
    /// - 401/403 → `ProviderAuth`
    /// - 429 → `ProviderQuota`
    /// - 5xx → `ProviderOutage`
    /// - other 4xx and network errors → `Transport`
    #[must_use]
    pub fn into_llm_error(self, provider: &str) -> LlmError {
        match self {
            Self::Status { status, body } => match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    LlmError::ProviderAuth(format!("{provider} authentication failed: {status}"))
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    LlmError::ProviderQuota(format!("{provider} rate limit exceeded: {status}"))
                }
                s if s.is_server_error() => {
                    LlmError::ProviderOutage(format!("{provider} returned server error: {status}"))
                }
                _ => LlmError::Transport(format!(
                    "{provider} returned client error: {status} {body}"
                )),
            },
            Self::Timeout(duration) => LlmError::Timeout { duration },
            Self::Network(msg) => LlmError::Transport(format!("{provider} request failed: {msg}")),
            Self::Build(msg) => {
                LlmError::Misconfiguration(format!("{provider} request invalid: {msg}"))
            }
        }
    }
}

/// Shared HTTP client for all providers
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_timeout", &self.max_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub fn new() -> Result<Self, LlmError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT)
    }

    /// Create a new HTTP client with a custom maximum timeout
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub fn with_max_timeout(max_timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout,
        })
    }

    #[must_use]
    pub fn max_timeout(&self) -> Duration {
        self.max_timeout
    }

    #[must_use]
    pub fn get(&self, url: reqwest::Url) -> RequestBuilder {
        self.client.get(url)
    }

    #[must_use]
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Execute one request with timeout `min(request_timeout, max_timeout)`.
    ///
    /// # Errors
    ///
    /// Returns an [`HttpFailure`] describing why the attempt failed. Error text
    /// is redacted so URLs carrying API keys never leak into logs.
    pub async fn execute(
        &self,
        request_builder: RequestBuilder,
        request_timeout: Duration,
        provider_name: &str,
    ) -> Result<Response, HttpFailure> {
        let effective_timeout = request_timeout.min(self.max_timeout);

        let request = request_builder
            .timeout(effective_timeout)
            .build()
            .map_err(|e| HttpFailure::Build(redact_error_message(&e.to_string())))?;

        debug!(
            provider = provider_name,
            timeout_ms = effective_timeout.as_millis() as u64,
            "Executing HTTP request"
        );

        let response = self.client.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                HttpFailure::Timeout(effective_timeout)
            } else {
                HttpFailure::Network(redact_error_message(&e.to_string()))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
        Err(HttpFailure::Status {
            status,
            body: redact_error_message(&excerpt),
        })
    }
}
